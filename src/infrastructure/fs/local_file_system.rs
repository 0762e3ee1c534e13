//! File system adapter over `std::fs`.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::Path;

use tracing::{debug, trace};

use crate::domain::errors::StorageError;
use crate::domain::ports::FileSystemPort;

/// Local disk implementation of [`FileSystemPort`].
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileSystem;

impl LocalFileSystem {
    /// Creates the adapter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl FileSystemPort for LocalFileSystem {
    fn file_exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn folder_exists(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn create_folder(&self, path: &Path) -> Result<(), StorageError> {
        fs::create_dir_all(path).map_err(|source| StorageError::CreateFolder {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "Created folder");
        Ok(())
    }

    fn read_file(&self, path: &Path) -> Result<Vec<u8>, StorageError> {
        fs::read(path).map_err(|source| StorageError::Read {
            path: path.to_path_buf(),
            source,
        })
    }

    fn write_file(&self, path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
        let parent = path
            .parent()
            .ok_or_else(|| StorageError::NoParent(path.to_path_buf()))?;
        let write_err = |source| StorageError::Write {
            path: path.to_path_buf(),
            source,
        };

        let mut temp_file = tempfile::NamedTempFile::new_in(parent).map_err(write_err)?;
        temp_file.write_all(bytes).map_err(write_err)?;
        temp_file.flush().map_err(write_err)?;
        temp_file.persist(path).map_err(|e| write_err(e.error))?;

        trace!(path = %path.display(), size = bytes.len(), "Wrote file");
        Ok(())
    }

    fn file_size(&self, path: &Path) -> Result<u64, StorageError> {
        fs::metadata(path)
            .map(|meta| meta.len())
            .map_err(|source| StorageError::Read {
                path: path.to_path_buf(),
                source,
            })
    }

    fn delete_file(&self, path: &Path) -> Result<(), StorageError> {
        match fs::remove_file(path) {
            Ok(()) => {
                debug!(path = %path.display(), "Deleted file");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StorageError::Delete {
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}

//! File system port definition.

use std::path::Path;

use crate::domain::errors::StorageError;

/// Port for local file access.
/// Implementations must be thread-safe; calls may block.
pub trait FileSystemPort: Send + Sync {
    /// Checks if a regular file exists.
    fn file_exists(&self, path: &Path) -> bool;

    /// Checks if a folder exists.
    fn folder_exists(&self, path: &Path) -> bool;

    /// Creates a folder and any missing parents.
    ///
    /// # Errors
    /// Returns error if the folder cannot be created.
    fn create_folder(&self, path: &Path) -> Result<(), StorageError>;

    /// Reads a whole file.
    ///
    /// # Errors
    /// Returns error if the file cannot be opened or read.
    fn read_file(&self, path: &Path) -> Result<Vec<u8>, StorageError>;

    /// Writes `bytes` to `path`, replacing any existing file.
    /// Readers never observe a partially written file.
    ///
    /// # Errors
    /// Returns error if the file cannot be written.
    fn write_file(&self, path: &Path, bytes: &[u8]) -> Result<(), StorageError>;

    /// Returns the size of a file in bytes.
    ///
    /// # Errors
    /// Returns error if the file cannot be inspected.
    fn file_size(&self, path: &Path) -> Result<u64, StorageError>;

    /// Deletes a file. Deleting a missing file is not an error.
    ///
    /// # Errors
    /// Returns error if the file exists but cannot be removed.
    fn delete_file(&self, path: &Path) -> Result<(), StorageError>;
}

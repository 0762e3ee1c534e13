//! Local storage error types.

use std::path::PathBuf;

use thiserror::Error;

/// File system adapter failures.
#[derive(Debug, Error)]
#[allow(missing_docs)]
pub enum StorageError {
    #[error("failed to create folder {path}: {source}")]
    CreateFolder {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to delete {path}: {source}")]
    Delete {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("path has no parent folder: {0}")]
    NoParent(PathBuf),
}

//! Error types for bucket operations.

use std::sync::Arc;

use strata_common::{Canceled, PathError};

/// Errors that can occur while reading or writing a bucket.
#[derive(Clone, Debug, thiserror::Error)]
pub enum StorageError {
    /// The requested path does not exist in the bucket.
    #[error("{path}: does not exist")]
    NotExist {
        /// The path that was looked up.
        path: String,
    },
    /// The path was not a valid normalized object path.
    #[error("invalid path {path:?}: {source}")]
    InvalidPath {
        /// The rejected path.
        path: String,
        /// Why it was rejected.
        source: PathError,
    },
    /// An I/O error from the backing file system.
    #[error("storage I/O error at {path}: {source}")]
    Io {
        /// The path being accessed.
        path: String,
        /// The underlying I/O error.
        source: Arc<std::io::Error>,
    },
    /// The operation observed a canceled context.
    #[error(transparent)]
    Canceled(#[from] Canceled),
}

impl StorageError {
    /// Returns `true` if this error means the path is absent.
    pub fn is_not_exist(&self) -> bool {
        matches!(self, StorageError::NotExist { .. })
    }

    /// Wraps an I/O error raised while accessing `path`. A not-found error
    /// becomes [`StorageError::NotExist`].
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            StorageError::NotExist { path: path.into() }
        } else {
            StorageError::Io {
                path: path.into(),
                source: Arc::new(source),
            }
        }
    }

    pub(crate) fn invalid_path(path: &str, source: PathError) -> Self {
        StorageError::InvalidPath {
            path: path.to_string(),
            source,
        }
    }
}

//! Error types for configuration loading and validation.

use std::sync::Arc;

use strata_cas::CasError;
use strata_common::{NameError, PathError};
use strata_storage::StorageError;

/// Errors that can occur when loading or validating configuration files.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ConfigError {
    /// An I/O error occurred while reading an override file.
    #[error("failed to read configuration: {0}")]
    Io(Arc<std::io::Error>),

    /// Reading from a bucket failed, including the file not existing.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The TOML content could not be parsed.
    #[error("failed to parse {file}: {message}")]
    Parse {
        /// The file being parsed.
        file: String,
        /// The parser's message.
        message: String,
    },

    /// The `version` key held an unknown value.
    #[error("{file} has unknown version {version:?}")]
    InvalidVersion {
        /// The file being parsed.
        file: String,
        /// The rejected version.
        version: String,
    },

    /// The version is known but not valid for this kind of file.
    #[error("{file} does not support version {version}")]
    UnsupportedVersion {
        /// The file being parsed.
        file: String,
        /// The unsupported version.
        version: String,
    },

    /// A configured path was invalid.
    #[error("invalid path in {file}: {source}")]
    Path {
        /// The file being parsed.
        file: String,
        /// The path problem.
        source: PathError,
    },

    /// A module name or reference was invalid.
    #[error(transparent)]
    Name(#[from] NameError),

    /// A digest in a lock file was invalid.
    #[error(transparent)]
    Digest(#[from] CasError),

    /// A configuration value failed validation.
    #[error("validation error in {file}: {message}")]
    Validation {
        /// The file being validated.
        file: String,
        /// What was wrong.
        message: String,
    },
}

impl ConfigError {
    /// Returns `true` if the file was simply absent.
    pub fn is_not_exist(&self) -> bool {
        match self {
            ConfigError::Storage(err) => err.is_not_exist(),
            ConfigError::Io(err) => err.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }

    pub(crate) fn validation(file: &str, message: impl Into<String>) -> Self {
        ConfigError::Validation {
            file: file.to_string(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_validation_error() {
        let err = ConfigError::validation("strata.toml", "duplicate module path \"a\"");
        assert_eq!(
            err.to_string(),
            "validation error in strata.toml: duplicate module path \"a\""
        );
    }

    #[test]
    fn not_exist_detection() {
        let err = ConfigError::Storage(StorageError::NotExist {
            path: "strata.toml".to_string(),
        });
        assert!(err.is_not_exist());
        let err = ConfigError::validation("strata.toml", "x");
        assert!(!err.is_not_exist());
    }
}

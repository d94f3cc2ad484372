//! Error types for digest operations.

use strata_storage::StorageError;

/// Errors that can occur while computing or parsing digests.
#[derive(Clone, Debug, thiserror::Error)]
pub enum CasError {
    /// The digest type prefix was missing or unknown.
    #[error("invalid digest type {value:?}")]
    InvalidDigestType {
        /// The rejected type string.
        value: String,
    },

    /// A digest string could not be parsed.
    #[error("invalid digest {value:?}: {reason}")]
    InvalidDigest {
        /// The rejected digest string.
        value: String,
        /// Description of the problem.
        reason: String,
    },

    /// A manifest line could not be parsed.
    #[error("invalid manifest line {line}: {reason}")]
    InvalidManifest {
        /// The 1-based line number.
        line: usize,
        /// Description of the problem.
        reason: String,
    },

    /// A file node had an invalid path.
    #[error("invalid file node path {path:?}")]
    InvalidPath {
        /// The rejected path.
        path: String,
    },

    /// Two file nodes in one manifest shared a path.
    #[error("duplicate path {path:?} in manifest")]
    DuplicatePath {
        /// The duplicated path.
        path: String,
    },

    /// A digest of the wrong type was supplied.
    #[error("expected a {expected} digest, got {actual}")]
    UnexpectedDigestType {
        /// The required type.
        expected: String,
        /// The digest that was supplied.
        actual: String,
    },

    /// Reading a bucket failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

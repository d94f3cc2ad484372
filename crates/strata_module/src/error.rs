//! Error types for the module model.

use strata_cas::{CasError, Digest};
use strata_common::{Canceled, ModuleFullName, NameError, SystemError};
use strata_storage::StorageError;

/// Errors from building, reading, or digesting modules.
///
/// The type is `Clone` so that failures of memoized computations can be
/// handed to every caller.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ModuleError {
    /// An internal invariant was violated.
    #[error(transparent)]
    System(#[from] SystemError),

    /// The operation observed a canceled context.
    #[error(transparent)]
    Canceled(#[from] Canceled),

    /// A bucket read failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Digest computation failed.
    #[error(transparent)]
    Cas(#[from] CasError),

    /// A name, reference, or commit ID was malformed.
    #[error(transparent)]
    Name(#[from] NameError),

    /// Downloaded module data did not match the digest it was requested by.
    #[error("verification failed for module {key}: expected digest \"{expected}\" but downloaded data had digest \"{actual}\"")]
    VerificationFailed {
        /// The module key, as `name:commit`.
        key: String,
        /// The digest the key promised.
        expected: Digest,
        /// The digest of the data actually received.
        actual: Digest,
    },

    /// Target modules were requested but none of them had target files.
    #[error("no .schema target files found")]
    NoTargetFiles,

    /// The same module name was added with two different digests.
    #[error("module {full_name} was added with conflicting digests \"{first}\" and \"{second}\"")]
    ConflictingDigests {
        /// The module name.
        full_name: ModuleFullName,
        /// The digest seen first.
        first: Digest,
        /// The digest that disagreed with it.
        second: Digest,
    },

    /// Two local modules claimed the same identity.
    #[error("multiple local modules were added with {what} {value}")]
    DuplicateLocalModule {
        /// Which identity collided, `name` or `bucket ID`.
        what: &'static str,
        /// The colliding value.
        value: String,
    },

    /// Modules depend on each other in a cycle.
    #[error("cycle detected in module dependencies: {cycle}")]
    DependencyCycle {
        /// The modules on the cycle, joined with `" -> "`.
        cycle: String,
    },

    /// A remote module was not available from the provider.
    #[error("module {key} was not found")]
    NotFound {
        /// The key or reference that was requested.
        key: String,
    },

    /// A remote call failed. Transport errors are not retried.
    #[error("remote error: {message}")]
    Remote {
        /// The transport's message.
        message: String,
    },
}

impl ModuleError {
    /// Returns `true` for broken internal contracts rather than user errors.
    pub fn is_system(&self) -> bool {
        matches!(self, ModuleError::System(_))
    }

    /// Returns `true` if the error means a requested path is absent.
    pub fn is_not_exist(&self) -> bool {
        matches!(self, ModuleError::Storage(err) if err.is_not_exist())
    }

    pub(crate) fn system(message: impl Into<String>) -> Self {
        ModuleError::System(SystemError::new(message))
    }
}

//! Error types for uploads.

use strata_cas::Digest;
use strata_common::{Canceled, ModuleFullName, SystemError};
use strata_module::ModuleError;

/// Errors from preparing, sending, or validating an upload.
#[derive(Clone, Debug, thiserror::Error)]
pub enum UploadError {
    /// An internal invariant was violated.
    #[error(transparent)]
    System(#[from] SystemError),

    /// The operation observed a canceled context.
    #[error(transparent)]
    Canceled(#[from] Canceled),

    /// Reading or digesting a module failed, or the registry rejected it.
    #[error(transparent)]
    Module(#[from] ModuleError),

    /// A module to push has no name.
    #[error("Module {id} had no name; a name must be specified in strata.toml for push")]
    NoName {
        /// The module's opaque ID.
        id: String,
    },

    /// The modules to push belong to more than one registry.
    #[error("multiple registries detected: {list}")]
    MultipleRegistries {
        /// The registry hostnames, comma separated.
        list: String,
    },

    /// A module to push is not local.
    #[error("module {id} is not a local module and cannot be pushed")]
    NotLocal {
        /// The module's opaque ID.
        id: String,
    },

    /// A local dependency is not part of the same upload.
    #[error("local dependency {dep} of {module} must be pushed in the same upload")]
    LocalDepNotUploaded {
        /// The module being pushed.
        module: String,
        /// The local dependency left out.
        dep: String,
    },

    /// The registry returned a different number of commits than contents.
    #[error("expected {expected} commits, got {actual}")]
    CommitCountMismatch {
        /// The number of contents sent.
        expected: usize,
        /// The number of commits returned.
        actual: usize,
    },

    /// Client-side verification found the registry's digest wrong.
    #[error("registry returned digest \"{actual}\" for {full_name} but the uploaded content has digest \"{expected}\"")]
    DigestMismatch {
        /// The module pushed.
        full_name: ModuleFullName,
        /// The digest of the local content.
        expected: Digest,
        /// The digest the registry returned.
        actual: Digest,
    },
}

impl UploadError {
    /// Returns `true` for broken internal contracts rather than user errors.
    pub fn is_system(&self) -> bool {
        match self {
            UploadError::System(_) => true,
            UploadError::Module(err) => err.is_system(),
            _ => false,
        }
    }

    pub(crate) fn system(message: impl Into<String>) -> Self {
        UploadError::System(SystemError::new(message))
    }
}

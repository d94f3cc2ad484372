//! Error types for checks and plugins.

use strata_cas::{CasError, DigestType};
use strata_common::{Canceled, SystemError};

/// Errors from selecting or running checks, or from loading a plugin.
#[derive(Clone, Debug, thiserror::Error)]
pub enum CheckError {
    /// An internal invariant was violated.
    #[error(transparent)]
    System(#[from] SystemError),

    /// The operation observed a canceled context.
    #[error(transparent)]
    Canceled(#[from] Canceled),

    /// A configured ID names neither a rule nor a category.
    #[error("unknown rule ID or category {id:?}")]
    UnknownRule {
        /// The rejected ID.
        id: String,
    },

    /// A plugin failed validation.
    #[error("invalid plugin: {message}")]
    InvalidPlugin {
        /// Description of the problem.
        message: String,
    },

    /// Bytes were requested from a plugin that is not WebAssembly.
    #[error("plugin {id} is not a Wasm plugin")]
    NotWasm {
        /// The plugin's opaque ID.
        id: String,
    },

    /// A plugin digest of an unsupported type was requested.
    #[error("plugins do not support {digest_type} digests")]
    UnsupportedDigestType {
        /// The requested type.
        digest_type: DigestType,
    },

    /// Computing a digest failed.
    #[error(transparent)]
    Cas(#[from] CasError),
}

impl CheckError {
    /// Returns `true` for internal errors that indicate a bug.
    pub fn is_system(&self) -> bool {
        matches!(self, CheckError::System(_))
    }

    pub(crate) fn invalid_plugin(message: impl Into<String>) -> Self {
        CheckError::InvalidPlugin {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_offender() {
        let err = CheckError::UnknownRule {
            id: "NOPE".to_string(),
        };
        assert_eq!(err.to_string(), "unknown rule ID or category \"NOPE\"");
        let err = CheckError::UnsupportedDigestType {
            digest_type: DigestType::B5,
        };
        assert_eq!(err.to_string(), "plugins do not support b5 digests");
        assert!(CheckError::System(SystemError::new("x")).is_system());
    }
}

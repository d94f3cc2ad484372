//! Error types for image building.

use strata_common::{Canceled, SystemError};
use strata_module::ModuleError;

/// Errors that stop an image build.
///
/// Compile diagnostics are not errors; they are returned as annotations in
/// [`BuildOutcome::Failed`](crate::BuildOutcome::Failed).
#[derive(Clone, Debug, thiserror::Error)]
pub enum ImageError {
    /// An internal invariant was violated.
    #[error(transparent)]
    System(#[from] SystemError),

    /// The operation observed a canceled context.
    #[error(transparent)]
    Canceled(#[from] Canceled),

    /// Reading module files failed.
    #[error(transparent)]
    Module(#[from] ModuleError),

    /// The bucket had no target schema files.
    #[error("no input files specified")]
    NoInputFiles,
}

impl ImageError {
    /// Returns `true` for broken internal contracts rather than user errors.
    pub fn is_system(&self) -> bool {
        match self {
            ImageError::System(_) => true,
            ImageError::Module(err) => err.is_system(),
            _ => false,
        }
    }

    pub(crate) fn system(message: impl Into<String>) -> Self {
        ImageError::System(SystemError::new(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_errors_are_flagged() {
        assert!(ImageError::system("duplicate file descriptor: a.schema").is_system());
        assert!(!ImageError::NoInputFiles.is_system());
        assert_eq!(ImageError::NoInputFiles.to_string(), "no input files specified");
    }
}

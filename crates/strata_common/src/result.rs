//! Common result and error types for the Strata toolchain.

/// The result type for operations whose only failure mode is a broken
/// internal contract.
pub type SystemResult<T> = Result<T, SystemError>;

/// A system error indicating a bug in Strata or in a caller that violated a
/// documented precondition, not a problem with user input.
///
/// User-facing errors are modeled by each crate's own error enum. Those enums
/// wrap `SystemError` so that callers can tell the two apart.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("internal error: {message} (this is a bug, please file an issue)")]
pub struct SystemError {
    /// Description of the violated invariant.
    pub message: String,
}

impl SystemError {
    /// Creates a new system error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<String> for SystemError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

//! Cancellation carried through every I/O-bearing operation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A cloneable cancellation token.
///
/// All clones share the same flag: canceling any one of them cancels every
/// operation that holds a clone. Operations poll [`Context::check`] at their
/// I/O boundaries.
#[derive(Clone, Debug, Default)]
pub struct Context {
    canceled: Arc<AtomicBool>,
}

/// Returned by operations that observed a canceled [`Context`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[error("operation canceled")]
pub struct Canceled;

impl Context {
    /// Creates a new, uncanceled context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancels this context and all of its clones.
    pub fn cancel(&self) {
        self.canceled.store(true, Ordering::SeqCst);
    }

    /// Returns `true` once [`Context::cancel`] has been called on any clone.
    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::SeqCst)
    }

    /// Returns `Err(Canceled)` if the context was canceled.
    pub fn check(&self) -> Result<(), Canceled> {
        if self.is_canceled() {
            Err(Canceled)
        } else {
            Ok(())
        }
    }
}

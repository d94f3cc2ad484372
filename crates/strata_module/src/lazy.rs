//! A memo cell that owns the closure it is resolved with.

use std::fmt;
use std::sync::Mutex;

use strata_common::{Context, Memo};

use crate::error::ModuleError;

type Init<T> = Box<dyn FnOnce(&Context) -> Result<T, ModuleError> + Send>;

/// A value computed at most once by a stored closure.
pub(crate) struct Lazy<T> {
    memo: Memo<T, ModuleError>,
    init: Mutex<Option<Init<T>>>,
}

impl<T: Clone> Lazy<T> {
    pub(crate) fn new<F>(init: F) -> Self
    where
        F: FnOnce(&Context) -> Result<T, ModuleError> + Send + 'static,
    {
        Self {
            memo: Memo::new(),
            init: Mutex::new(Some(Box::new(init))),
        }
    }

    pub(crate) fn ready(value: T) -> Self {
        Self {
            memo: Memo::resolved(value),
            init: Mutex::new(None),
        }
    }

    /// Resolves the value, running the closure with `ctx` if this is the
    /// first call.
    pub(crate) fn get(&self, ctx: &Context) -> Result<T, ModuleError> {
        self.memo.get_or_try_init(|| {
            let init = match self.init.lock() {
                Ok(mut guard) => guard.take(),
                Err(poison) => poison.into_inner().take(),
            };
            match init {
                Some(init) => {
                    ctx.check()?;
                    init(ctx)
                }
                // Only reachable if an earlier run panicked.
                None => Err(ModuleError::system("lazy value initializer was lost")),
            }
        })
    }
}

impl<T> fmt::Debug for Lazy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lazy").finish_non_exhaustive()
    }
}

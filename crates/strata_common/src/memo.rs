//! A once-memoized cell for lazily computed, shareable results.
//!
//! A [`Memo`] moves through `Unresolved -> Resolving -> {Resolved, Failed}`
//! exactly once. The first caller of [`Memo::get_or_try_init`] runs the
//! computation; callers arriving while it runs block on a condition variable
//! and then clone the stored outcome. A failure is cached like a success and
//! is never retried, so every caller observes the same error.
//!
//! If the computation panics, the cell is returned to `Unresolved` and the
//! waiters are woken so that one of them can run it again.

use std::fmt;
use std::sync::{Condvar, Mutex, MutexGuard};
use std::thread::{self, ThreadId};

use crate::result::SystemError;

enum State<T, E> {
    Unresolved,
    Resolving(ThreadId),
    Resolved(T),
    Failed(E),
}

/// A thread-safe, single-execution memoized value.
pub struct Memo<T, E> {
    state: Mutex<State<T, E>>,
    cv: Condvar,
}

impl<T, E> Memo<T, E> {
    /// Creates an unresolved cell.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::Unresolved),
            cv: Condvar::new(),
        }
    }

    /// Creates a cell that is already resolved to `value`.
    pub fn resolved(value: T) -> Self {
        Self {
            state: Mutex::new(State::Resolved(value)),
            cv: Condvar::new(),
        }
    }

    /// Returns `true` once the computation has finished, successfully or not.
    pub fn is_settled(&self) -> bool {
        matches!(*self.lock(), State::Resolved(_) | State::Failed(_))
    }

    // A panic inside a computation never leaves the mutex poisoned because
    // the lock is not held while the computation runs; recover anyway so
    // that no caller ever panics on a poisoned lock.
    fn lock(&self) -> MutexGuard<'_, State<T, E>> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poison) => poison.into_inner(),
        }
    }
}

impl<T, E> Memo<T, E>
where
    T: Clone,
    E: Clone + From<SystemError>,
{
    /// Returns the memoized outcome, running `init` if no caller has yet.
    ///
    /// A re-entrant call from the thread that is currently resolving this
    /// cell returns a [`SystemError`] instead of deadlocking.
    pub fn get_or_try_init<F>(&self, init: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        let current = thread::current().id();
        let mut state = self.lock();
        loop {
            match &*state {
                State::Resolved(value) => return Ok(value.clone()),
                State::Failed(err) => return Err(err.clone()),
                State::Resolving(owner) if *owner == current => {
                    return Err(E::from(SystemError::new(
                        "re-entrant access to a memoized value that is being resolved",
                    )));
                }
                State::Resolving(_) => {
                    state = match self.cv.wait(state) {
                        Ok(guard) => guard,
                        Err(poison) => poison.into_inner(),
                    };
                }
                State::Unresolved => break,
            }
        }
        *state = State::Resolving(current);
        drop(state);

        let mut guard = ResetOnUnwind {
            memo: self,
            armed: true,
        };
        let result = init();
        guard.armed = false;

        let mut state = self.lock();
        *state = match &result {
            Ok(value) => State::Resolved(value.clone()),
            Err(err) => State::Failed(err.clone()),
        };
        self.cv.notify_all();
        result
    }

    /// Returns the outcome if the cell has settled, without computing it.
    pub fn peek(&self) -> Option<Result<T, E>> {
        match &*self.lock() {
            State::Resolved(value) => Some(Ok(value.clone())),
            State::Failed(err) => Some(Err(err.clone())),
            State::Unresolved | State::Resolving(_) => None,
        }
    }
}

impl<T, E> Default for Memo<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> fmt::Debug for Memo<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &*self.lock() {
            State::Unresolved => "unresolved",
            State::Resolving(_) => "resolving",
            State::Resolved(_) => "resolved",
            State::Failed(_) => "failed",
        };
        f.debug_struct("Memo").field("state", &state).finish()
    }
}

struct ResetOnUnwind<'a, T, E> {
    memo: &'a Memo<T, E>,
    armed: bool,
}

impl<T, E> Drop for ResetOnUnwind<'_, T, E> {
    fn drop(&mut self) {
        if self.armed {
            *self.memo.lock() = State::Unresolved;
            self.memo.cv.notify_all();
        }
    }
}

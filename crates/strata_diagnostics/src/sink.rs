//! Thread-safe diagnostic accumulator for parallel compilation.

use crate::diagnostic::Diagnostic;
use crate::severity::Severity;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

/// A thread-safe accumulator for diagnostics.
///
/// Worker threads emit concurrently; the error count is tracked atomically
/// so that `has_errors` never takes the lock.
#[derive(Debug, Default)]
pub struct DiagnosticSink {
    diagnostics: Mutex<Vec<Diagnostic>>,
    error_count: AtomicUsize,
}

impl DiagnosticSink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Emits a diagnostic.
    pub fn emit(&self, diag: Diagnostic) {
        if diag.severity == Severity::Error {
            self.error_count.fetch_add(1, Ordering::Relaxed);
        }
        self.lock().push(diag);
    }

    /// Returns `true` if any error has been emitted.
    pub fn has_errors(&self) -> bool {
        self.error_count.load(Ordering::Relaxed) > 0
    }

    /// The number of errors emitted so far.
    pub fn error_count(&self) -> usize {
        self.error_count.load(Ordering::Relaxed)
    }

    /// Takes all accumulated diagnostics, leaving the sink empty.
    pub fn take_all(&self) -> Vec<Diagnostic> {
        self.error_count.store(0, Ordering::Relaxed);
        std::mem::take(&mut *self.lock())
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Diagnostic>> {
        match self.diagnostics.lock() {
            Ok(guard) => guard,
            Err(poison) => poison.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::{Category, DiagnosticCode};
    use std::sync::Arc;
    use strata_source::Span;

    fn make_error() -> Diagnostic {
        Diagnostic::error(DiagnosticCode::new(Category::Parse, 1), "bad", Span::DUMMY)
    }

    fn make_warning() -> Diagnostic {
        Diagnostic::warning(DiagnosticCode::new(Category::Warning, 1), "meh", Span::DUMMY)
    }

    #[test]
    fn counts_only_errors() {
        let sink = DiagnosticSink::new();
        sink.emit(make_warning());
        assert!(!sink.has_errors());
        sink.emit(make_error());
        assert_eq!(sink.error_count(), 1);
        assert_eq!(sink.take_all().len(), 2);
        assert!(!sink.has_errors());
    }

    #[test]
    fn concurrent_emission() {
        let sink = Arc::new(DiagnosticSink::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let sink = Arc::clone(&sink);
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        sink.emit(make_error());
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(sink.error_count(), 100);
    }
}

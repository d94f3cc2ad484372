//! Diagnostic codes and constructors for link errors and compile warnings.
//!
//! Codes `L200`--`L205` are link errors. `W300`--`W301` are warnings, which
//! never fail a build but are recorded on the image.

use strata_diagnostics::{Category, Diagnostic, DiagnosticCode, Label};
use strata_source::Span;

/// A type reference that does not resolve to a visible message or enum.
pub const L200: DiagnosticCode = DiagnosticCode::new(Category::Link, 200);

/// A symbol defined more than once.
pub const L201: DiagnosticCode = DiagnosticCode::new(Category::Link, 201);

/// An import of a file that is not available.
pub const L202: DiagnosticCode = DiagnosticCode::new(Category::Link, 202);

/// Files that import each other.
pub const L203: DiagnosticCode = DiagnosticCode::new(Category::Link, 203);

/// Two fields of a message with the same number.
pub const L204: DiagnosticCode = DiagnosticCode::new(Category::Link, 204);

/// Two fields of a message with the same name.
pub const L205: DiagnosticCode = DiagnosticCode::new(Category::Link, 205);

/// An import none of whose symbols are used.
pub const W300: DiagnosticCode = DiagnosticCode::new(Category::Warning, 300);

/// A file without a `syntax` statement.
pub const W301: DiagnosticCode = DiagnosticCode::new(Category::Warning, 301);

pub(crate) fn error_unknown_type(name: &str, span: Span) -> Diagnostic {
    Diagnostic::error(L200, format!("\"{name}\" is not defined"), span)
}

pub(crate) fn error_type_not_imported(name: &str, defined_in: &str, span: Span) -> Diagnostic {
    Diagnostic::error(
        L200,
        format!("\"{name}\" is defined in \"{defined_in}\", which is not imported"),
        span,
    )
}

pub(crate) fn error_duplicate_symbol(name: &str, span: Span, first: Span) -> Diagnostic {
    Diagnostic::error(L201, format!("symbol \"{name}\" is already defined"), span)
        .with_label(Label::secondary(first, "first defined here"))
}

pub(crate) fn error_import_not_found(path: &str, span: Span) -> Diagnostic {
    Diagnostic::error(L202, format!("import \"{path}\" was not found"), span)
}

pub(crate) fn error_import_cycle(cycle: &str, span: Span) -> Diagnostic {
    Diagnostic::error(L203, format!("import cycle: {cycle}"), span)
}

pub(crate) fn error_duplicate_field_number(
    message: &str,
    number: u32,
    span: Span,
    first: Span,
) -> Diagnostic {
    Diagnostic::error(
        L204,
        format!("field number {number} is already used in message \"{message}\""),
        span,
    )
    .with_label(Label::secondary(first, "first used here"))
}

pub(crate) fn error_duplicate_field_name(
    message: &str,
    name: &str,
    span: Span,
    first: Span,
) -> Diagnostic {
    Diagnostic::error(
        L205,
        format!("field \"{name}\" is already defined in message \"{message}\""),
        span,
    )
    .with_label(Label::secondary(first, "first defined here"))
}

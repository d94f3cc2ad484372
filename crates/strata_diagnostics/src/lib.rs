//! Diagnostics produced while compiling and checking schema files.
//!
//! Compiler stages emit structured [`Diagnostic`]s with byte spans into a
//! thread-safe [`DiagnosticSink`]. At the edge of the toolchain they are
//! converted into [`FileAnnotation`]s: position-bearing, path-tagged records
//! that are returned as data rather than raised as errors.

#![warn(missing_docs)]

pub mod annotation;
pub mod code;
pub mod diagnostic;
pub mod label;
pub mod severity;
pub mod sink;

pub use annotation::{dedup_and_sort, format_annotations, AnnotationFormat, FileAnnotation};
pub use code::{Category, DiagnosticCode};
pub use diagnostic::Diagnostic;
pub use label::{Label, LabelStyle};
pub use severity::Severity;
pub use sink::DiagnosticSink;

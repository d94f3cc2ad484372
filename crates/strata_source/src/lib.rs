//! Source text management and span tracking for schema files.
//!
//! This crate provides the [`SourceDb`] holding the text of every schema file
//! in a compilation, [`FileId`] and [`Span`] types for tracking source
//! locations, and [`ResolvedSpan`] for converting byte offsets to 1-based
//! line/column coordinates.

#![warn(missing_docs)]

pub mod file_id;
pub mod resolved_span;
pub mod source_db;
pub mod source_file;
pub mod span;

pub use file_id::FileId;
pub use resolved_span::ResolvedSpan;
pub use source_db::SourceDb;
pub use source_file::SourceFile;
pub use span::Span;

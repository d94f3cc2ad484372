//! Central table of all schema files in a compilation.

use crate::file_id::FileId;
use crate::resolved_span::ResolvedSpan;
use crate::source_file::SourceFile;
use crate::span::Span;

/// Owns the text of every loaded file and resolves spans to line/column
/// coordinates.
#[derive(Debug, Default)]
pub struct SourceDb {
    files: Vec<SourceFile>,
}

impl SourceDb {
    /// Creates an empty database.
    pub fn new() -> Self {
        Self { files: Vec::new() }
    }

    /// Adds a file and returns its [`FileId`].
    pub fn add_source(
        &mut self,
        path: impl Into<String>,
        external_path: impl Into<String>,
        content: String,
    ) -> FileId {
        let id = self.next_id();
        self.files
            .push(SourceFile::new(id, path.into(), external_path.into(), content));
        id
    }

    /// The ID the next added file will receive.
    ///
    /// Parallel loaders reserve a contiguous range starting here and then
    /// add their files in ID order.
    pub fn next_id(&self) -> FileId {
        FileId::from_raw(self.files.len() as u32)
    }

    /// Number of files loaded.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Returns `true` if no files are loaded.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Returns the file for `id`, if it exists.
    pub fn get_file(&self, id: FileId) -> Option<&SourceFile> {
        self.files.get(id.index())
    }

    /// Iterates over all files in ID order.
    pub fn files(&self) -> impl Iterator<Item = &SourceFile> {
        self.files.iter()
    }

    /// Resolves a span to line/column coordinates. Dummy or unknown spans
    /// resolve to `None`.
    pub fn resolve_span(&self, span: Span) -> Option<ResolvedSpan> {
        let file = self.get_file(span.file)?;
        let (start_line, start_col) = file.line_col(span.start);
        let (end_line, end_col) = file.line_col(span.end.saturating_sub(1).max(span.start));
        Some(ResolvedSpan {
            file_path: file.path.clone(),
            external_path: file.external_path.clone(),
            start_line,
            start_col,
            end_line,
            end_col,
        })
    }
}

//! File-positioned annotations returned to callers as data.
//!
//! A [`FileAnnotation`] is the user-facing form of a compile diagnostic or a
//! check finding: the file's paths, 1-based positions (zero when unknown), a
//! type string such as `COMPILE` or a rule ID, and a message.

use std::fmt;

use serde::{Deserialize, Serialize};
use strata_source::SourceDb;

use crate::diagnostic::Diagnostic;

/// One positioned finding against a file.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize)]
pub struct FileAnnotation {
    /// The module-relative path, if the finding is tied to a file.
    pub path: Option<String>,
    /// The user-facing path, if the finding is tied to a file.
    pub external_path: Option<String>,
    /// The starting line, 1-based, or 0 when unknown.
    pub start_line: u32,
    /// The starting column, 1-based, or 0 when unknown.
    pub start_column: u32,
    /// The ending line, 1-based, or 0 when unknown.
    pub end_line: u32,
    /// The ending column, 1-based, or 0 when unknown.
    pub end_column: u32,
    /// The kind of finding, such as `COMPILE` or a rule ID.
    #[serde(rename = "type")]
    pub type_string: String,
    /// The message.
    pub message: String,
}

impl FileAnnotation {
    /// Creates an annotation with no position.
    pub fn new(
        path: Option<(String, String)>,
        type_string: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let (path, external_path) = match path {
            Some((path, external)) => (Some(path), Some(external)),
            None => (None, None),
        };
        Self {
            path,
            external_path,
            start_line: 0,
            start_column: 0,
            end_line: 0,
            end_column: 0,
            type_string: type_string.into(),
            message: message.into(),
        }
    }

    /// Sets the start and end position. Zero lines or columns mean unknown.
    pub fn at(mut self, start_line: u32, start_column: u32, end_line: u32, end_column: u32) -> Self {
        self.start_line = start_line;
        self.start_column = start_column;
        self.end_line = end_line;
        self.end_column = end_column;
        self
    }

    /// Converts a diagnostic by resolving its primary span.
    ///
    /// The end position is set equal to the start position.
    pub fn from_diagnostic(diag: &Diagnostic, source_db: &SourceDb, type_string: &str) -> Self {
        match source_db.resolve_span(diag.primary_span) {
            Some(resolved) => Self::new(
                Some((resolved.file_path, resolved.external_path)),
                type_string,
                diag.message.clone(),
            )
            .at(
                resolved.start_line,
                resolved.start_col,
                resolved.start_line,
                resolved.start_col,
            ),
            None => Self::new(None, type_string, diag.message.clone()),
        }
    }
}

/// The `path:line:column:message` text form.
impl fmt::Display for FileAnnotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = self
            .external_path
            .as_deref()
            .or(self.path.as_deref())
            .unwrap_or("<input>");
        if self.start_line > 0 {
            write!(f, "{path}:{}:{}:{}", self.start_line, self.start_column, self.message)
        } else {
            write!(f, "{path}:{}", self.message)
        }
    }
}

/// Sorts annotations by path, position, type and message, and drops
/// duplicates.
pub fn dedup_and_sort(mut annotations: Vec<FileAnnotation>) -> Vec<FileAnnotation> {
    annotations.sort();
    annotations.dedup();
    annotations
}

/// Output formats for a list of annotations.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AnnotationFormat {
    /// One `path:line:column:message` line per annotation.
    Text,
    /// One JSON object per line.
    Json,
}

/// Renders annotations, one per line.
pub fn format_annotations(
    annotations: &[FileAnnotation],
    format: AnnotationFormat,
) -> Result<String, serde_json::Error> {
    let mut out = String::new();
    for annotation in annotations {
        match format {
            AnnotationFormat::Text => out.push_str(&annotation.to_string()),
            AnnotationFormat::Json => out.push_str(&serde_json::to_string(annotation)?),
        }
        out.push('\n');
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::{Category, DiagnosticCode};
    use strata_source::Span;

    fn annotation(path: &str, line: u32, message: &str) -> FileAnnotation {
        FileAnnotation::new(Some((path.to_string(), format!("mod/{path}"))), "COMPILE", message)
            .at(line, 1, line, 1)
    }

    #[test]
    fn from_diagnostic_resolves_position() {
        let mut db = SourceDb::new();
        let id = db.add_source("a.schema", "mod/a.schema", "syntax\nmessage X {".to_string());
        let diag = Diagnostic::error(
            DiagnosticCode::new(Category::Parse, 1),
            "expected '}'",
            Span::new(id, 7, 14),
        );
        let ann = FileAnnotation::from_diagnostic(&diag, &db, "COMPILE");
        assert_eq!(ann.path.as_deref(), Some("a.schema"));
        assert_eq!((ann.start_line, ann.start_column), (2, 1));
        assert_eq!((ann.end_line, ann.end_column), (2, 1));
        assert_eq!(ann.to_string(), "mod/a.schema:2:1:expected '}'");
    }

    #[test]
    fn dummy_span_has_no_path() {
        let db = SourceDb::new();
        let diag = Diagnostic::error(DiagnosticCode::new(Category::Link, 1), "boom", Span::DUMMY);
        let ann = FileAnnotation::from_diagnostic(&diag, &db, "COMPILE");
        assert!(ann.path.is_none());
        assert_eq!(ann.to_string(), "<input>:boom");
    }

    #[test]
    fn dedup_and_sort_orders_by_path_then_line() {
        let sorted = dedup_and_sort(vec![
            annotation("b.schema", 1, "x"),
            annotation("a.schema", 9, "y"),
            annotation("a.schema", 2, "z"),
            annotation("a.schema", 2, "z"),
        ]);
        let lines: Vec<String> = sorted.iter().map(ToString::to_string).collect();
        assert_eq!(
            lines,
            vec![
                "mod/a.schema:2:1:z",
                "mod/a.schema:9:1:y",
                "mod/b.schema:1:1:x"
            ]
        );
    }

    #[test]
    fn json_format_uses_type_key() {
        let out = format_annotations(&[annotation("a.schema", 1, "m")], AnnotationFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(out.trim()).unwrap();
        assert_eq!(value["type"], "COMPILE");
        assert_eq!(value["start_line"], 1);
    }
}

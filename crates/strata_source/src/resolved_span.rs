//! Spans resolved to line/column coordinates.

use std::fmt;

/// A span resolved to 1-based line/column coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSpan {
    /// The module-relative path of the file.
    pub file_path: String,
    /// The user-facing path of the file.
    pub external_path: String,
    /// The starting line number (1-based).
    pub start_line: u32,
    /// The starting column number (1-based).
    pub start_col: u32,
    /// The ending line number (1-based).
    pub end_line: u32,
    /// The ending column number (1-based).
    pub end_col: u32,
}

impl fmt::Display for ResolvedSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.external_path, self.start_line, self.start_col
        )
    }
}

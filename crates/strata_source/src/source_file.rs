//! A loaded schema file with line-start indexing for line/column lookup.

use crate::file_id::FileId;
use strata_cas::CasDigest;

/// One schema file loaded into a compilation.
#[derive(Debug)]
pub struct SourceFile {
    /// The identifier of this file within the [`SourceDb`](crate::SourceDb).
    pub id: FileId,
    /// The module-relative path the file was imported or requested by.
    pub path: String,
    /// The path shown to users, such as the on-disk location.
    pub external_path: String,
    /// The full text of the file.
    pub content: String,
    /// Byte offsets of each line start; the first entry is always 0.
    line_starts: Vec<u32>,
    /// Digest of the file content.
    pub content_digest: CasDigest,
}

impl SourceFile {
    /// Creates a file, precomputing line starts and the content digest.
    pub fn new(id: FileId, path: String, external_path: String, content: String) -> Self {
        let line_starts = compute_line_starts(&content);
        let content_digest = CasDigest::from_bytes(content.as_bytes());
        Self {
            id,
            path,
            external_path,
            content,
            line_starts,
            content_digest,
        }
    }

    /// Converts a byte offset into 1-based (line, column) coordinates.
    pub fn line_col(&self, byte_offset: u32) -> (u32, u32) {
        let line_idx = match self.line_starts.binary_search(&byte_offset) {
            Ok(idx) => idx,
            Err(idx) => idx - 1,
        };
        let line = (line_idx as u32) + 1;
        let col = byte_offset - self.line_starts[line_idx] + 1;
        (line, col)
    }

    /// Returns the text between two byte offsets.
    pub fn snippet(&self, start: u32, end: u32) -> &str {
        &self.content[start as usize..end as usize]
    }
}

fn compute_line_starts(content: &str) -> Vec<u32> {
    let mut starts = vec![0u32];
    for (i, byte) in content.bytes().enumerate() {
        if byte == b'\n' {
            starts.push((i + 1) as u32);
        }
    }
    starts
}

//! Opaque identifier for schema files loaded into a compilation.

use serde::{Deserialize, Serialize};

/// Opaque identifier for a file in the [`SourceDb`](crate::SourceDb).
///
/// IDs are dense and assigned in load order, so they double as indexes into
/// per-file tables.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize)]
pub struct FileId(u32);

impl FileId {
    /// A dummy file ID for locations that do not belong to any file.
    pub const DUMMY: FileId = FileId(u32::MAX);

    /// Creates a `FileId` from a raw index.
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw index.
    pub fn as_raw(self) -> u32 {
        self.0
    }

    /// Returns the raw index as a `usize`.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

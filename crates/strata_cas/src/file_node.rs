//! The (path, digest) pair at the leaves of a manifest.

use std::fmt;

use serde::{Deserialize, Serialize};
use strata_common::normalpath;

use crate::cas_digest::CasDigest;
use crate::error::CasError;

/// One file in a manifest: its normalized path and content digest.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct FileNode {
    path: String,
    digest: CasDigest,
}

impl FileNode {
    /// Creates a node, validating that `path` is a normalized object path
    /// without whitespace-only or newline content.
    pub fn new(path: impl Into<String>, digest: CasDigest) -> Result<Self, CasError> {
        let path = path.into();
        if path.contains('\n') || normalpath::validate_object_path(&path).is_err() {
            return Err(CasError::InvalidPath { path });
        }
        Ok(Self { path, digest })
    }

    /// The file's path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The digest of the file's content.
    pub fn digest(&self) -> &CasDigest {
        &self.digest
    }
}

/// The canonical manifest line: `<hex>  <path>`.
impl fmt::Display for FileNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}  {}", self.digest, self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_manifest_line() {
        let digest = CasDigest::from_bytes(b"a");
        let node = FileNode::new("x/a.schema", digest).unwrap();
        assert_eq!(node.to_string(), format!("{digest}  x/a.schema"));
    }

    #[test]
    fn rejects_bad_paths() {
        let digest = CasDigest::from_bytes(b"a");
        assert!(FileNode::new(".", digest).is_err());
        assert!(FileNode::new("../a", digest).is_err());
        assert!(FileNode::new("a\nb", digest).is_err());
    }
}

//! Manifests: path-sorted lists of file nodes and their digests.
//!
//! A manifest's canonical encoding is one `<hex>  <path>` line per file,
//! sorted by path, each terminated by `\n`. The manifest digest is the
//! SHA-256 of that encoding.

use std::collections::HashSet;
use std::fmt;
use std::io::Read;

use strata_common::Context;
use strata_storage::{walk_infos, ReadBucket, StorageError};

use crate::cas_digest::CasDigest;
use crate::error::CasError;
use crate::file_node::FileNode;

/// A set of file nodes held in path order.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct Manifest {
    nodes: Vec<FileNode>,
}

impl Manifest {
    /// Creates a manifest from nodes in any order. Nodes are sorted by path;
    /// duplicate paths are rejected.
    pub fn new(mut nodes: Vec<FileNode>) -> Result<Self, CasError> {
        nodes.sort_by(|a, b| a.path().cmp(b.path()));
        for pair in nodes.windows(2) {
            if pair[0].path() == pair[1].path() {
                return Err(CasError::DuplicatePath {
                    path: pair[0].path().to_string(),
                });
            }
        }
        Ok(Self { nodes })
    }

    /// Parses the canonical encoding.
    pub fn parse(encoded: &str) -> Result<Self, CasError> {
        let mut nodes = Vec::new();
        let mut seen = HashSet::new();
        for (index, line) in encoded.lines().enumerate() {
            let line_number = index + 1;
            let (hex, path) = line.split_once("  ").ok_or_else(|| CasError::InvalidManifest {
                line: line_number,
                reason: "expected \"<digest>  <path>\"".to_string(),
            })?;
            let digest = CasDigest::parse_hex(hex).map_err(|err| CasError::InvalidManifest {
                line: line_number,
                reason: err.to_string(),
            })?;
            if !seen.insert(path.to_string()) {
                return Err(CasError::DuplicatePath {
                    path: path.to_string(),
                });
            }
            nodes.push(FileNode::new(path, digest)?);
        }
        Self::new(nodes)
    }

    /// The nodes in path order.
    pub fn file_nodes(&self) -> &[FileNode] {
        &self.nodes
    }

    /// Looks up the node for `path`.
    pub fn get(&self, path: &str) -> Option<&FileNode> {
        self.nodes
            .binary_search_by(|node| node.path().cmp(path))
            .ok()
            .map(|index| &self.nodes[index])
    }

    /// The digest of the canonical encoding.
    pub fn digest(&self) -> CasDigest {
        digest_for_sorted_file_nodes(&self.nodes)
    }
}

impl fmt::Display for Manifest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for node in &self.nodes {
            writeln!(f, "{node}")?;
        }
        Ok(())
    }
}

/// Digests a byte stream.
pub fn digest_for_content(reader: &mut dyn Read) -> Result<CasDigest, CasError> {
    CasDigest::from_reader(reader).map_err(|err| {
        CasError::Storage(StorageError::Io {
            path: "<stream>".to_string(),
            source: std::sync::Arc::new(err),
        })
    })
}

/// Digests file nodes in the order given.
///
/// Callers must sort `nodes` by path first; this function does not re-sort.
/// [`Manifest::new`] performs the sort and should be preferred.
pub fn digest_for_sorted_file_nodes(nodes: &[FileNode]) -> CasDigest {
    let mut encoded = String::new();
    for node in nodes {
        encoded.push_str(&node.to_string());
        encoded.push('\n');
    }
    CasDigest::from_bytes(encoded.as_bytes())
}

/// Builds the manifest of every object in `bucket`.
pub fn manifest_for_bucket(ctx: &Context, bucket: &dyn ReadBucket) -> Result<Manifest, CasError> {
    let mut nodes = Vec::new();
    for info in walk_infos(bucket, ctx, ".")? {
        let mut object = bucket.get(ctx, &info.path)?;
        let digest = digest_for_content(&mut object)?;
        nodes.push(FileNode::new(info.path, digest)?);
    }
    Manifest::new(nodes)
}

//! Content-addressed digests for files, file sets, modules, and plugins.
//!
//! The engine is pure: equal inputs always produce equal digests, and no
//! function here performs I/O beyond reading the buckets it is handed.
//! Digests are SHA-256 values tagged with a [`DigestType`]; digests of
//! different types never compare equal.

#![warn(missing_docs)]

pub mod cas_digest;
pub mod digest;
pub mod error;
pub mod file_node;
pub mod manifest;

pub use cas_digest::CasDigest;
pub use digest::{b4_digest, b5_digest, digest_equal, p1_digest, Digest, DigestType};
pub use error::CasError;
pub use file_node::FileNode;
pub use manifest::{digest_for_content, digest_for_sorted_file_nodes, manifest_for_bucket, Manifest};

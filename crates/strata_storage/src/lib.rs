//! Path-addressed virtual file systems ("buckets").
//!
//! A bucket serves objects identified by normalized relative paths. Buckets
//! compose: [`MappedBucket`] translates a sub-directory into its own
//! namespace and filters it with [`Matcher`]s, and [`MultiBucket`] overlays
//! several buckets where the first-listed bucket wins on path collisions.
//! Reads of absent paths fail with [`StorageError::NotExist`], which callers
//! use to tell an optional missing file apart from a real I/O failure.

#![warn(missing_docs)]

pub mod bucket;
pub mod error;
pub mod mapped;
pub mod matcher;
pub mod mem;
pub mod multi;
pub mod os;

pub use bucket::{read_all, walk_infos, ObjectInfo, ReadBucket, ReadObject, WriteBucket};
pub use error::StorageError;
pub use mapped::{MappedBucket, Mapper};
pub use matcher::Matcher;
pub use mem::MemBucket;
pub use multi::MultiBucket;
pub use os::OsBucket;

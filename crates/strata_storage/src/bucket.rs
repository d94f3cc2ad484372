//! The bucket traits and the object metadata they serve.

use std::fmt;
use std::io::{self, Read};

use strata_common::Context;

use crate::error::StorageError;

/// Metadata about one object in a bucket.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ObjectInfo {
    /// The normalized path within the bucket that served the object.
    pub path: String,
    /// A path suitable for display to users, such as the on-disk location.
    ///
    /// Mapping a bucket changes `path` but keeps the delegate's
    /// `external_path`.
    pub external_path: String,
}

impl ObjectInfo {
    /// Creates object metadata whose external path equals its path.
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            external_path: path.clone(),
            path,
        }
    }
}

/// An open object: its metadata plus a reader over its content.
pub struct ReadObject {
    info: ObjectInfo,
    reader: Box<dyn Read + Send>,
}

impl ReadObject {
    /// Wraps a reader with its metadata.
    pub fn new(info: ObjectInfo, reader: Box<dyn Read + Send>) -> Self {
        Self { info, reader }
    }

    /// Metadata for this object.
    pub fn info(&self) -> &ObjectInfo {
        &self.info
    }

    /// Replaces the metadata, keeping the reader.
    pub fn with_info(self, info: ObjectInfo) -> Self {
        Self {
            info,
            reader: self.reader,
        }
    }
}

impl Read for ReadObject {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

impl fmt::Debug for ReadObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadObject").field("info", &self.info).finish()
    }
}

/// A read-only, path-addressed store of objects.
///
/// Implementations must be safe for concurrent reads.
pub trait ReadBucket: Send + Sync {
    /// Opens the object at `path`.
    ///
    /// Fails with [`StorageError::NotExist`] if there is no such object.
    fn get(&self, ctx: &Context, path: &str) -> Result<ReadObject, StorageError>;

    /// Returns metadata for the object at `path`.
    ///
    /// Fails with [`StorageError::NotExist`] if there is no such object.
    fn stat(&self, ctx: &Context, path: &str) -> Result<ObjectInfo, StorageError>;

    /// Calls `f` for every object equal to or under `prefix`. A prefix of
    /// `"."` walks the whole bucket. A missing prefix walks nothing.
    fn walk(
        &self,
        ctx: &Context,
        prefix: &str,
        f: &mut dyn FnMut(ObjectInfo) -> Result<(), StorageError>,
    ) -> Result<(), StorageError>;
}

impl fmt::Debug for dyn ReadBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ReadBucket")
    }
}

/// A bucket that also accepts writes.
pub trait WriteBucket: ReadBucket {
    /// Stores `data` at `path`, replacing any existing object.
    fn put(&self, ctx: &Context, path: &str, data: Vec<u8>) -> Result<(), StorageError>;

    /// Removes the object at `path`.
    ///
    /// Fails with [`StorageError::NotExist`] if there is no such object.
    fn delete(&self, ctx: &Context, path: &str) -> Result<(), StorageError>;
}

/// Reads the full content of the object at `path`.
pub fn read_all(
    bucket: &dyn ReadBucket,
    ctx: &Context,
    path: &str,
) -> Result<Vec<u8>, StorageError> {
    let mut object = bucket.get(ctx, path)?;
    let mut data = Vec::new();
    object
        .read_to_end(&mut data)
        .map_err(|err| StorageError::io(path, err))?;
    Ok(data)
}

/// Collects every object under `prefix`, sorted by path.
pub fn walk_infos(
    bucket: &dyn ReadBucket,
    ctx: &Context,
    prefix: &str,
) -> Result<Vec<ObjectInfo>, StorageError> {
    let mut infos = Vec::new();
    bucket.walk(ctx, prefix, &mut |info| {
        infos.push(info);
        Ok(())
    })?;
    infos.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(infos)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::mem::MemBucket;

    fn open(bucket: Arc<dyn ReadBucket>, path: &str) -> Result<Arc<dyn ReadBucket>, StorageError> {
        bucket.stat(&Context::new(), path)?;
        Ok(bucket)
    }

    #[test]
    fn shared_buckets_are_debug() {
        let bucket: Arc<dyn ReadBucket> = Arc::new(MemBucket::new());
        let err = open(bucket.clone(), "a.schema").unwrap_err();
        assert!(err.is_not_exist());
        assert_eq!(format!("{:?}", bucket), "ReadBucket");
    }

    #[test]
    fn read_all_returns_content() {
        let ctx = Context::new();
        let bucket = MemBucket::from_files([("a.schema", "message A {}")]).unwrap();
        assert_eq!(read_all(&bucket, &ctx, "a.schema").unwrap(), b"message A {}");
        assert!(read_all(&bucket, &ctx, "b.schema").unwrap_err().is_not_exist());
    }
}

//! An in-memory bucket.

use std::collections::BTreeMap;
use std::io::Cursor;
use std::sync::{Arc, RwLock};

use strata_common::{normalpath, Context};

use crate::bucket::{ObjectInfo, ReadBucket, ReadObject, WriteBucket};
use crate::error::StorageError;

/// A bucket held entirely in memory, keyed by normalized path.
#[derive(Debug, Default)]
pub struct MemBucket {
    objects: RwLock<BTreeMap<String, Arc<[u8]>>>,
}

impl MemBucket {
    /// Creates an empty bucket.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a bucket holding the given `(path, content)` pairs.
    pub fn from_files<P, D, I>(files: I) -> Result<Self, StorageError>
    where
        P: AsRef<str>,
        D: Into<Vec<u8>>,
        I: IntoIterator<Item = (P, D)>,
    {
        let mut objects = BTreeMap::new();
        for (path, data) in files {
            let path = path.as_ref();
            normalpath::validate_object_path(path)
                .map_err(|err| StorageError::invalid_path(path, err))?;
            objects.insert(path.to_string(), Arc::from(data.into()));
        }
        Ok(Self {
            objects: RwLock::new(objects),
        })
    }

    /// Number of objects in the bucket.
    pub fn len(&self) -> usize {
        self.read_objects().len()
    }

    /// Returns `true` if the bucket holds no objects.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read_objects(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<String, Arc<[u8]>>> {
        match self.objects.read() {
            Ok(guard) => guard,
            Err(poison) => poison.into_inner(),
        }
    }

    fn write_objects(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<String, Arc<[u8]>>> {
        match self.objects.write() {
            Ok(guard) => guard,
            Err(poison) => poison.into_inner(),
        }
    }
}

impl ReadBucket for MemBucket {
    fn get(&self, ctx: &Context, path: &str) -> Result<ReadObject, StorageError> {
        ctx.check()?;
        let data = self
            .read_objects()
            .get(path)
            .cloned()
            .ok_or_else(|| StorageError::NotExist {
                path: path.to_string(),
            })?;
        Ok(ReadObject::new(
            ObjectInfo::new(path),
            Box::new(Cursor::new(data)),
        ))
    }

    fn stat(&self, ctx: &Context, path: &str) -> Result<ObjectInfo, StorageError> {
        ctx.check()?;
        if self.read_objects().contains_key(path) {
            Ok(ObjectInfo::new(path))
        } else {
            Err(StorageError::NotExist {
                path: path.to_string(),
            })
        }
    }

    fn walk(
        &self,
        ctx: &Context,
        prefix: &str,
        f: &mut dyn FnMut(ObjectInfo) -> Result<(), StorageError>,
    ) -> Result<(), StorageError> {
        let paths: Vec<String> = self
            .read_objects()
            .keys()
            .filter(|path| normalpath::equals_or_contains(prefix, path))
            .cloned()
            .collect();
        for path in paths {
            ctx.check()?;
            f(ObjectInfo::new(path))?;
        }
        Ok(())
    }
}

impl WriteBucket for MemBucket {
    fn put(&self, ctx: &Context, path: &str, data: Vec<u8>) -> Result<(), StorageError> {
        ctx.check()?;
        normalpath::validate_object_path(path)
            .map_err(|err| StorageError::invalid_path(path, err))?;
        self.write_objects()
            .insert(path.to_string(), Arc::from(data));
        Ok(())
    }

    fn delete(&self, ctx: &Context, path: &str) -> Result<(), StorageError> {
        ctx.check()?;
        match self.write_objects().remove(path) {
            Some(_) => Ok(()),
            None => Err(StorageError::NotExist {
                path: path.to_string(),
            }),
        }
    }
}

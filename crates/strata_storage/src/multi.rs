//! An overlay of several buckets.

use std::collections::HashSet;
use std::sync::Arc;

use strata_common::Context;

use crate::bucket::{ObjectInfo, ReadBucket, ReadObject};
use crate::error::StorageError;

/// A union of buckets in which the first-listed bucket wins.
///
/// When more than one bucket holds a path, `get`, `stat` and `walk` all serve
/// the entry from the earliest bucket in the list and never report the
/// shadowed ones.
#[derive(Clone)]
pub struct MultiBucket {
    buckets: Vec<Arc<dyn ReadBucket>>,
}

impl MultiBucket {
    /// Creates an overlay of `buckets`, highest priority first.
    pub fn new(buckets: Vec<Arc<dyn ReadBucket>>) -> Self {
        Self { buckets }
    }
}

impl ReadBucket for MultiBucket {
    fn get(&self, ctx: &Context, path: &str) -> Result<ReadObject, StorageError> {
        for bucket in &self.buckets {
            match bucket.get(ctx, path) {
                Err(err) if err.is_not_exist() => continue,
                result => return result,
            }
        }
        Err(StorageError::NotExist {
            path: path.to_string(),
        })
    }

    fn stat(&self, ctx: &Context, path: &str) -> Result<ObjectInfo, StorageError> {
        for bucket in &self.buckets {
            match bucket.stat(ctx, path) {
                Err(err) if err.is_not_exist() => continue,
                result => return result,
            }
        }
        Err(StorageError::NotExist {
            path: path.to_string(),
        })
    }

    fn walk(
        &self,
        ctx: &Context,
        prefix: &str,
        f: &mut dyn FnMut(ObjectInfo) -> Result<(), StorageError>,
    ) -> Result<(), StorageError> {
        let mut seen: HashSet<String> = HashSet::new();
        for bucket in &self.buckets {
            bucket.walk(ctx, prefix, &mut |info| {
                if seen.insert(info.path.clone()) {
                    f(info)
                } else {
                    Ok(())
                }
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bucket::{read_all, walk_infos};
    use crate::mem::MemBucket;

    fn overlay() -> MultiBucket {
        let first: Arc<dyn ReadBucket> =
            Arc::new(MemBucket::from_files([("shared.schema", "first"), ("one.schema", "1")]).unwrap());
        let second: Arc<dyn ReadBucket> =
            Arc::new(MemBucket::from_files([("shared.schema", "second"), ("two.schema", "2")]).unwrap());
        MultiBucket::new(vec![first, second])
    }

    #[test]
    fn first_listed_bucket_wins_on_collision() {
        let ctx = Context::new();
        let bucket = overlay();
        assert_eq!(read_all(&bucket, &ctx, "shared.schema").unwrap(), b"first");
    }

    #[test]
    fn walk_reports_each_path_once() {
        let ctx = Context::new();
        let paths: Vec<String> = walk_infos(&overlay(), &ctx, ".")
            .unwrap()
            .into_iter()
            .map(|info| info.path)
            .collect();
        assert_eq!(paths, vec!["one.schema", "shared.schema", "two.schema"]);
    }

    #[test]
    fn falls_through_to_later_buckets() {
        let ctx = Context::new();
        let bucket = overlay();
        assert_eq!(read_all(&bucket, &ctx, "two.schema").unwrap(), b"2");
        assert!(bucket.stat(&ctx, "three.schema").unwrap_err().is_not_exist());
    }
}

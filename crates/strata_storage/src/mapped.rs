//! Buckets that re-root and filter a delegate bucket.

use std::sync::Arc;

use strata_common::{normalpath, Context};

use crate::bucket::{ObjectInfo, ReadBucket, ReadObject};
use crate::error::StorageError;
use crate::matcher::Matcher;

/// One step in the translation from delegate paths to mapped paths.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Mapper {
    /// Keeps only paths inside this directory and strips it.
    Prefix(String),
    /// Keeps only paths that satisfy the matcher at this stage.
    Match(Matcher),
}

/// A view of a delegate bucket through an ordered chain of [`Mapper`]s.
///
/// Mappers apply in order from the delegate's namespace to this bucket's
/// namespace, so a matcher listed after a prefix sees prefix-relative paths.
/// External paths are passed through from the delegate unchanged.
#[derive(Clone)]
pub struct MappedBucket {
    delegate: Arc<dyn ReadBucket>,
    mappers: Vec<Mapper>,
}

impl MappedBucket {
    /// Creates a mapped view over `delegate`.
    pub fn new(delegate: Arc<dyn ReadBucket>, mappers: Vec<Mapper>) -> Self {
        Self { delegate, mappers }
    }

    /// Maps a delegate path into this bucket's namespace.
    pub fn map_path(&self, delegate_path: &str) -> Option<String> {
        let mut path = delegate_path.to_string();
        for mapper in &self.mappers {
            match mapper {
                Mapper::Prefix(prefix) => {
                    if !normalpath::contains(prefix, &path) {
                        return None;
                    }
                    path = normalpath::rel(prefix, &path).ok()?;
                }
                Mapper::Match(matcher) => {
                    if !matcher.matches(&path) {
                        return None;
                    }
                }
            }
        }
        Some(path)
    }

    /// Maps a path in this bucket's namespace back to the delegate.
    pub fn unmap_path(&self, path: &str) -> Option<String> {
        let mut current = path.to_string();
        for mapper in self.mappers.iter().rev() {
            match mapper {
                Mapper::Prefix(prefix) => current = normalpath::join(prefix, &current),
                Mapper::Match(matcher) => {
                    if !matcher.matches(&current) {
                        return None;
                    }
                }
            }
        }
        Some(current)
    }

    fn unmap_prefix(&self, prefix: &str) -> String {
        let mut current = prefix.to_string();
        for mapper in self.mappers.iter().rev() {
            if let Mapper::Prefix(dir) = mapper {
                current = normalpath::join(dir, &current);
            }
        }
        current
    }

    fn not_exist(path: &str) -> StorageError {
        StorageError::NotExist {
            path: path.to_string(),
        }
    }
}

impl ReadBucket for MappedBucket {
    fn get(&self, ctx: &Context, path: &str) -> Result<ReadObject, StorageError> {
        let delegate_path = self.unmap_path(path).ok_or_else(|| Self::not_exist(path))?;
        let object = self.delegate.get(ctx, &delegate_path).map_err(|err| {
            if err.is_not_exist() {
                Self::not_exist(path)
            } else {
                err
            }
        })?;
        let info = ObjectInfo {
            path: path.to_string(),
            external_path: object.info().external_path.clone(),
        };
        Ok(object.with_info(info))
    }

    fn stat(&self, ctx: &Context, path: &str) -> Result<ObjectInfo, StorageError> {
        let delegate_path = self.unmap_path(path).ok_or_else(|| Self::not_exist(path))?;
        let info = self.delegate.stat(ctx, &delegate_path).map_err(|err| {
            if err.is_not_exist() {
                Self::not_exist(path)
            } else {
                err
            }
        })?;
        Ok(ObjectInfo {
            path: path.to_string(),
            external_path: info.external_path,
        })
    }

    fn walk(
        &self,
        ctx: &Context,
        prefix: &str,
        f: &mut dyn FnMut(ObjectInfo) -> Result<(), StorageError>,
    ) -> Result<(), StorageError> {
        let delegate_prefix = self.unmap_prefix(prefix);
        self.delegate.walk(ctx, &delegate_prefix, &mut |info| {
            match self.map_path(&info.path) {
                Some(path) if normalpath::equals_or_contains(prefix, &path) => f(ObjectInfo {
                    path,
                    external_path: info.external_path,
                }),
                _ => Ok(()),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bucket::{read_all, walk_infos};
    use crate::mem::MemBucket;

    fn delegate() -> Arc<dyn ReadBucket> {
        Arc::new(
            MemBucket::from_files([
                ("mod/proto/a.schema", "a"),
                ("mod/proto/internal/b.schema", "b"),
                ("mod/proto/notes.txt", "n"),
                ("mod/README.md", "readme"),
                ("other/c.schema", "c"),
            ])
            .unwrap(),
        )
    }

    fn paths(bucket: &dyn ReadBucket) -> Vec<String> {
        walk_infos(bucket, &Context::new(), ".")
            .unwrap()
            .into_iter()
            .map(|info| info.path)
            .collect()
    }

    #[test]
    fn prefix_strips_directory() {
        let bucket = MappedBucket::new(delegate(), vec![Mapper::Prefix("mod".into())]);
        assert_eq!(
            paths(&bucket),
            vec![
                "README.md",
                "proto/a.schema",
                "proto/internal/b.schema",
                "proto/notes.txt"
            ]
        );
        let data = read_all(&bucket, &Context::new(), "proto/a.schema").unwrap();
        assert_eq!(data, b"a");
    }

    #[test]
    fn matchers_after_prefix_see_relative_paths() {
        let bucket = MappedBucket::new(
            delegate(),
            vec![
                Mapper::Prefix("mod".into()),
                Mapper::Match(Matcher::ext(".schema")),
                Mapper::Prefix("proto".into()),
                Mapper::Match(Matcher::not(Matcher::Contained("internal".into()))),
            ],
        );
        assert_eq!(paths(&bucket), vec!["a.schema"]);
        let ctx = Context::new();
        assert!(bucket.stat(&ctx, "internal/b.schema").unwrap_err().is_not_exist());
        assert!(bucket.stat(&ctx, "notes.txt").unwrap_err().is_not_exist());
        assert_eq!(bucket.unmap_path("a.schema").as_deref(), Some("mod/proto/a.schema"));
    }

    #[test]
    fn external_path_is_preserved() {
        let bucket = MappedBucket::new(delegate(), vec![Mapper::Prefix("other".into())]);
        let info = bucket.stat(&Context::new(), "c.schema").unwrap();
        assert_eq!(info.path, "c.schema");
        assert_eq!(info.external_path, "other/c.schema");
    }

    #[test]
    fn walk_with_sub_prefix() {
        let bucket = MappedBucket::new(delegate(), vec![Mapper::Prefix("mod".into())]);
        let infos = walk_infos(&bucket, &Context::new(), "proto/internal").unwrap();
        assert_eq!(infos.len(), 1);
        assert_eq!(infos[0].path, "proto/internal/b.schema");
    }
}

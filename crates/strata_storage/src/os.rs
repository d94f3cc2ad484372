//! A bucket backed by a directory on the local file system.

use std::fs::File;
use std::path::{Path, PathBuf};

use strata_common::{normalpath, Context};
use walkdir::WalkDir;

use crate::bucket::{ObjectInfo, ReadBucket, ReadObject, WriteBucket};
use crate::error::StorageError;

/// A bucket rooted at a directory.
///
/// Writes create missing parent directories. External paths are the on-disk locations of the objects.
#[derive(Clone, Debug)]
pub struct OsBucket {
    root: PathBuf,
}

impl OsBucket {
    /// Creates a bucket rooted at `root`. The directory must exist.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        let metadata =
            std::fs::metadata(&root).map_err(|err| StorageError::io(root.display().to_string(), err))?;
        if !metadata.is_dir() {
            return Err(StorageError::Io {
                path: root.display().to_string(),
                source: std::sync::Arc::new(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "bucket root is not a directory",
                )),
            });
        }
        Ok(Self { root })
    }

    /// The root directory of this bucket.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, path: &str) -> Result<PathBuf, StorageError> {
        normalpath::validate_object_path(path)
            .map_err(|err| StorageError::invalid_path(path, err))?;
        Ok(self.root.join(path))
    }

    fn info_for(&self, path: &str, full: &Path) -> ObjectInfo {
        ObjectInfo {
            path: path.to_string(),
            external_path: full.display().to_string(),
        }
    }
}

impl ReadBucket for OsBucket {
    fn get(&self, ctx: &Context, path: &str) -> Result<ReadObject, StorageError> {
        ctx.check()?;
        let info = self.stat(ctx, path)?;
        let full = self.object_path(path)?;
        let file = File::open(&full).map_err(|err| StorageError::io(path, err))?;
        Ok(ReadObject::new(info, Box::new(file)))
    }

    fn stat(&self, ctx: &Context, path: &str) -> Result<ObjectInfo, StorageError> {
        ctx.check()?;
        let full = self.object_path(path)?;
        let metadata = std::fs::metadata(&full).map_err(|err| StorageError::io(path, err))?;
        if !metadata.is_file() {
            return Err(StorageError::NotExist {
                path: path.to_string(),
            });
        }
        Ok(self.info_for(path, &full))
    }

    fn walk(
        &self,
        ctx: &Context,
        prefix: &str,
        f: &mut dyn FnMut(ObjectInfo) -> Result<(), StorageError>,
    ) -> Result<(), StorageError> {
        let start = if prefix == "." {
            self.root.clone()
        } else {
            self.object_path(prefix)?
        };
        if !start.exists() {
            return Ok(());
        }
        for entry in WalkDir::new(&start).sort_by_file_name() {
            ctx.check()?;
            let entry = entry.map_err(|err| {
                let path = err
                    .path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| start.display().to_string());
                match err.into_io_error() {
                    Some(io) => StorageError::io(path, io),
                    None => StorageError::Io {
                        path,
                        source: std::sync::Arc::new(std::io::Error::other(
                            "file system loop detected",
                        )),
                    },
                }
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            let components: Vec<String> = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            let path = components.join("/");
            f(self.info_for(&path, entry.path()))?;
        }
        Ok(())
    }
}

impl WriteBucket for OsBucket {
    fn put(&self, ctx: &Context, path: &str, data: Vec<u8>) -> Result<(), StorageError> {
        ctx.check()?;
        let full = self.object_path(path)?;
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent).map_err(|err| StorageError::io(path, err))?;
        }
        std::fs::write(&full, data).map_err(|err| StorageError::io(path, err))
    }

    fn delete(&self, ctx: &Context, path: &str) -> Result<(), StorageError> {
        ctx.check()?;
        let full = self.object_path(path)?;
        std::fs::remove_file(&full).map_err(|err| StorageError::io(path, err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bucket::{read_all, walk_infos};

    fn setup() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("proto/acme")).unwrap();
        std::fs::write(dir.path().join("proto/acme/pet.schema"), "syntax = \"schema1\";").unwrap();
        std::fs::write(dir.path().join("strata.toml"), "version = \"v1\"").unwrap();
        dir
    }

    #[test]
    fn reads_files() {
        let dir = setup();
        let ctx = Context::new();
        let bucket = OsBucket::new(dir.path()).unwrap();
        let data = read_all(&bucket, &ctx, "proto/acme/pet.schema").unwrap();
        assert_eq!(data, b"syntax = \"schema1\";");
    }

    #[test]
    fn external_path_is_on_disk_location() {
        let dir = setup();
        let ctx = Context::new();
        let bucket = OsBucket::new(dir.path()).unwrap();
        let info = bucket.stat(&ctx, "strata.toml").unwrap();
        assert_eq!(info.path, "strata.toml");
        assert!(info.external_path.ends_with("strata.toml"));
        assert!(info.external_path.len() > "strata.toml".len());
    }

    #[test]
    fn missing_file_and_directory_are_not_exist() {
        let dir = setup();
        let ctx = Context::new();
        let bucket = OsBucket::new(dir.path()).unwrap();
        assert!(bucket.stat(&ctx, "nope.schema").unwrap_err().is_not_exist());
        assert!(bucket.stat(&ctx, "proto").unwrap_err().is_not_exist());
    }

    #[test]
    fn walk_uses_forward_slashes() {
        let dir = setup();
        let ctx = Context::new();
        let bucket = OsBucket::new(dir.path()).unwrap();
        let paths: Vec<String> = walk_infos(&bucket, &ctx, ".")
            .unwrap()
            .into_iter()
            .map(|info| info.path)
            .collect();
        assert_eq!(paths, vec!["proto/acme/pet.schema", "strata.toml"]);
        assert!(walk_infos(&bucket, &ctx, "missing").unwrap().is_empty());
    }

    #[test]
    fn root_must_be_directory() {
        let dir = setup();
        assert!(OsBucket::new(dir.path().join("strata.toml")).is_err());
    }

    #[test]
    fn put_creates_directories_and_delete_removes() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = Context::new();
        let bucket = OsBucket::new(dir.path()).unwrap();
        bucket.put(&ctx, "a/b/c.schema", b"message C {}".to_vec()).unwrap();
        assert_eq!(read_all(&bucket, &ctx, "a/b/c.schema").unwrap(), b"message C {}");
        bucket.delete(&ctx, "a/b/c.schema").unwrap();
        assert!(bucket.stat(&ctx, "a/b/c.schema").unwrap_err().is_not_exist());
        assert!(bucket.delete(&ctx, "a/b/c.schema").unwrap_err().is_not_exist());
    }
}

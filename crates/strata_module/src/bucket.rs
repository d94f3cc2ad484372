//! Typed, read-only views over module files.

use std::collections::HashSet;
use std::io;
use std::sync::Arc;

use strata_common::Context;
use strata_storage::{ObjectInfo, ReadBucket, ReadObject, StorageError};

use crate::error::ModuleError;
use crate::file::{FileInfo, FileType, ModuleFile, DOC_FILE_PATHS, LICENSE_FILE_PATH};
use crate::module::Module;

/// A read-only view of the files of one or more modules.
pub trait ModuleReadBucket: Send + Sync {
    /// Opens the file at `path`.
    ///
    /// Fails with an error for which [`ModuleError::is_not_exist`] is `true`
    /// if the path is not part of the view.
    fn get_file(&self, ctx: &Context, path: &str) -> Result<ModuleFile, ModuleError>;

    /// Returns metadata for the file at `path`.
    fn stat_file_info(&self, ctx: &Context, path: &str) -> Result<FileInfo, ModuleError>;

    /// Calls `f` for every file, in path order. With `only_target_files`,
    /// non-target files are skipped.
    fn walk_file_infos(
        &self,
        ctx: &Context,
        only_target_files: bool,
        f: &mut dyn FnMut(FileInfo) -> Result<(), ModuleError>,
    ) -> Result<(), ModuleError>;

    /// Whether the view is expected to hold every file its schema files
    /// import, transitively.
    fn should_be_self_contained(&self) -> bool;
}

/// Collects every file of `bucket`, sorted by path.
pub fn get_file_infos(
    bucket: &dyn ModuleReadBucket,
    ctx: &Context,
) -> Result<Vec<FileInfo>, ModuleError> {
    collect(bucket, ctx, false)
}

/// Collects the target files of `bucket`, sorted by path.
pub fn get_target_file_infos(
    bucket: &dyn ModuleReadBucket,
    ctx: &Context,
) -> Result<Vec<FileInfo>, ModuleError> {
    collect(bucket, ctx, true)
}

fn collect(
    bucket: &dyn ModuleReadBucket,
    ctx: &Context,
    only_target_files: bool,
) -> Result<Vec<FileInfo>, ModuleError> {
    let mut infos = Vec::new();
    bucket.walk_file_infos(ctx, only_target_files, &mut |info| {
        infos.push(info);
        Ok(())
    })?;
    infos.sort_by(|a, b| a.path().cmp(b.path()));
    Ok(infos)
}

/// Returns the documentation file, if the view has one.
pub fn get_doc_file(
    bucket: &dyn ModuleReadBucket,
    ctx: &Context,
) -> Result<Option<ModuleFile>, ModuleError> {
    for path in DOC_FILE_PATHS {
        match bucket.get_file(ctx, path) {
            Ok(file) => return Ok(Some(file)),
            Err(err) if err.is_not_exist() => {}
            Err(err) => return Err(err),
        }
    }
    Ok(None)
}

/// Returns the license file, if the view has one.
pub fn get_license_file(
    bucket: &dyn ModuleReadBucket,
    ctx: &Context,
) -> Result<Option<ModuleFile>, ModuleError> {
    match bucket.get_file(ctx, LICENSE_FILE_PATH) {
        Ok(file) => Ok(Some(file)),
        Err(err) if err.is_not_exist() => Ok(None),
        Err(err) => Err(err),
    }
}

/// The files of several modules seen as one.
///
/// When two modules hold the same path, the module listed first wins.
#[derive(Clone)]
pub struct MultiModuleReadBucket {
    modules: Vec<Module>,
    self_contained: bool,
}

impl MultiModuleReadBucket {
    /// Creates a view over `modules`.
    pub fn new(modules: Vec<Module>, self_contained: bool) -> Self {
        Self {
            modules,
            self_contained,
        }
    }
}

impl ModuleReadBucket for MultiModuleReadBucket {
    fn get_file(&self, ctx: &Context, path: &str) -> Result<ModuleFile, ModuleError> {
        for module in &self.modules {
            match module.get_file(ctx, path) {
                Err(err) if err.is_not_exist() => continue,
                result => return result,
            }
        }
        Err(not_exist(path))
    }

    fn stat_file_info(&self, ctx: &Context, path: &str) -> Result<FileInfo, ModuleError> {
        for module in &self.modules {
            match module.stat_file_info(ctx, path) {
                Err(err) if err.is_not_exist() => continue,
                result => return result,
            }
        }
        Err(not_exist(path))
    }

    fn walk_file_infos(
        &self,
        ctx: &Context,
        only_target_files: bool,
        f: &mut dyn FnMut(FileInfo) -> Result<(), ModuleError>,
    ) -> Result<(), ModuleError> {
        let mut seen = HashSet::new();
        let mut infos = Vec::new();
        for module in &self.modules {
            module.walk_file_infos(ctx, false, &mut |info| {
                if seen.insert(info.path().to_string()) {
                    infos.push(info);
                }
                Ok(())
            })?;
        }
        infos.sort_by(|a, b| a.path().cmp(b.path()));
        for info in infos {
            if only_target_files && !info.is_target_file() {
                continue;
            }
            f(info)?;
        }
        Ok(())
    }

    fn should_be_self_contained(&self) -> bool {
        self.self_contained
    }
}

/// A view restricted to some [`FileType`]s.
#[derive(Clone)]
pub struct FilteredModuleReadBucket {
    delegate: Arc<dyn ModuleReadBucket>,
    file_types: Vec<FileType>,
}

impl FilteredModuleReadBucket {
    /// Restricts `delegate` to `file_types`.
    pub fn new(delegate: Arc<dyn ModuleReadBucket>, file_types: &[FileType]) -> Self {
        Self {
            delegate,
            file_types: file_types.to_vec(),
        }
    }

    /// Restricts `delegate` to schema files.
    pub fn schema_files(delegate: Arc<dyn ModuleReadBucket>) -> Self {
        Self::new(delegate, &[FileType::Schema])
    }
}

impl ModuleReadBucket for FilteredModuleReadBucket {
    fn get_file(&self, ctx: &Context, path: &str) -> Result<ModuleFile, ModuleError> {
        // Stat through the filter first so excluded types read as absent.
        self.stat_file_info(ctx, path)?;
        self.delegate.get_file(ctx, path)
    }

    fn stat_file_info(&self, ctx: &Context, path: &str) -> Result<FileInfo, ModuleError> {
        let info = self.delegate.stat_file_info(ctx, path)?;
        if self.file_types.contains(&info.file_type()) {
            Ok(info)
        } else {
            Err(not_exist(path))
        }
    }

    fn walk_file_infos(
        &self,
        ctx: &Context,
        only_target_files: bool,
        f: &mut dyn FnMut(FileInfo) -> Result<(), ModuleError>,
    ) -> Result<(), ModuleError> {
        self.delegate.walk_file_infos(ctx, only_target_files, &mut |info| {
            if self.file_types.contains(&info.file_type()) {
                f(info)
            } else {
                Ok(())
            }
        })
    }

    fn should_be_self_contained(&self) -> bool {
        self.delegate.should_be_self_contained()
    }
}

/// Exposes a module view through the generic [`ReadBucket`] interface.
#[derive(Clone)]
pub struct StorageReadBucket {
    delegate: Arc<dyn ModuleReadBucket>,
}

impl StorageReadBucket {
    /// Wraps `delegate`.
    pub fn new(delegate: Arc<dyn ModuleReadBucket>) -> Self {
        Self { delegate }
    }
}

fn object_info(info: &FileInfo) -> ObjectInfo {
    ObjectInfo {
        path: info.path().to_string(),
        external_path: info.external_path().to_string(),
    }
}

fn to_storage_error(path: &str, err: ModuleError) -> StorageError {
    match err {
        ModuleError::Storage(err) => err,
        ModuleError::Canceled(canceled) => StorageError::Canceled(canceled),
        other => StorageError::Io {
            path: path.to_string(),
            source: Arc::new(io::Error::other(other.to_string())),
        },
    }
}

impl ReadBucket for StorageReadBucket {
    fn get(&self, ctx: &Context, path: &str) -> Result<ReadObject, StorageError> {
        let file = self
            .delegate
            .get_file(ctx, path)
            .map_err(|err| to_storage_error(path, err))?;
        let info = object_info(file.info());
        Ok(ReadObject::new(info, Box::new(file)))
    }

    fn stat(&self, ctx: &Context, path: &str) -> Result<ObjectInfo, StorageError> {
        self.delegate
            .stat_file_info(ctx, path)
            .map(|info| object_info(&info))
            .map_err(|err| to_storage_error(path, err))
    }

    fn walk(
        &self,
        ctx: &Context,
        prefix: &str,
        f: &mut dyn FnMut(ObjectInfo) -> Result<(), StorageError>,
    ) -> Result<(), StorageError> {
        let mut infos = Vec::new();
        self.delegate
            .walk_file_infos(ctx, false, &mut |info| {
                if strata_common::normalpath::equals_or_contains(prefix, info.path()) {
                    infos.push(object_info(&info));
                }
                Ok(())
            })
            .map_err(|err| to_storage_error(prefix, err))?;
        for info in infos {
            f(info)?;
        }
        Ok(())
    }
}

fn not_exist(path: &str) -> ModuleError {
    ModuleError::Storage(StorageError::NotExist {
        path: path.to_string(),
    })
}

//! The [`Module`] entity.

use std::collections::{BTreeSet, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use strata_cas::{b5_digest, manifest_for_bucket, Digest};
use strata_common::{normalpath, CommitId, Context, Memo, ModuleFullName};
use strata_storage::{read_all, walk_infos, ReadBucket};

use crate::bucket::ModuleReadBucket;
use crate::data::ModuleData;
use crate::error::ModuleError;
use crate::file::{classify_path, FileInfo, FileType, ModuleFile, ObjectData};
use crate::key::ModuleKey;
use crate::module_set::ModuleSetInner;

/// A named, digestible set of schema files plus at most one documentation
/// and one license file.
///
/// A module is either local, backed by a bucket the caller supplied, or
/// remote, backed by [`ModuleData`] fetched for a [`ModuleKey`]. Modules are
/// created by the [`ModuleSetBuilder`](crate::ModuleSetBuilder) and are
/// immutable once the [`ModuleSet`](crate::ModuleSet) is built. Cloning is
/// cheap.
#[derive(Clone)]
pub struct Module {
    inner: Arc<ModuleInner>,
}

pub(crate) enum ModuleSource {
    Local { files: Arc<dyn ReadBucket> },
    Remote { key: ModuleKey, data: ModuleData },
}

pub(crate) struct ModuleInner {
    bucket_id: String,
    full_name: Option<ModuleFullName>,
    commit_id: Option<CommitId>,
    description: Option<String>,
    is_target: AtomicBool,
    source: ModuleSource,
    target_paths: BTreeSet<String>,
    target_exclude_paths: BTreeSet<String>,
    schema_file_target_path: Option<String>,
    include_package_files: bool,
    target_package: Memo<Option<String>, ModuleError>,
    v1_config_object_data: Option<ObjectData>,
    v1_lock_object_data: Option<ObjectData>,
    direct_deps: Memo<Vec<usize>, ModuleError>,
    digest: Memo<Digest, ModuleError>,
    membership: OnceLock<(Weak<ModuleSetInner>, usize)>,
}

/// A dependency of a module.
#[derive(Clone, Debug)]
pub struct ModuleDep {
    module: Module,
    is_direct: bool,
}

impl ModuleDep {
    /// The module depended on.
    pub fn module(&self) -> &Module {
        &self.module
    }

    /// Whether a schema file of the depending module imports a file of this
    /// module directly.
    pub fn is_direct(&self) -> bool {
        self.is_direct
    }
}

/// Everything needed to construct a module.
pub(crate) struct ModuleParts {
    pub bucket_id: String,
    pub full_name: Option<ModuleFullName>,
    pub commit_id: Option<CommitId>,
    pub description: Option<String>,
    pub is_target: bool,
    pub source: ModuleSource,
    pub target_paths: BTreeSet<String>,
    pub target_exclude_paths: BTreeSet<String>,
    pub schema_file_target_path: Option<String>,
    pub include_package_files: bool,
    pub v1_config_object_data: Option<ObjectData>,
    pub v1_lock_object_data: Option<ObjectData>,
}

impl Module {
    pub(crate) fn new(parts: ModuleParts) -> Self {
        Self {
            inner: Arc::new(ModuleInner {
                bucket_id: parts.bucket_id,
                full_name: parts.full_name,
                commit_id: parts.commit_id,
                description: parts.description,
                is_target: AtomicBool::new(parts.is_target),
                source: parts.source,
                target_paths: parts.target_paths,
                target_exclude_paths: parts.target_exclude_paths,
                schema_file_target_path: parts.schema_file_target_path,
                include_package_files: parts.include_package_files,
                target_package: Memo::new(),
                v1_config_object_data: parts.v1_config_object_data,
                v1_lock_object_data: parts.v1_lock_object_data,
                direct_deps: Memo::new(),
                digest: Memo::new(),
                membership: OnceLock::new(),
            }),
        }
    }

    /// The identity used to index the module within a set: the full name if
    /// there is one, else the bucket ID.
    pub fn opaque_id(&self) -> String {
        match &self.inner.full_name {
            Some(name) => name.to_string(),
            None => self.inner.bucket_id.clone(),
        }
    }

    /// The caller-assigned ID of a local module's bucket; empty for remote
    /// modules.
    pub fn bucket_id(&self) -> &str {
        &self.inner.bucket_id
    }

    /// The module's registry name, if it has one.
    pub fn full_name(&self) -> Option<&ModuleFullName> {
        self.inner.full_name.as_ref()
    }

    /// The commit a remote module was fetched at.
    pub fn commit_id(&self) -> Option<&CommitId> {
        self.inner.commit_id.as_ref()
    }

    /// The key a remote module was fetched for.
    pub fn module_key(&self) -> Option<&ModuleKey> {
        match &self.inner.source {
            ModuleSource::Remote { key, .. } => Some(key),
            ModuleSource::Local { .. } => None,
        }
    }

    /// A human-readable description for messages.
    pub fn description(&self) -> String {
        match &self.inner.description {
            Some(description) => description.clone(),
            None => match &self.inner.full_name {
                Some(name) => name.to_string(),
                None => format!("module at {}", self.inner.bucket_id),
            },
        }
    }

    /// The raw `strata.toml` a v1 module directory was configured by.
    pub fn v1_config_object_data(&self) -> Option<&ObjectData> {
        self.inner.v1_config_object_data.as_ref()
    }

    /// The raw `strata.lock` of a v1 module directory.
    pub fn v1_lock_object_data(&self) -> Option<&ObjectData> {
        self.inner.v1_lock_object_data.as_ref()
    }

    /// Whether the module came from a local bucket.
    pub fn is_local(&self) -> bool {
        matches!(self.inner.source, ModuleSource::Local { .. })
    }

    /// Whether the module was selected as a target.
    pub fn is_target(&self) -> bool {
        self.inner.is_target.load(Ordering::Acquire)
    }

    pub(crate) fn set_is_target(&self, is_target: bool) {
        self.inner.is_target.store(is_target, Ordering::Release);
    }

    pub(crate) fn has_target_filters(&self) -> bool {
        !self.inner.target_paths.is_empty()
            || !self.inner.target_exclude_paths.is_empty()
            || self.inner.schema_file_target_path.is_some()
    }

    pub(crate) fn join_set(&self, set: Weak<ModuleSetInner>, index: usize) {
        // A module belongs to exactly one set; later calls are ignored.
        let _ = self.inner.membership.set((set, index));
    }

    pub(crate) fn same(&self, other: &Module) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn membership(&self) -> Result<(Arc<ModuleSetInner>, usize), ModuleError> {
        let (set, index) = self
            .inner
            .membership
            .get()
            .ok_or_else(|| ModuleError::system(format!("{} is not part of a module set", self.description())))?;
        let set = set
            .upgrade()
            .ok_or_else(|| ModuleError::system(format!("the module set of {} was dropped", self.description())))?;
        Ok((set, *index))
    }

    /// The module's files, fetching and verifying remote data if needed.
    pub(crate) fn files(&self, ctx: &Context) -> Result<Arc<dyn ReadBucket>, ModuleError> {
        match &self.inner.source {
            ModuleSource::Local { files } => Ok(Arc::clone(files)),
            ModuleSource::Remote { data, .. } => data.bucket(ctx),
        }
    }

    /// The module's B5 digest: its files plus the digests of all of its
    /// dependencies.
    ///
    /// For remote modules this is the digest of the key the module was
    /// fetched by, which the fetched data has been verified against.
    pub fn digest(&self, ctx: &Context) -> Result<Digest, ModuleError> {
        self.inner.digest.get_or_try_init(|| match &self.inner.source {
            ModuleSource::Remote { key, data } => {
                data.bucket(ctx)?;
                key.digest(ctx)
            }
            ModuleSource::Local { files } => {
                let manifest = manifest_for_bucket(ctx, files.as_ref())?;
                let dep_digests = self
                    .module_deps(ctx)?
                    .iter()
                    .map(|dep| dep.module.digest(ctx))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(b5_digest(&manifest, &dep_digests)?)
            }
        })
    }

    /// All modules this module depends on, directly or transitively, sorted
    /// by opaque ID.
    ///
    /// Dependencies are discovered from the import statements of the
    /// module's schema files, resolved against the other modules of its set.
    pub fn module_deps(&self, ctx: &Context) -> Result<Vec<ModuleDep>, ModuleError> {
        let (set, self_index) = self.membership()?;
        let direct: BTreeSet<usize> = self.direct_dep_indexes(ctx)?.into_iter().collect();
        let mut seen: BTreeSet<usize> = direct.clone();
        let mut queue: VecDeque<usize> = direct.iter().copied().collect();
        while let Some(index) = queue.pop_front() {
            for next in set.modules[index].direct_dep_indexes(ctx)? {
                if next != self_index && seen.insert(next) {
                    queue.push_back(next);
                }
            }
        }
        let mut deps: Vec<ModuleDep> = seen
            .into_iter()
            .map(|index| ModuleDep {
                module: set.modules[index].clone(),
                is_direct: direct.contains(&index),
            })
            .collect();
        deps.sort_by_key(|dep| dep.module.opaque_id());
        Ok(deps)
    }

    pub(crate) fn direct_dep_indexes(&self, ctx: &Context) -> Result<Vec<usize>, ModuleError> {
        self.inner.direct_deps.get_or_try_init(|| {
            let (set, self_index) = self.membership()?;
            let files = self.files(ctx)?;
            let file_index = set.file_index(ctx)?;
            let mut deps = BTreeSet::new();
            for info in walk_infos(files.as_ref(), ctx, ".")? {
                if classify_path(&info.path) != Some(FileType::Schema) {
                    continue;
                }
                ctx.check()?;
                let content = read_all(files.as_ref(), ctx, &info.path)?;
                for import in strata_parser::scan_imports(&String::from_utf8_lossy(&content)) {
                    let Some(owners) = file_index.get(&import) else {
                        continue;
                    };
                    if owners.contains(&self_index) {
                        continue;
                    }
                    if let Some(owner) = owners.first() {
                        deps.insert(*owner);
                    }
                }
            }
            Ok(deps.into_iter().collect())
        })
    }

    /// Whether `path` is a target file of this module.
    ///
    /// With a schema file target, only that file is a target, plus every
    /// schema file declaring the same package when package files are
    /// included. Exclude paths apply in either case.
    pub fn is_target_path(&self, ctx: &Context, path: &str) -> Result<bool, ModuleError> {
        if !self.is_target() {
            return Ok(false);
        }
        let inner = &self.inner;
        if !inner.target_exclude_paths.is_empty()
            && normalpath::set_has_equal_or_containing_path(&inner.target_exclude_paths, path)
        {
            return Ok(false);
        }
        if let Some(target) = &inner.schema_file_target_path {
            if path == target {
                return Ok(true);
            }
            if !inner.include_package_files || classify_path(path) != Some(FileType::Schema) {
                return Ok(false);
            }
            let target_package = match self.target_package(ctx, target) {
                Ok(package) => package,
                Err(err) if err.is_not_exist() => return Ok(false),
                Err(err) => return Err(err),
            };
            return Ok(self.package_of(ctx, path)? == target_package);
        }
        Ok(inner.target_paths.is_empty()
            || normalpath::set_has_equal_or_containing_path(&inner.target_paths, path))
    }

    fn target_package(&self, ctx: &Context, target: &str) -> Result<Option<String>, ModuleError> {
        self.inner
            .target_package
            .get_or_try_init(|| self.package_of(ctx, target))
    }

    fn package_of(&self, ctx: &Context, path: &str) -> Result<Option<String>, ModuleError> {
        let files = self.files(ctx)?;
        let content = read_all(files.as_ref(), ctx, path)?;
        Ok(strata_parser::scan_package(&String::from_utf8_lossy(&content)))
    }

    fn file_info(&self, ctx: &Context, path: String, external_path: String) -> Result<FileInfo, ModuleError> {
        let file_type = classify_path(&path).ok_or_else(|| {
            ModuleError::system(format!("{path} in {} is not a module file", self.description()))
        })?;
        let is_target = self.is_target_path(ctx, &path)?;
        Ok(FileInfo::new(path, external_path, file_type, is_target, self.clone()))
    }
}

impl ModuleReadBucket for Module {
    fn get_file(&self, ctx: &Context, path: &str) -> Result<ModuleFile, ModuleError> {
        let object = self.files(ctx)?.get(ctx, path)?;
        let info = self.file_info(ctx, object.info().path.clone(), object.info().external_path.clone())?;
        Ok(ModuleFile::new(info, object))
    }

    fn stat_file_info(&self, ctx: &Context, path: &str) -> Result<FileInfo, ModuleError> {
        let object = self.files(ctx)?.stat(ctx, path)?;
        self.file_info(ctx, object.path, object.external_path)
    }

    fn walk_file_infos(
        &self,
        ctx: &Context,
        only_target_files: bool,
        f: &mut dyn FnMut(FileInfo) -> Result<(), ModuleError>,
    ) -> Result<(), ModuleError> {
        let files = self.files(ctx)?;
        for object in walk_infos(files.as_ref(), ctx, ".")? {
            let info = self.file_info(ctx, object.path, object.external_path)?;
            if only_target_files && !info.is_target_file() {
                continue;
            }
            f(info)?;
        }
        Ok(())
    }

    fn should_be_self_contained(&self) -> bool {
        false
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("opaque_id", &self.opaque_id())
            .field("is_local", &self.is_local())
            .field("is_target", &self.is_target())
            .finish()
    }
}

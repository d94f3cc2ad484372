//! Assembles [`Workspace`]s from buckets and module keys.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use strata_common::{normalpath, Context, ModuleFullName, ModuleRef};
use strata_config::{
    get_lock_file_for_prefix, get_module_config_file_for_prefix,
    load_module_config_file_for_override, BreakingConfig, ConfigOverride, FileVersion, LintConfig,
    LockDep, ModuleConfig, ModuleConfigFile, PluginConfig, CONFIG_FILE_NAME, LOCK_FILE_NAME,
};
use strata_module::{
    lazy_module_key, CommitProvider, LocalModuleOptions, Module, ModuleDataProvider, ModuleError,
    ModuleKey, ModuleSetBuilder, ObjectData,
};
use strata_storage::{read_all, ReadBucket};
use tracing::{debug, info};

use crate::bucket::{module_dir_bucket, sub_bucket};
use crate::discovery::{discover_workspace, optional, WorkspaceLayout};
use crate::error::WorkspaceError;
use crate::targeting::{ModuleTargeting, TargetingRequest};
use crate::workspace::Workspace;

/// Options for [`WorkspaceProvider::get_workspace_for_bucket`].
///
/// Paths are relative to the bucket root.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkspaceBucketOptions {
    /// The directory the request was made from.
    pub target_sub_dir_path: String,
    /// Paths to target. Empty means everything under the sub-directory.
    pub target_paths: Vec<String>,
    /// Paths whose files are never targets.
    pub target_exclude_paths: Vec<String>,
    /// A single schema file to target. Discovery starts from its directory,
    /// and `target_sub_dir_path` is ignored.
    pub schema_file_target_path: Option<String>,
    /// Also target every schema file sharing the package of
    /// `schema_file_target_path`.
    pub include_package_files: bool,
    /// Replaces the lint and breaking configuration found in files.
    pub config_override: Option<ConfigOverride>,
}

impl Default for WorkspaceBucketOptions {
    fn default() -> Self {
        Self {
            target_sub_dir_path: ".".to_string(),
            target_paths: Vec::new(),
            target_exclude_paths: Vec::new(),
            schema_file_target_path: None,
            include_package_files: false,
            config_override: None,
        }
    }
}

/// Options for [`WorkspaceProvider::get_workspace_for_module_key`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WorkspaceModuleKeyOptions {
    /// Supplies the lint and breaking configuration of the target module.
    pub config_override: Option<ConfigOverride>,
    /// Module paths limiting the target files. Empty means all files.
    pub target_paths: Vec<String>,
    /// Module paths whose files are never targets.
    pub target_exclude_paths: Vec<String>,
}

/// Resolves workspaces, fetching remote modules through its providers.
#[derive(Clone)]
pub struct WorkspaceProvider {
    data_provider: Arc<dyn ModuleDataProvider>,
    commit_provider: Arc<dyn CommitProvider>,
}

/// One module directory and everything its config files say about it.
struct ModuleDir {
    config: ModuleConfig,
    file_version: FileVersion,
    v1_config_object_data: Option<ObjectData>,
    v1_lock_object_data: Option<ObjectData>,
}

/// What the config files of a workspace declare.
struct WorkspacePlan {
    is_v2: bool,
    dirs: Vec<ModuleDir>,
    dep_refs: Vec<ModuleRef>,
    lock_deps: Vec<LockDep>,
    plugin_configs: Vec<PluginConfig>,
}

impl WorkspaceProvider {
    /// Creates a provider. `commit_provider` resolves the digests of lock
    /// file entries that do not record one.
    pub fn new(
        data_provider: Arc<dyn ModuleDataProvider>,
        commit_provider: Arc<dyn CommitProvider>,
    ) -> Self {
        Self {
            data_provider,
            commit_provider,
        }
    }

    /// Resolves the workspace containing `options.target_sub_dir_path`.
    ///
    /// Local modules come from the discovered config files, remote modules
    /// from lock files. Fails with a system error if the request reaches no
    /// module directory, and with [`ModuleError::NoTargetFiles`] if it
    /// reaches some but none of them has target files.
    pub fn get_workspace_for_bucket(
        &self,
        ctx: &Context,
        bucket: Arc<dyn ReadBucket>,
        options: &WorkspaceBucketOptions,
    ) -> Result<Workspace, WorkspaceError> {
        ctx.check()?;
        let schema_file = options
            .schema_file_target_path
            .as_deref()
            .map(normalize)
            .transpose()?;
        let sub_dir = match &schema_file {
            Some(file) => normalpath::dir(file).to_string(),
            None => normalize(&options.target_sub_dir_path)?,
        };
        let config_override = options
            .config_override
            .as_ref()
            .map(load_module_config_file_for_override)
            .transpose()?;

        let found = discover_workspace(ctx, bucket.as_ref(), &sub_dir)?;
        let root = found.root;
        let plan = match found.layout {
            WorkspaceLayout::V2(config) => plan_v2(ctx, bucket.as_ref(), &root, config)?,
            WorkspaceLayout::Work(work) => plan_v1(ctx, bucket.as_ref(), &root, &work.dir_paths)?,
            WorkspaceLayout::Single => plan_v1(ctx, bucket.as_ref(), &root, &[".".to_string()])?,
        };

        let request = TargetingRequest {
            target_sub_dir_path: rel_to_root(&root, &sub_dir)?.unwrap_or_else(|| ".".to_string()),
            target_paths: rel_all_to_root(&root, &options.target_paths)?,
            target_exclude_paths: rel_all_to_root(&root, &options.target_exclude_paths)?,
            schema_file_target_path: match &schema_file {
                Some(file) => Some(rel_to_root(&root, file)?.ok_or_else(|| {
                    WorkspaceError::system(format!(
                        "schema file target {file} is outside the workspace at {root}"
                    ))
                })?),
                None => None,
            },
            include_package_files: options.include_package_files,
        };
        let dir_paths: Vec<String> = plan.dirs.iter().map(|dir| dir.config.dir_path.clone()).collect();
        let mut targetings = Vec::with_capacity(plan.dirs.len());
        for dir in &plan.dirs {
            let roots: Vec<String> = dir.config.root_to_excludes.keys().cloned().collect();
            targetings.push(ModuleTargeting::new(&dir.config.dir_path, &roots, &dir_paths, &request)?);
        }
        if !targetings.iter().any(|targeting| targeting.is_tentative_target) {
            return Err(WorkspaceError::system(format!(
                "subdirectory \"{}\" did not result in any target modules from module directories {:?}",
                sub_dir, dir_paths
            )));
        }

        let workspace_bucket = sub_bucket(bucket, &root);
        let mut builder = ModuleSetBuilder::new(ctx, Arc::clone(&self.data_provider));
        for (dir, targeting) in plan.dirs.iter().zip(targetings) {
            debug!(
                "module directory {} target={} paths={:?} excludes={:?} file={:?}",
                dir.config.dir_path,
                targeting.is_target_module,
                targeting.target_paths,
                targeting.target_exclude_paths,
                targeting.schema_file_target_path
            );
            let nested_dir_paths: Vec<String> = dir_paths
                .iter()
                .filter(|other| normalpath::contains(&dir.config.dir_path, other))
                .cloned()
                .collect();
            let module_bucket = module_dir_bucket(
                &workspace_bucket,
                &dir.config.dir_path,
                &dir.config.root_to_excludes,
                &nested_dir_paths,
            );
            builder.add_local_module(
                module_bucket,
                dir.config.dir_path.clone(),
                targeting.is_target_module,
                LocalModuleOptions {
                    full_name: dir.config.full_name.clone(),
                    target_paths: targeting.target_paths,
                    target_exclude_paths: targeting.target_exclude_paths,
                    schema_file_target_path: targeting.schema_file_target_path,
                    include_package_files: targeting.include_package_files,
                    v1_config_object_data: dir.v1_config_object_data.clone(),
                    v1_lock_object_data: dir.v1_lock_object_data.clone(),
                    ..LocalModuleOptions::default()
                },
            );
        }
        for dep in &plan.lock_deps {
            builder.add_remote_module(self.lock_dep_key(dep), false);
        }
        let module_set = builder.build()?;
        if module_set.target_modules().is_empty() {
            return Err(ModuleError::NoTargetFiles.into());
        }

        let default_version = if plan.is_v2 { FileVersion::V2 } else { FileVersion::V1 };
        let dirs: HashMap<&str, &ModuleDir> = plan
            .dirs
            .iter()
            .map(|dir| (dir.config.dir_path.as_str(), dir))
            .collect();
        let mut configs = CheckConfigs::default();
        for module in module_set.modules() {
            let dir = if module.is_local() {
                dirs.get(module.bucket_id()).copied()
            } else {
                None
            };
            let version = dir.map_or(default_version, |dir| dir.file_version);
            match (dir, &config_override) {
                (Some(_), Some(config_override)) if module.is_target() => {
                    let matched =
                        match_override(config_override, module.full_name(), Some(module.bucket_id()));
                    configs.insert(module, matched, config_override.file_version);
                }
                (Some(dir), None) => configs.insert(module, Some(&dir.config), version),
                _ => configs.insert(module, None, version),
            }
        }

        info!(
            "resolved workspace at {} with {} modules ({} targets)",
            root,
            module_set.modules().len(),
            module_set.target_modules().len()
        );
        Ok(Workspace::new(
            module_set,
            configs.lint,
            configs.breaking,
            plan.dep_refs,
            plan.plugin_configs,
            plan.is_v2,
        ))
    }

    /// Resolves a workspace whose only target is the remote module `key`,
    /// along with its dependencies.
    ///
    /// Target paths in `options` are module paths and narrow the target
    /// files; if none remain the call fails with
    /// [`ModuleError::NoTargetFiles`].
    ///
    /// An override's module configs are matched to the module by name; a
    /// single unnamed module config applies to it regardless. Dependencies
    /// always get the default configuration.
    pub fn get_workspace_for_module_key(
        &self,
        ctx: &Context,
        key: ModuleKey,
        options: &WorkspaceModuleKeyOptions,
    ) -> Result<Workspace, WorkspaceError> {
        ctx.check()?;
        let config_override = options
            .config_override
            .as_ref()
            .map(load_module_config_file_for_override)
            .transpose()?;
        let target_name = key.full_name().clone();
        let mut builder = ModuleSetBuilder::new(ctx, Arc::clone(&self.data_provider));
        builder.add_remote_module_with_target_paths(
            key,
            true,
            normalize_all(&options.target_paths)?,
            normalize_all(&options.target_exclude_paths)?,
        );
        let module_set = builder.build()?;

        let version = config_override
            .as_ref()
            .map_or(FileVersion::V1, |config| config.file_version);
        let mut configs = CheckConfigs::default();
        for module in module_set.modules() {
            let is_target = module.full_name() == Some(&target_name);
            let matched = match &config_override {
                Some(config_override) if is_target => {
                    match_override(config_override, Some(&target_name), None)
                }
                _ => None,
            };
            configs.insert(module, matched, version);
        }
        info!(
            "resolved workspace for {} with {} modules",
            target_name,
            module_set.modules().len()
        );
        Ok(Workspace::new(
            module_set,
            configs.lint,
            configs.breaking,
            Vec::new(),
            Vec::new(),
            version == FileVersion::V2,
        ))
    }

    fn lock_dep_key(&self, dep: &LockDep) -> ModuleKey {
        match dep.digest {
            Some(digest) => ModuleKey::new(dep.full_name.clone(), dep.commit_id.clone(), digest),
            None => lazy_module_key(
                Arc::clone(&self.commit_provider),
                dep.full_name.clone(),
                dep.commit_id.clone(),
            ),
        }
    }
}

/// Lint and breaking configs keyed by module opaque ID.
#[derive(Default)]
struct CheckConfigs {
    lint: HashMap<String, LintConfig>,
    breaking: HashMap<String, BreakingConfig>,
}

impl CheckConfigs {
    /// Records `config`'s settings for `module`, or the defaults of
    /// `version` when there is no config.
    fn insert(&mut self, module: &Module, config: Option<&ModuleConfig>, version: FileVersion) {
        let (lint, breaking) = match config {
            Some(config) => (config.lint.clone(), config.breaking.clone()),
            None => (
                LintConfig::default_for(version),
                BreakingConfig::default_for(version),
            ),
        };
        let id = module.opaque_id();
        self.lint.insert(id.clone(), lint);
        self.breaking.insert(id, breaking);
    }
}

/// Picks the override module config for a target module: by name, then by
/// directory, then the only config if it is unnamed.
fn match_override<'a>(
    config: &'a ModuleConfigFile,
    full_name: Option<&ModuleFullName>,
    dir_path: Option<&str>,
) -> Option<&'a ModuleConfig> {
    if let Some(full_name) = full_name {
        let by_name = config
            .module_configs
            .iter()
            .find(|candidate| candidate.full_name.as_ref() == Some(full_name));
        if by_name.is_some() {
            return by_name;
        }
    }
    if let (Some(dir_path), true) = (dir_path, config.module_configs.len() > 1) {
        let by_dir = config
            .module_configs
            .iter()
            .find(|candidate| candidate.full_name.is_none() && candidate.dir_path == dir_path);
        if by_dir.is_some() {
            return by_dir;
        }
    }
    match config.module_configs.as_slice() {
        [only] if only.full_name.is_none() => Some(only),
        _ => None,
    }
}

fn plan_v2(
    ctx: &Context,
    bucket: &dyn ReadBucket,
    root: &str,
    config: ModuleConfigFile,
) -> Result<WorkspacePlan, WorkspaceError> {
    let lock_deps = match optional(get_lock_file_for_prefix(ctx, bucket, root))? {
        Some(lock) if lock.file_version != FileVersion::V2 => {
            return Err(WorkspaceError::LockVersionMismatch {
                lock_version: lock.file_version,
                config_version: FileVersion::V2,
            })
        }
        Some(lock) => lock.deps,
        None => Vec::new(),
    };
    Ok(WorkspacePlan {
        is_v2: true,
        dep_refs: unique_dep_refs(config.configured_dep_module_refs)?,
        dirs: config
            .module_configs
            .into_iter()
            .map(|config| ModuleDir {
                config,
                file_version: FileVersion::V2,
                v1_config_object_data: None,
                v1_lock_object_data: None,
            })
            .collect(),
        lock_deps,
        plugin_configs: config.plugin_configs,
    })
}

/// Plans v1 module directories, each with its own optional config and lock
/// file.
fn plan_v1(
    ctx: &Context,
    bucket: &dyn ReadBucket,
    root: &str,
    dir_paths: &[String],
) -> Result<WorkspacePlan, WorkspaceError> {
    let mut dirs = Vec::with_capacity(dir_paths.len());
    let mut dep_refs = Vec::new();
    let mut lock_deps = Vec::new();
    for dir_path in dir_paths {
        ctx.check()?;
        let prefix = normalpath::join(root, dir_path);
        let (mut config, file_version) =
            match optional(get_module_config_file_for_prefix(ctx, bucket, &prefix))? {
                Some(file) if file.file_version == FileVersion::V2 => {
                    return Err(WorkspaceError::V2ConfigInWorkFile {
                        dir: dir_path.clone(),
                    })
                }
                Some(file) => {
                    let version = file.file_version;
                    dep_refs.extend(file.configured_dep_module_refs);
                    let config = file.module_configs.into_iter().next().ok_or_else(|| {
                        WorkspaceError::system(format!("config in {prefix} has no module config"))
                    })?;
                    (config, version)
                }
                None => (ModuleConfig::default_v1(), FileVersion::V1),
            };
        config.dir_path = dir_path.clone();
        let v1_config_object_data = object_data(ctx, bucket, &prefix, CONFIG_FILE_NAME)?;
        let v1_lock_object_data = object_data(ctx, bucket, &prefix, LOCK_FILE_NAME)?;
        if let Some(lock) = optional(get_lock_file_for_prefix(ctx, bucket, &prefix))? {
            if lock.file_version == FileVersion::V2 {
                return Err(WorkspaceError::LockVersionMismatch {
                    lock_version: lock.file_version,
                    config_version: file_version,
                });
            }
            lock_deps.extend(lock.deps);
        }
        dirs.push(ModuleDir {
            config,
            file_version,
            v1_config_object_data,
            v1_lock_object_data,
        });
    }
    Ok(WorkspacePlan {
        is_v2: false,
        dirs,
        dep_refs: unique_dep_refs(dep_refs)?,
        lock_deps,
        plugin_configs: Vec::new(),
    })
}

/// Reads the raw bytes of `name` in the directory `prefix`, if present.
fn object_data(
    ctx: &Context,
    bucket: &dyn ReadBucket,
    prefix: &str,
    name: &str,
) -> Result<Option<ObjectData>, WorkspaceError> {
    match read_all(bucket, ctx, &normalpath::join(prefix, name)) {
        Ok(data) => Ok(Some(ObjectData::new(name, data))),
        Err(err) if err.is_not_exist() => Ok(None),
        Err(err) => Err(err.into()),
    }
}

/// Collapses refs to one per module name; differing refs for one name are
/// an error.
fn unique_dep_refs(refs: Vec<ModuleRef>) -> Result<Vec<ModuleRef>, WorkspaceError> {
    let mut by_name: BTreeMap<ModuleFullName, BTreeSet<ModuleRef>> = BTreeMap::new();
    for module_ref in refs {
        by_name
            .entry(module_ref.full_name().clone())
            .or_default()
            .insert(module_ref);
    }
    let mut unique = Vec::with_capacity(by_name.len());
    for refs in by_name.into_values() {
        if refs.len() > 1 {
            let refs: Vec<String> = refs.iter().map(ToString::to_string).collect();
            return Err(WorkspaceError::ConflictingDepRefs {
                refs: refs.join(", "),
            });
        }
        unique.extend(refs);
    }
    Ok(unique)
}

fn normalize(path: &str) -> Result<String, WorkspaceError> {
    normalpath::normalize(path).map_err(|err| WorkspaceError::path(path, err))
}

/// Rewrites `path` relative to the workspace root; `None` if it lies
/// outside.
fn rel_to_root(root: &str, path: &str) -> Result<Option<String>, WorkspaceError> {
    let path = normalize(path)?;
    if normalpath::equals_or_contains(root, &path) {
        return normalpath::rel(root, &path)
            .map(Some)
            .map_err(|err| WorkspaceError::path(&path, err));
    }
    debug!("{} is outside the workspace at {}", path, root);
    Ok(None)
}

fn normalize_all(paths: &[String]) -> Result<Vec<String>, WorkspaceError> {
    paths.iter().map(|path| normalize(path)).collect()
}

fn rel_all_to_root(root: &str, paths: &[String]) -> Result<Vec<String>, WorkspaceError> {
    let mut relative = Vec::with_capacity(paths.len());
    for path in paths {
        if let Some(path) = rel_to_root(root, path)? {
            relative.push(path);
        }
    }
    Ok(relative)
}

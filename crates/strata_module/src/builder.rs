//! Accumulates local and remote module declarations into a [`ModuleSet`].

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use strata_cas::digest_equal;
use strata_common::{CommitId, Context, ModuleFullName};
use strata_storage::ReadBucket;
use tracing::{debug, info};

use crate::bucket::ModuleReadBucket;
use crate::data::ModuleData;
use crate::error::ModuleError;
use crate::file::{classify_path, module_files_bucket, FileType, ObjectData};
use crate::key::ModuleKey;
use crate::module::{Module, ModuleParts, ModuleSource};
use crate::module_set::ModuleSet;
use crate::provider::ModuleDataProvider;

/// Optional attributes of a local module.
#[derive(Clone, Debug, Default)]
pub struct LocalModuleOptions {
    /// The module's registry name.
    pub full_name: Option<ModuleFullName>,
    /// The commit the local content corresponds to, if known.
    pub commit_id: Option<CommitId>,
    /// A description for messages, such as the module's directory.
    pub description: Option<String>,
    /// Module-relative paths that limit which files are targets.
    pub target_paths: Vec<String>,
    /// Module-relative paths whose files are never targets.
    pub target_exclude_paths: Vec<String>,
    /// A single schema file to target. Cannot be combined with
    /// `target_paths`.
    pub schema_file_target_path: Option<String>,
    /// Also target every schema file declaring the same package as
    /// `schema_file_target_path`.
    pub include_package_files: bool,
    /// The raw `strata.toml` of a v1 module directory.
    pub v1_config_object_data: Option<ObjectData>,
    /// The raw `strata.lock` of a v1 module directory.
    pub v1_lock_object_data: Option<ObjectData>,
}

struct LocalSpec {
    bucket: Arc<dyn ReadBucket>,
    bucket_id: String,
    is_target: bool,
    options: LocalModuleOptions,
}

struct RemoteSpec {
    key: ModuleKey,
    is_target: bool,
    target_paths: BTreeSet<String>,
    target_exclude_paths: BTreeSet<String>,
}

/// A single-threaded accumulator of module declarations.
///
/// Call [`add_local_module`](Self::add_local_module) and
/// [`add_remote_module`](Self::add_remote_module) any number of times, then
/// [`build`](Self::build) once.
pub struct ModuleSetBuilder {
    ctx: Context,
    provider: Arc<dyn ModuleDataProvider>,
    locals: Vec<LocalSpec>,
    remotes: Vec<RemoteSpec>,
}

impl ModuleSetBuilder {
    /// Creates a builder that fetches remote modules from `provider`.
    pub fn new(ctx: &Context, provider: Arc<dyn ModuleDataProvider>) -> Self {
        Self {
            ctx: ctx.clone(),
            provider,
            locals: Vec::new(),
            remotes: Vec::new(),
        }
    }

    /// Declares a module whose files are in `bucket`.
    ///
    /// `bucket_id` identifies the bucket, typically the module directory.
    pub fn add_local_module(
        &mut self,
        bucket: Arc<dyn ReadBucket>,
        bucket_id: impl Into<String>,
        is_target: bool,
        options: LocalModuleOptions,
    ) -> &mut Self {
        self.locals.push(LocalSpec {
            bucket,
            bucket_id: bucket_id.into(),
            is_target,
            options,
        });
        self
    }

    /// Declares a module fetched by `key`.
    ///
    /// Dependencies of remote modules are discovered and fetched during
    /// [`build`](Self::build).
    pub fn add_remote_module(&mut self, key: ModuleKey, is_target: bool) -> &mut Self {
        self.add_remote_module_with_target_paths(key, is_target, Vec::new(), Vec::new())
    }

    /// Declares a module fetched by `key` whose target files are limited to
    /// `target_paths` minus `target_exclude_paths`, both module-relative.
    pub fn add_remote_module_with_target_paths(
        &mut self,
        key: ModuleKey,
        is_target: bool,
        target_paths: Vec<String>,
        target_exclude_paths: Vec<String>,
    ) -> &mut Self {
        self.remotes.push(RemoteSpec {
            key,
            is_target,
            target_paths: target_paths.into_iter().collect(),
            target_exclude_paths: target_exclude_paths.into_iter().collect(),
        });
        self
    }

    /// Resolves all declarations into a [`ModuleSet`].
    ///
    /// Remote keys are deduplicated by name; the same name with two
    /// different digests is an error. A local module shadows any remote
    /// module with the same name. Fails with [`ModuleError::NoTargetFiles`]
    /// if targets were declared but none of them has any target files.
    pub fn build(self) -> Result<ModuleSet, ModuleError> {
        let ctx = self.ctx;
        ctx.check()?;

        let mut local_names = HashSet::new();
        let mut bucket_ids = HashSet::new();
        for local in &self.locals {
            if !bucket_ids.insert(local.bucket_id.clone()) {
                return Err(ModuleError::DuplicateLocalModule {
                    what: "bucket ID",
                    value: local.bucket_id.clone(),
                });
            }
            if let Some(name) = &local.options.full_name {
                if !local_names.insert(name.clone()) {
                    return Err(ModuleError::DuplicateLocalModule {
                        what: "name",
                        value: name.to_string(),
                    });
                }
            }
            validate_file_target(&local.bucket_id, &local.options)?;
        }

        let mut remotes = RemoteIndex::default();
        for remote in self.remotes {
            if local_names.contains(remote.key.full_name()) {
                debug!("local module overrides remote module {}", remote.key);
                continue;
            }
            remotes.add(&ctx, remote)?;
        }

        let mut datas: HashMap<ModuleFullName, ModuleData> = HashMap::new();
        let mut pending = remotes.order.clone();
        while !pending.is_empty() {
            ctx.check()?;
            let keys: Vec<ModuleKey> = pending
                .iter()
                .map(|name| remotes.key(name))
                .collect::<Result<_, _>>()?;
            info!("fetching {} remote modules", keys.len());
            let fetched = self
                .provider
                .get_module_datas_for_module_keys(&ctx, &keys)?;
            if fetched.len() != keys.len() {
                return Err(ModuleError::system(format!(
                    "expected {} module datas, got {}",
                    keys.len(),
                    fetched.len()
                )));
            }
            let mut next = Vec::new();
            for data in fetched {
                for dep in data.declared_dep_module_keys(&ctx)? {
                    if local_names.contains(dep.full_name()) {
                        continue;
                    }
                    let name = dep.full_name().clone();
                    if remotes.add(&ctx, RemoteSpec::dependency(dep))? {
                        next.push(name);
                    }
                }
                datas.insert(data.module_key().full_name().clone(), data);
            }
            pending = next;
        }

        let mut modules = Vec::with_capacity(self.locals.len() + remotes.order.len());
        let mut any_target = false;
        for local in self.locals {
            any_target |= local.is_target;
            let files = module_files_bucket(&ctx, local.bucket)?;
            let module = Module::new(ModuleParts {
                bucket_id: local.bucket_id,
                full_name: local.options.full_name,
                commit_id: local.options.commit_id,
                description: local.options.description,
                is_target: local.is_target,
                source: ModuleSource::Local { files },
                target_paths: local.options.target_paths.into_iter().collect::<BTreeSet<_>>(),
                target_exclude_paths: local
                    .options
                    .target_exclude_paths
                    .into_iter()
                    .collect::<BTreeSet<_>>(),
                schema_file_target_path: local.options.schema_file_target_path,
                include_package_files: local.options.include_package_files,
                v1_config_object_data: local.options.v1_config_object_data,
                v1_lock_object_data: local.options.v1_lock_object_data,
            });
            untarget_if_empty(&ctx, &module)?;
            modules.push(module);
        }
        let remote_order = std::mem::take(&mut remotes.order);
        for name in &remote_order {
            let remote = remotes.take(name)?;
            any_target |= remote.is_target;
            let data = datas.remove(name).ok_or_else(|| {
                ModuleError::system(format!("no module data fetched for {}", remote.key))
            })?;
            let module = Module::new(ModuleParts {
                bucket_id: String::new(),
                full_name: Some(name.clone()),
                commit_id: Some(remote.key.commit_id().clone()),
                description: None,
                is_target: remote.is_target,
                source: ModuleSource::Remote {
                    key: remote.key,
                    data,
                },
                target_paths: remote.target_paths,
                target_exclude_paths: remote.target_exclude_paths,
                schema_file_target_path: None,
                include_package_files: false,
                v1_config_object_data: None,
                v1_lock_object_data: None,
            });
            untarget_if_empty(&ctx, &module)?;
            modules.push(module);
        }

        if any_target && !modules.iter().any(Module::is_target) {
            return Err(ModuleError::NoTargetFiles);
        }
        info!(
            "built module set with {} modules ({} remote)",
            modules.len(),
            remote_order.len()
        );
        ModuleSet::new(modules)
    }
}

/// A target narrowed by filters down to no schema files is not a target.
fn untarget_if_empty(ctx: &Context, module: &Module) -> Result<(), ModuleError> {
    if module.is_target() && module.has_target_filters() && !has_target_schema_files(ctx, module)? {
        debug!("{} has no target files and is not a target", module.description());
        module.set_is_target(false);
    }
    Ok(())
}

fn validate_file_target(bucket_id: &str, options: &LocalModuleOptions) -> Result<(), ModuleError> {
    let Some(path) = &options.schema_file_target_path else {
        return Ok(());
    };
    if !options.target_paths.is_empty() {
        return Err(ModuleError::system(format!(
            "module {bucket_id} cannot have both a schema file target and target paths"
        )));
    }
    if classify_path(path) != Some(FileType::Schema) {
        return Err(ModuleError::system(format!(
            "schema file target {path} of module {bucket_id} is not a schema file"
        )));
    }
    Ok(())
}

fn has_target_schema_files(ctx: &Context, module: &Module) -> Result<bool, ModuleError> {
    let mut found = false;
    module.walk_file_infos(ctx, true, &mut |info| {
        found |= info.file_type() == FileType::Schema;
        Ok(())
    })?;
    Ok(found)
}

impl RemoteSpec {
    /// A module pulled in as a dependency rather than declared.
    fn dependency(key: ModuleKey) -> Self {
        Self {
            key,
            is_target: false,
            target_paths: BTreeSet::new(),
            target_exclude_paths: BTreeSet::new(),
        }
    }
}

/// Remote declarations deduplicated by name, in first-seen order.
#[derive(Default)]
struct RemoteIndex {
    order: Vec<ModuleFullName>,
    entries: HashMap<ModuleFullName, RemoteSpec>,
}

impl RemoteIndex {
    /// Adds `spec`, returning `true` if its name was not yet known.
    ///
    /// A repeated name merges into the first entry: the target flags are
    /// or-ed and the target path sets are unioned.
    fn add(&mut self, ctx: &Context, spec: RemoteSpec) -> Result<bool, ModuleError> {
        let name = spec.key.full_name().clone();
        match self.entries.get_mut(&name) {
            Some(existing) => {
                if existing.key.commit_id() != spec.key.commit_id() {
                    let first = existing.key.digest(ctx)?;
                    let second = spec.key.digest(ctx)?;
                    if !digest_equal(&first, &second) {
                        return Err(ModuleError::ConflictingDigests {
                            full_name: name,
                            first,
                            second,
                        });
                    }
                }
                existing.is_target |= spec.is_target;
                existing.target_paths.extend(spec.target_paths);
                existing.target_exclude_paths.extend(spec.target_exclude_paths);
                Ok(false)
            }
            None => {
                self.order.push(name.clone());
                self.entries.insert(name, spec);
                Ok(true)
            }
        }
    }

    fn key(&self, name: &ModuleFullName) -> Result<ModuleKey, ModuleError> {
        self.entries
            .get(name)
            .map(|spec| spec.key.clone())
            .ok_or_else(|| ModuleError::system(format!("unknown remote module {name}")))
    }

    fn take(&mut self, name: &ModuleFullName) -> Result<RemoteSpec, ModuleError> {
        self.entries
            .remove(name)
            .ok_or_else(|| ModuleError::system(format!("unknown remote module {name}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bucket::get_target_file_infos;
    use crate::provider::NopModuleDataProvider;
    use crate::registry::MemoryRegistry;
    use strata_storage::MemBucket;

    fn bucket(files: &[(&str, &str)]) -> Arc<dyn ReadBucket> {
        Arc::new(MemBucket::from_files(files.iter().map(|(p, c)| (*p, c.as_bytes().to_vec()))).unwrap())
    }

    fn name(value: &str) -> ModuleFullName {
        ModuleFullName::parse(value).unwrap()
    }

    fn named(full_name: &str) -> LocalModuleOptions {
        LocalModuleOptions {
            full_name: Some(name(full_name)),
            ..LocalModuleOptions::default()
        }
    }

    fn push(registry: &MemoryRegistry, full_name: &str, files: &[(&str, &str)], deps: &[ModuleKey]) -> ModuleKey {
        let files = files
            .iter()
            .map(|(p, c)| (p.to_string(), c.as_bytes().to_vec()))
            .collect();
        registry
            .push(&Context::new(), &name(full_name), files, deps, &[])
            .unwrap()
    }

    #[test]
    fn local_modules_discover_deps_from_imports() {
        let ctx = Context::new();
        let mut builder = ModuleSetBuilder::new(&ctx, Arc::new(NopModuleDataProvider));
        builder
            .add_local_module(
                bucket(&[("foo/a.schema", "import \"bar/b.schema\";\nmessage A { bar.B b = 1; }")]),
                "foo",
                true,
                LocalModuleOptions::default(),
            )
            .add_local_module(
                bucket(&[("bar/b.schema", "package bar;\nimport \"baz/c.schema\";\nmessage B {}")]),
                "bar",
                false,
                LocalModuleOptions::default(),
            )
            .add_local_module(bucket(&[("baz/c.schema", "message C {}")]), "baz", false, LocalModuleOptions::default());
        let set = builder.build().unwrap();

        let foo = set.get_module_for_bucket_id("foo").unwrap();
        let deps = foo.module_deps(&ctx).unwrap();
        let summary: Vec<(String, bool)> = deps
            .iter()
            .map(|dep| (dep.module().opaque_id(), dep.is_direct()))
            .collect();
        assert_eq!(summary, vec![("bar".to_string(), true), ("baz".to_string(), false)]);
        assert!(set
            .get_module_for_bucket_id("baz")
            .unwrap()
            .module_deps(&ctx)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn local_digest_covers_dependencies() {
        let ctx = Context::new();
        let build = |dep_content: &str| {
            let mut builder = ModuleSetBuilder::new(&ctx, Arc::new(NopModuleDataProvider));
            builder
                .add_local_module(bucket(&[("a.schema", "import \"b.schema\";")]), "a", true, LocalModuleOptions::default())
                .add_local_module(bucket(&[("b.schema", dep_content)]), "b", false, LocalModuleOptions::default());
            builder.build().unwrap()
        };
        let first = build("message B {}");
        let second = build("message B { string x = 1; }");
        let digest = |set: &ModuleSet| set.get_module_for_bucket_id("a").unwrap().digest(&ctx).unwrap();
        assert_eq!(digest(&first), digest(&build("message B {}")));
        assert_ne!(digest(&first), digest(&second));
    }

    #[test]
    fn target_paths_limit_target_files() {
        let ctx = Context::new();
        let mut builder = ModuleSetBuilder::new(&ctx, Arc::new(NopModuleDataProvider));
        builder.add_local_module(
            bucket(&[
                ("a/x.schema", ""),
                ("a/y.schema", ""),
                ("b/z.schema", ""),
                ("README.md", "docs"),
            ]),
            "mod",
            true,
            LocalModuleOptions {
                target_paths: vec!["a".to_string()],
                target_exclude_paths: vec!["a/y.schema".to_string()],
                ..LocalModuleOptions::default()
            },
        );
        let set = builder.build().unwrap();
        let module = set.get_module_for_bucket_id("mod").unwrap();
        let targets: Vec<String> = get_target_file_infos(module, &ctx)
            .unwrap()
            .iter()
            .map(|info| info.path().to_string())
            .collect();
        assert_eq!(targets, vec!["a/x.schema"]);
    }

    #[test]
    fn target_paths_matching_nothing_fail_the_build() {
        let ctx = Context::new();
        let mut builder = ModuleSetBuilder::new(&ctx, Arc::new(NopModuleDataProvider));
        builder.add_local_module(
            bucket(&[("a/x.schema", "")]),
            "mod",
            true,
            LocalModuleOptions {
                target_paths: vec!["missing".to_string()],
                ..LocalModuleOptions::default()
            },
        );
        assert!(matches!(builder.build(), Err(ModuleError::NoTargetFiles)));
    }

    #[test]
    fn modules_without_target_files_are_untargeted() {
        let ctx = Context::new();
        let mut builder = ModuleSetBuilder::new(&ctx, Arc::new(NopModuleDataProvider));
        builder
            .add_local_module(
                bucket(&[("a/x.schema", "")]),
                "one",
                true,
                LocalModuleOptions {
                    target_paths: vec!["a".to_string()],
                    ..LocalModuleOptions::default()
                },
            )
            .add_local_module(
                bucket(&[("b/y.schema", "")]),
                "two",
                true,
                LocalModuleOptions {
                    target_paths: vec!["a".to_string()],
                    ..LocalModuleOptions::default()
                },
            );
        let set = builder.build().unwrap();
        let targets: Vec<String> = set.target_modules().iter().map(Module::opaque_id).collect();
        assert_eq!(targets, vec!["one"]);
    }

    fn target_paths_of(set: &ModuleSet, id: &str) -> Vec<String> {
        let module = set.get_module_for_bucket_id(id).unwrap();
        get_target_file_infos(module, &Context::new())
            .unwrap()
            .iter()
            .map(|info| info.path().to_string())
            .collect()
    }

    fn package_fixture() -> Arc<dyn ReadBucket> {
        bucket(&[
            ("pets/cat.schema", "package acme.pets;\nmessage Cat {}"),
            ("pets/dog.schema", "package acme.pets;\nmessage Dog {}"),
            ("pets/extra/bird.schema", "package acme.pets;\nmessage Bird {}"),
            ("toys/ball.schema", "package acme.toys;\nmessage Ball {}"),
            ("loose.schema", "message Loose {}"),
        ])
    }

    #[test]
    fn schema_file_target_selects_one_file() {
        let ctx = Context::new();
        let mut builder = ModuleSetBuilder::new(&ctx, Arc::new(NopModuleDataProvider));
        builder.add_local_module(
            package_fixture(),
            "mod",
            true,
            LocalModuleOptions {
                schema_file_target_path: Some("pets/cat.schema".to_string()),
                ..LocalModuleOptions::default()
            },
        );
        let set = builder.build().unwrap();
        assert_eq!(target_paths_of(&set, "mod"), vec!["pets/cat.schema"]);
        let module = set.get_module_for_bucket_id("mod").unwrap();
        assert!(module.is_target_path(&ctx, "pets/cat.schema").unwrap());
        assert!(!module.is_target_path(&ctx, "pets/dog.schema").unwrap());
    }

    #[test]
    fn include_package_files_targets_the_whole_package() {
        let ctx = Context::new();
        let mut builder = ModuleSetBuilder::new(&ctx, Arc::new(NopModuleDataProvider));
        builder.add_local_module(
            package_fixture(),
            "mod",
            true,
            LocalModuleOptions {
                schema_file_target_path: Some("pets/cat.schema".to_string()),
                include_package_files: true,
                target_exclude_paths: vec!["pets/extra".to_string()],
                ..LocalModuleOptions::default()
            },
        );
        let set = builder.build().unwrap();
        assert_eq!(
            target_paths_of(&set, "mod"),
            vec!["pets/cat.schema", "pets/dog.schema"]
        );
    }

    #[test]
    fn missing_schema_file_target_leaves_no_targets() {
        let ctx = Context::new();
        let mut builder = ModuleSetBuilder::new(&ctx, Arc::new(NopModuleDataProvider));
        builder.add_local_module(
            package_fixture(),
            "mod",
            true,
            LocalModuleOptions {
                schema_file_target_path: Some("pets/gone.schema".to_string()),
                include_package_files: true,
                ..LocalModuleOptions::default()
            },
        );
        assert!(matches!(builder.build(), Err(ModuleError::NoTargetFiles)));
    }

    #[test]
    fn schema_file_target_must_be_a_lone_schema_file() {
        let ctx = Context::new();
        let build = |options: LocalModuleOptions| {
            let mut builder = ModuleSetBuilder::new(&ctx, Arc::new(NopModuleDataProvider));
            builder.add_local_module(package_fixture(), "mod", true, options);
            builder.build()
        };
        let err = build(LocalModuleOptions {
            schema_file_target_path: Some("pets/cat.schema".to_string()),
            target_paths: vec!["pets".to_string()],
            ..LocalModuleOptions::default()
        })
        .unwrap_err();
        assert!(err.is_system());
        let err = build(LocalModuleOptions {
            schema_file_target_path: Some("README.md".to_string()),
            ..LocalModuleOptions::default()
        })
        .unwrap_err();
        assert!(err.is_system());
    }

    #[test]
    fn local_modules_carry_v1_object_data() {
        let ctx = Context::new();
        let mut builder = ModuleSetBuilder::new(&ctx, Arc::new(NopModuleDataProvider));
        builder.add_local_module(
            bucket(&[("a.schema", "")]),
            "mod",
            true,
            LocalModuleOptions {
                v1_config_object_data: Some(ObjectData::new("strata.toml", b"version = \"v1\"\n".to_vec())),
                ..LocalModuleOptions::default()
            },
        );
        let set = builder.build().unwrap();
        let module = set.get_module_for_bucket_id("mod").unwrap();
        let config = module.v1_config_object_data().unwrap();
        assert_eq!(config.name(), "strata.toml");
        assert_eq!(config.data(), b"version = \"v1\"\n");
        assert!(module.v1_lock_object_data().is_none());
    }

    #[test]
    fn duplicate_local_modules_are_rejected() {
        let ctx = Context::new();
        let mut builder = ModuleSetBuilder::new(&ctx, Arc::new(NopModuleDataProvider));
        builder
            .add_local_module(bucket(&[("a.schema", "")]), "one", true, named("r.com/acme/pets"))
            .add_local_module(bucket(&[("b.schema", "")]), "two", true, named("r.com/acme/pets"));
        let err = builder.build().unwrap_err();
        assert_eq!(
            err.to_string(),
            "multiple local modules were added with name r.com/acme/pets"
        );
    }

    #[test]
    fn remote_modules_are_fetched_with_their_deps() {
        let ctx = Context::new();
        let registry = Arc::new(MemoryRegistry::new("r.com"));
        let base = push(&registry, "r.com/acme/base", &[("base/b.schema", "message B {}")], &[]);
        let pets = push(
            &registry,
            "r.com/acme/pets",
            &[("pets/p.schema", "import \"base/b.schema\";")],
            &[base.clone()],
        );

        let mut builder = ModuleSetBuilder::new(&ctx, registry.clone());
        builder.add_remote_module(pets.clone(), true);
        let set = builder.build().unwrap();

        assert_eq!(set.modules().len(), 2);
        assert_eq!(registry.fetch_count(), 2);
        let module = set.get_module_for_full_name(&name("r.com/acme/pets")).unwrap();
        assert!(module.is_target());
        assert!(!module.is_local());
        assert_eq!(module.digest(&ctx).unwrap(), pets.digest(&ctx).unwrap());
        let deps = module.module_deps(&ctx).unwrap();
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].module().opaque_id(), "r.com/acme/base");
        assert!(!set.get_module_for_full_name(&name("r.com/acme/base")).unwrap().is_target());
    }

    #[test]
    fn remote_target_paths_limit_target_files() {
        let ctx = Context::new();
        let registry = Arc::new(MemoryRegistry::new("r.com"));
        let key = push(
            &registry,
            "r.com/acme/pets",
            &[("a/x.schema", ""), ("a/y.schema", ""), ("b/z.schema", "")],
            &[],
        );
        let mut builder = ModuleSetBuilder::new(&ctx, registry.clone());
        builder.add_remote_module_with_target_paths(
            key,
            true,
            vec!["a".to_string()],
            vec!["a/y.schema".to_string()],
        );
        let set = builder.build().unwrap();
        let module = set.get_module_for_full_name(&name("r.com/acme/pets")).unwrap();
        let targets: Vec<String> = get_target_file_infos(module, &ctx)
            .unwrap()
            .iter()
            .map(|info| info.path().to_string())
            .collect();
        assert_eq!(targets, vec!["a/x.schema"]);
    }

    #[test]
    fn remote_target_paths_matching_nothing_fail_the_build() {
        let ctx = Context::new();
        let registry = Arc::new(MemoryRegistry::new("r.com"));
        let key = push(&registry, "r.com/acme/pets", &[("a/x.schema", "")], &[]);
        let mut builder = ModuleSetBuilder::new(&ctx, registry);
        builder.add_remote_module_with_target_paths(key, true, vec!["missing".to_string()], Vec::new());
        assert!(matches!(builder.build(), Err(ModuleError::NoTargetFiles)));
    }

    #[test]
    fn same_remote_module_added_twice_yields_one_module() {
        let ctx = Context::new();
        let registry = Arc::new(MemoryRegistry::new("r.com"));
        let key = push(&registry, "r.com/acme/pets", &[("p.schema", "")], &[]);
        let mut builder = ModuleSetBuilder::new(&ctx, registry.clone());
        builder
            .add_remote_module(key.clone(), false)
            .add_remote_module(key, true);
        let set = builder.build().unwrap();
        assert_eq!(set.modules().len(), 1);
        assert!(set.modules()[0].is_target());
        assert_eq!(registry.fetch_count(), 1);
    }

    #[test]
    fn conflicting_remote_digests_fail() {
        let ctx = Context::new();
        let registry = Arc::new(MemoryRegistry::new("r.com"));
        let v1 = push(&registry, "r.com/acme/pets", &[("p.schema", "message A {}")], &[]);
        let v2 = push(&registry, "r.com/acme/pets", &[("p.schema", "message B {}")], &[]);
        let mut builder = ModuleSetBuilder::new(&ctx, registry);
        builder.add_remote_module(v1, true).add_remote_module(v2, true);
        assert!(matches!(
            builder.build(),
            Err(ModuleError::ConflictingDigests { .. })
        ));
    }

    #[test]
    fn local_module_overrides_remote_module_of_same_name() {
        let ctx = Context::new();
        let registry = Arc::new(MemoryRegistry::new("r.com"));
        let key = push(&registry, "r.com/acme/pets", &[("p.schema", "")], &[]);
        let mut builder = ModuleSetBuilder::new(&ctx, registry.clone());
        builder
            .add_local_module(bucket(&[("p.schema", "message Local {}")]), "pets", true, named("r.com/acme/pets"))
            .add_remote_module(key, false);
        let set = builder.build().unwrap();
        assert_eq!(set.modules().len(), 1);
        assert!(set.modules()[0].is_local());
        assert_eq!(registry.fetch_count(), 0);
    }

    #[test]
    fn tampered_remote_module_aborts_the_build() {
        let ctx = Context::new();
        let registry = Arc::new(MemoryRegistry::new("r.com"));
        let base = push(&registry, "r.com/acme/base", &[("b.schema", "message B {}")], &[]);
        let pets = push(&registry, "r.com/acme/pets", &[("p.schema", "import \"b.schema\";")], &[base.clone()]);
        registry.tamper(base.commit_id(), "b.schema", "message Evil {}");

        let mut builder = ModuleSetBuilder::new(&ctx, registry);
        builder.add_remote_module(pets, true);
        assert!(matches!(
            builder.build(),
            Err(ModuleError::VerificationFailed { .. })
        ));
    }

    #[test]
    fn canceled_context_stops_the_build() {
        let ctx = Context::new();
        ctx.cancel();
        let builder = ModuleSetBuilder::new(&ctx, Arc::new(NopModuleDataProvider));
        assert!(matches!(builder.build(), Err(ModuleError::Canceled(_))));
    }
}

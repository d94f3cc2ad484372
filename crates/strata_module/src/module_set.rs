//! The immutable, deduplicated collection of modules a build works on.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Dfs;
use strata_common::{Context, Memo, ModuleFullName};

use crate::bucket::{FilteredModuleReadBucket, ModuleReadBucket, MultiModuleReadBucket};
use crate::error::ModuleError;
use crate::module::Module;

/// Every module of a build, indexed by identity.
///
/// Built once by [`ModuleSetBuilder`](crate::ModuleSetBuilder) and never
/// mutated afterwards; safe to share between threads. Cloning is cheap.
#[derive(Clone)]
pub struct ModuleSet {
    inner: Arc<ModuleSetInner>,
}

pub(crate) struct ModuleSetInner {
    pub(crate) modules: Vec<Module>,
    by_opaque_id: HashMap<String, usize>,
    by_full_name: HashMap<ModuleFullName, usize>,
    by_bucket_id: HashMap<String, usize>,
    file_index: Memo<Arc<HashMap<String, Vec<usize>>>, ModuleError>,
}

impl ModuleSetInner {
    /// Maps every file path to the modules holding it, in set order.
    pub(crate) fn file_index(
        &self,
        ctx: &Context,
    ) -> Result<Arc<HashMap<String, Vec<usize>>>, ModuleError> {
        self.file_index.get_or_try_init(|| {
            let mut index: HashMap<String, Vec<usize>> = HashMap::new();
            for (i, module) in self.modules.iter().enumerate() {
                module.walk_file_infos(ctx, false, &mut |info| {
                    index.entry(info.path().to_string()).or_default().push(i);
                    Ok(())
                })?;
            }
            Ok(Arc::new(index))
        })
    }
}

impl ModuleSet {
    /// Indexes `modules`, which must already be deduplicated.
    pub(crate) fn new(modules: Vec<Module>) -> Result<Self, ModuleError> {
        let mut by_opaque_id = HashMap::new();
        let mut by_full_name = HashMap::new();
        let mut by_bucket_id = HashMap::new();
        for (i, module) in modules.iter().enumerate() {
            if by_opaque_id.insert(module.opaque_id(), i).is_some() {
                return Err(ModuleError::system(format!(
                    "duplicate module {} in module set",
                    module.opaque_id()
                )));
            }
            if let Some(name) = module.full_name() {
                by_full_name.insert(name.clone(), i);
            }
            if !module.bucket_id().is_empty() {
                by_bucket_id.insert(module.bucket_id().to_string(), i);
            }
        }
        let inner = Arc::new(ModuleSetInner {
            modules,
            by_opaque_id,
            by_full_name,
            by_bucket_id,
            file_index: Memo::new(),
        });
        for (i, module) in inner.modules.iter().enumerate() {
            module.join_set(Arc::downgrade(&inner), i);
        }
        Ok(Self { inner })
    }

    /// All modules, local modules first, each group in the order added.
    pub fn modules(&self) -> &[Module] {
        &self.inner.modules
    }

    /// The modules marked as targets.
    pub fn target_modules(&self) -> Vec<Module> {
        self.inner
            .modules
            .iter()
            .filter(|module| module.is_target())
            .cloned()
            .collect()
    }

    /// The module with the given opaque ID.
    pub fn get_module_for_opaque_id(&self, opaque_id: &str) -> Option<&Module> {
        self.inner
            .by_opaque_id
            .get(opaque_id)
            .map(|&i| &self.inner.modules[i])
    }

    /// The module with the given name.
    pub fn get_module_for_full_name(&self, full_name: &ModuleFullName) -> Option<&Module> {
        self.inner
            .by_full_name
            .get(full_name)
            .map(|&i| &self.inner.modules[i])
    }

    /// The local module with the given bucket ID.
    pub fn get_module_for_bucket_id(&self, bucket_id: &str) -> Option<&Module> {
        self.inner
            .by_bucket_id
            .get(bucket_id)
            .map(|&i| &self.inner.modules[i])
    }

    fn dependency_graph(&self, ctx: &Context) -> Result<DiGraph<usize, ()>, ModuleError> {
        let mut graph = DiGraph::new();
        let nodes: Vec<NodeIndex> = (0..self.inner.modules.len())
            .map(|i| graph.add_node(i))
            .collect();
        for (i, module) in self.inner.modules.iter().enumerate() {
            for dep in module.direct_dep_indexes(ctx)? {
                graph.add_edge(nodes[i], nodes[dep], ());
            }
        }
        Ok(graph)
    }

    /// The local target modules together with every local module they
    /// depend on, transitively, in set order.
    pub fn target_local_modules_and_transitive_local_deps(
        &self,
        ctx: &Context,
    ) -> Result<Vec<Module>, ModuleError> {
        let graph = self.dependency_graph(ctx)?;
        let mut reached = BTreeSet::new();
        for (i, module) in self.inner.modules.iter().enumerate() {
            if !(module.is_local() && module.is_target()) {
                continue;
            }
            let mut dfs = Dfs::new(&graph, NodeIndex::new(i));
            while let Some(node) = dfs.next(&graph) {
                reached.insert(graph[node]);
            }
        }
        Ok(reached
            .into_iter()
            .map(|i| self.inner.modules[i].clone())
            .filter(Module::is_local)
            .collect())
    }

    /// Fails if any modules depend on each other in a cycle.
    pub fn check_dependency_cycles(&self, ctx: &Context) -> Result<(), ModuleError> {
        let graph = self.dependency_graph(ctx)?;
        for component in tarjan_scc(&graph) {
            let self_loop = component.len() == 1 && graph.contains_edge(component[0], component[0]);
            if component.len() < 2 && !self_loop {
                continue;
            }
            let mut ids: Vec<String> = component
                .iter()
                .map(|&node| self.inner.modules[graph[node]].opaque_id())
                .collect();
            ids.sort();
            ids.push(ids[0].clone());
            return Err(ModuleError::DependencyCycle {
                cycle: ids.join(" -> "),
            });
        }
        Ok(())
    }

    /// The files of every module as one self-contained view.
    pub fn to_module_read_bucket(&self) -> Arc<dyn ModuleReadBucket> {
        Arc::new(MultiModuleReadBucket::new(self.inner.modules.clone(), true))
    }

    /// Like [`ModuleSet::to_module_read_bucket`], restricted to schema files.
    pub fn to_module_read_bucket_with_only_schema_files(&self) -> Arc<dyn ModuleReadBucket> {
        Arc::new(FilteredModuleReadBucket::schema_files(
            self.to_module_read_bucket(),
        ))
    }
}

impl std::fmt::Debug for ModuleSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.inner.modules.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bucket::get_file_infos;
    use crate::builder::{LocalModuleOptions, ModuleSetBuilder};
    use crate::provider::NopModuleDataProvider;
    use strata_storage::{MemBucket, ReadBucket};

    fn build(ctx: &Context, modules: &[(&str, bool, &[(&str, &str)])]) -> ModuleSet {
        let mut builder = ModuleSetBuilder::new(ctx, Arc::new(NopModuleDataProvider));
        for (id, is_target, files) in modules {
            let bucket: Arc<dyn ReadBucket> = Arc::new(
                MemBucket::from_files(files.iter().map(|(p, c)| (*p, c.as_bytes().to_vec()))).unwrap(),
            );
            builder.add_local_module(bucket, *id, *is_target, LocalModuleOptions::default());
        }
        builder.build().unwrap()
    }

    #[test]
    fn lookups_by_identity() {
        let ctx = Context::new();
        let set = build(&ctx, &[("one", true, &[("a.schema", "")])]);
        assert!(set.get_module_for_opaque_id("one").is_some());
        assert!(set.get_module_for_bucket_id("one").is_some());
        assert!(set.get_module_for_opaque_id("two").is_none());
        assert!(set
            .get_module_for_full_name(&ModuleFullName::parse("r.com/acme/one").unwrap())
            .is_none());
    }

    #[test]
    fn target_local_modules_include_transitive_local_deps() {
        let ctx = Context::new();
        let set = build(
            &ctx,
            &[
                ("app", true, &[("app.schema", "import \"lib.schema\";")]),
                ("lib", false, &[("lib.schema", "import \"core.schema\";")]),
                ("core", false, &[("core.schema", "")]),
                ("unused", false, &[("unused.schema", "")]),
            ],
        );
        let ids: Vec<String> = set
            .target_local_modules_and_transitive_local_deps(&ctx)
            .unwrap()
            .iter()
            .map(Module::opaque_id)
            .collect();
        assert_eq!(ids, vec!["app", "lib", "core"]);
    }

    #[test]
    fn dependency_cycles_are_reported() {
        let ctx = Context::new();
        let set = build(
            &ctx,
            &[
                ("a", true, &[("a.schema", "import \"b.schema\";")]),
                ("b", false, &[("b.schema", "import \"a.schema\";")]),
            ],
        );
        let err = set.check_dependency_cycles(&ctx).unwrap_err();
        assert_eq!(
            err.to_string(),
            "cycle detected in module dependencies: a -> b -> a"
        );
        let acyclic = build(&ctx, &[("a", true, &[("a.schema", "")])]);
        assert!(acyclic.check_dependency_cycles(&ctx).is_ok());
    }

    #[test]
    fn merged_bucket_serves_first_module_on_collision() {
        let ctx = Context::new();
        let set = build(
            &ctx,
            &[
                ("first", true, &[("shared.schema", "message First {}")]),
                ("second", false, &[("shared.schema", "message Second {}"), ("own.schema", "")]),
            ],
        );
        let bucket = set.to_module_read_bucket();
        assert!(bucket.should_be_self_contained());
        let file = bucket.get_file(&ctx, "shared.schema").unwrap();
        assert_eq!(file.info().module().opaque_id(), "first");
        assert_eq!(file.read_to_string().unwrap(), "message First {}");
        let paths: Vec<String> = get_file_infos(bucket.as_ref(), &ctx)
            .unwrap()
            .iter()
            .map(|info| info.path().to_string())
            .collect();
        assert_eq!(paths, vec!["own.schema", "shared.schema"]);
    }

    #[test]
    fn schema_only_bucket_drops_docs() {
        let ctx = Context::new();
        let set = build(&ctx, &[("one", true, &[("a.schema", ""), ("LICENSE", "MIT")])]);
        let bucket = set.to_module_read_bucket_with_only_schema_files();
        assert!(bucket.get_file(&ctx, "LICENSE").unwrap_err().is_not_exist());
        assert!(bucket.get_file(&ctx, "a.schema").is_ok());
    }
}

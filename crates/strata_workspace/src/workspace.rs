//! A resolved workspace.

use std::collections::HashMap;

use strata_common::ModuleRef;
use strata_config::{BreakingConfig, LintConfig, PluginConfig};
use strata_module::ModuleSet;

/// A [`ModuleSet`] plus the check configuration of each module and the
/// dependencies the workspace's config files declare.
#[derive(Clone)]
pub struct Workspace {
    module_set: ModuleSet,
    lint_configs: HashMap<String, LintConfig>,
    breaking_configs: HashMap<String, BreakingConfig>,
    configured_dep_module_refs: Vec<ModuleRef>,
    plugin_configs: Vec<PluginConfig>,
    is_v2: bool,
}

impl Workspace {
    pub(crate) fn new(
        module_set: ModuleSet,
        lint_configs: HashMap<String, LintConfig>,
        breaking_configs: HashMap<String, BreakingConfig>,
        configured_dep_module_refs: Vec<ModuleRef>,
        plugin_configs: Vec<PluginConfig>,
        is_v2: bool,
    ) -> Self {
        Self {
            module_set,
            lint_configs,
            breaking_configs,
            configured_dep_module_refs,
            plugin_configs,
            is_v2,
        }
    }

    /// The workspace's modules, local and remote.
    pub fn module_set(&self) -> &ModuleSet {
        &self.module_set
    }

    /// The lint configuration of the module with `opaque_id`.
    pub fn lint_config_for_opaque_id(&self, opaque_id: &str) -> Option<&LintConfig> {
        self.lint_configs.get(opaque_id)
    }

    /// The breaking configuration of the module with `opaque_id`.
    pub fn breaking_config_for_opaque_id(&self, opaque_id: &str) -> Option<&BreakingConfig> {
        self.breaking_configs.get(opaque_id)
    }

    /// Dependencies declared in config files, one per module name, sorted.
    pub fn configured_dep_module_refs(&self) -> &[ModuleRef] {
        &self.configured_dep_module_refs
    }

    /// Check plugins declared by a v2 config.
    pub fn plugin_configs(&self) -> &[PluginConfig] {
        &self.plugin_configs
    }

    /// Whether the workspace is defined by a v2 config.
    pub fn is_v2(&self) -> bool {
        self.is_v2
    }
}

impl std::fmt::Debug for Workspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workspace")
            .field("modules", &self.module_set.modules().len())
            .field("configured_dep_module_refs", &self.configured_dep_module_refs)
            .field("is_v2", &self.is_v2)
            .finish()
    }
}

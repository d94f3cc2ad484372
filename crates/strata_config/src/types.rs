//! Configuration value objects produced by the loaders.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use strata_cas::Digest;
use strata_common::{CommitId, ModuleFullName, ModuleRef};

/// The schema version of a configuration, workspace, or lock file.
///
/// Versions are ordered oldest to newest.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum FileVersion {
    /// The original format: explicit roots per module.
    V1Beta1,
    /// One module per directory with the root fixed at the directory.
    V1,
    /// One file describing every module of a workspace.
    V2,
}

impl FileVersion {
    /// The string used in the `version` key.
    pub fn as_str(self) -> &'static str {
        match self {
            FileVersion::V1Beta1 => "v1beta1",
            FileVersion::V1 => "v1",
            FileVersion::V2 => "v2",
        }
    }
}

impl fmt::Display for FileVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileVersion {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "v1beta1" => Ok(FileVersion::V1Beta1),
            "v1" => Ok(FileVersion::V1),
            "v2" => Ok(FileVersion::V2),
            other => Err(other.to_string()),
        }
    }
}

/// Rule selection shared by lint and breaking configuration.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct CheckConfig {
    /// The version of the file this configuration came from.
    pub file_version: FileVersion,
    /// Rule IDs or category names to enable.
    pub use_ids: Vec<String>,
    /// Rule IDs or category names to disable after `use_ids` is expanded.
    pub except_ids: Vec<String>,
    /// Module-relative paths ignored by every rule.
    pub ignore_paths: Vec<String>,
    /// Module-relative paths ignored by individual rules or categories.
    pub ignore_id_to_paths: BTreeMap<String, Vec<String>>,
    /// Disables built-in rules so that only plugin rules run.
    pub disable_builtin: bool,
}

impl CheckConfig {
    fn with_use(file_version: FileVersion, use_ids: &[&str]) -> Self {
        Self {
            file_version,
            use_ids: use_ids.iter().map(|id| id.to_string()).collect(),
            except_ids: Vec::new(),
            ignore_paths: Vec::new(),
            ignore_id_to_paths: BTreeMap::new(),
            disable_builtin: false,
        }
    }
}

/// Lint rule selection for one module.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct LintConfig {
    /// Rule selection.
    pub check: CheckConfig,
    /// Allows `// lint:ignore <ID>` comments to suppress findings.
    pub allow_comment_ignores: bool,
}

impl LintConfig {
    /// The default lint configuration for files of `version`.
    ///
    /// `v2` uses the `STANDARD` category; older versions use `DEFAULT`.
    pub fn default_for(version: FileVersion) -> Self {
        let category = match version {
            FileVersion::V2 => "STANDARD",
            FileVersion::V1Beta1 | FileVersion::V1 => "DEFAULT",
        };
        Self {
            check: CheckConfig::with_use(version, &[category]),
            allow_comment_ignores: false,
        }
    }
}

/// Breaking-change rule selection for one module.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct BreakingConfig {
    /// Rule selection.
    pub check: CheckConfig,
    /// Skips packages whose last component marks them unstable (`alpha`,
    /// `beta`, `test`).
    pub ignore_unstable_packages: bool,
}

impl BreakingConfig {
    /// The default breaking configuration for files of `version`.
    pub fn default_for(version: FileVersion) -> Self {
        Self {
            check: CheckConfig::with_use(version, &["FILE"]),
            ignore_unstable_packages: false,
        }
    }
}

/// Configuration of one module within a workspace.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ModuleConfig {
    /// The module's directory relative to the workspace root.
    pub dir_path: String,
    /// The module's name on a registry, if it has one.
    pub full_name: Option<ModuleFullName>,
    /// Roots within the module directory, each mapped to its root-relative
    /// excludes.
    pub root_to_excludes: BTreeMap<String, Vec<String>>,
    /// Lint configuration.
    pub lint: LintConfig,
    /// Breaking configuration.
    pub breaking: BreakingConfig,
}

impl ModuleConfig {
    /// The configuration used for a v1 module directory with no config file.
    pub fn default_v1() -> Self {
        Self::default_for(FileVersion::V1, ".")
    }

    /// A default, unnamed configuration rooted at `dir_path`.
    pub fn default_for(version: FileVersion, dir_path: &str) -> Self {
        Self {
            dir_path: dir_path.to_string(),
            full_name: None,
            root_to_excludes: BTreeMap::from([(".".to_string(), Vec::new())]),
            lint: LintConfig::default_for(version),
            breaking: BreakingConfig::default_for(version),
        }
    }
}

/// How a configured plugin is obtained.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PluginConfigType {
    /// A local executable invoked by path.
    Local,
    /// A local WebAssembly file.
    LocalWasm,
    /// A WebAssembly plugin hosted on a registry.
    Remote,
}

/// A check plugin listed in a v2 config file.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct PluginConfig {
    /// How the plugin is obtained.
    pub plugin_type: PluginConfigType,
    /// The executable path, Wasm path, or registry name.
    pub name: String,
    /// Extra arguments for local executables.
    pub args: Vec<String>,
    /// Plugin options passed through verbatim.
    pub options: BTreeMap<String, String>,
}

/// A parsed `strata.toml`.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ModuleConfigFile {
    /// The file's version.
    pub file_version: FileVersion,
    /// One entry per module. v1beta1 and v1 files always hold exactly one,
    /// with `dir_path` `"."`.
    pub module_configs: Vec<ModuleConfig>,
    /// The `deps` entries.
    pub configured_dep_module_refs: Vec<ModuleRef>,
    /// Check plugins (v2 only).
    pub plugin_configs: Vec<PluginConfig>,
}

/// A parsed `strata.work.toml`.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct WorkFile {
    /// The file's version. Always [`FileVersion::V1`].
    pub file_version: FileVersion,
    /// The module directories, sorted.
    pub dir_paths: Vec<String>,
}

/// One pinned dependency in a lock file.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct LockDep {
    /// The dependency's name.
    pub full_name: ModuleFullName,
    /// The pinned commit.
    pub commit_id: CommitId,
    /// The expected digest; older lock files may omit it.
    pub digest: Option<Digest>,
}

/// A parsed `strata.lock`.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct LockFile {
    /// The file's version.
    pub file_version: FileVersion,
    /// Every dependency of the module or workspace, including transitive
    /// ones, sorted by name.
    pub deps: Vec<LockDep>,
}

impl LockFile {
    /// An empty lock file of `version`.
    pub fn empty(version: FileVersion) -> Self {
        Self {
            file_version: version,
            deps: Vec::new(),
        }
    }
}

//! Loading, version dispatch, and validation of configuration files.
//!
//! Each file kind has a `load_*_from_str` entry point that parses and
//! validates TOML text, and a `get_*_for_prefix` entry point that reads the
//! file out of a bucket directory. A missing file surfaces as a
//! [`ConfigError`] for which [`ConfigError::is_not_exist`] is `true`.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use strata_cas::{Digest, DigestType};
use strata_common::{normalpath, CommitId, Context, ModuleFullName, ModuleRef};
use strata_storage::{read_all, ReadBucket};

use crate::error::ConfigError;
use crate::raw::{
    RawCheck, RawLock, RawLockDep, RawPlugin, RawV1, RawV1Beta1, RawV2, RawWork, VersionOnly,
};
use crate::types::{
    BreakingConfig, CheckConfig, FileVersion, LintConfig, LockDep, LockFile, ModuleConfig,
    ModuleConfigFile, PluginConfig, PluginConfigType, WorkFile,
};

/// The module or workspace configuration file name.
pub const CONFIG_FILE_NAME: &str = "strata.toml";
/// The legacy workspace file name.
pub const WORK_FILE_NAME: &str = "strata.work.toml";
/// The lock file name.
pub const LOCK_FILE_NAME: &str = "strata.lock";

/// A configuration supplied by the caller in place of file discovery.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigOverride {
    /// Inline `strata.toml` content.
    Data(String),
    /// A path to a file holding `strata.toml` content.
    Path(PathBuf),
}

/// Parses and validates `strata.toml` content.
pub fn load_module_config_file_from_str(content: &str) -> Result<ModuleConfigFile, ConfigError> {
    let file = CONFIG_FILE_NAME;
    let version = read_version(file, content)?.unwrap_or(FileVersion::V1Beta1);
    match version {
        FileVersion::V1Beta1 => convert_v1beta1(parse(file, content)?),
        FileVersion::V1 => convert_v1(parse(file, content)?),
        FileVersion::V2 => convert_v2(parse(file, content)?),
    }
}

/// Reads `strata.toml` from the directory `prefix` of `bucket`.
pub fn get_module_config_file_for_prefix(
    ctx: &Context,
    bucket: &dyn ReadBucket,
    prefix: &str,
) -> Result<ModuleConfigFile, ConfigError> {
    let content = read_text(ctx, bucket, prefix, CONFIG_FILE_NAME)?;
    load_module_config_file_from_str(&content)
}

/// Loads a caller-supplied override, validated against its own version.
pub fn load_module_config_file_for_override(
    config_override: &ConfigOverride,
) -> Result<ModuleConfigFile, ConfigError> {
    match config_override {
        ConfigOverride::Data(content) => load_module_config_file_from_str(content),
        ConfigOverride::Path(path) => {
            let content =
                std::fs::read_to_string(path).map_err(|err| ConfigError::Io(Arc::new(err)))?;
            load_module_config_file_from_str(&content)
        }
    }
}

/// Parses and validates `strata.work.toml` content.
///
/// Only version `v1` exists for workspace files.
pub fn load_work_file_from_str(content: &str) -> Result<WorkFile, ConfigError> {
    let file = WORK_FILE_NAME;
    match read_version(file, content)? {
        Some(FileVersion::V1) => {}
        Some(other) => {
            return Err(ConfigError::UnsupportedVersion {
                file: file.to_string(),
                version: other.to_string(),
            })
        }
        None => return Err(ConfigError::validation(file, "missing version")),
    }
    let raw: RawWork = parse(file, content)?;
    if raw.directories.is_empty() {
        return Err(ConfigError::validation(file, "no directories listed"));
    }
    let mut dir_paths = Vec::with_capacity(raw.directories.len());
    for directory in &raw.directories {
        let dir_path = normalize(file, directory)?;
        if dir_path == "." {
            return Err(ConfigError::validation(
                file,
                "directory \".\" cannot be listed; list each module directory instead",
            ));
        }
        dir_paths.push(dir_path);
    }
    check_no_overlap(file, "directories", &dir_paths)?;
    dir_paths.sort();
    Ok(WorkFile {
        file_version: FileVersion::V1,
        dir_paths,
    })
}

/// Reads `strata.work.toml` from the directory `prefix` of `bucket`.
pub fn get_work_file_for_prefix(
    ctx: &Context,
    bucket: &dyn ReadBucket,
    prefix: &str,
) -> Result<WorkFile, ConfigError> {
    let content = read_text(ctx, bucket, prefix, WORK_FILE_NAME)?;
    load_work_file_from_str(&content)
}

/// Parses and validates `strata.lock` content.
///
/// `v2` lock files must carry a `b5` digest for every dependency.
pub fn load_lock_file_from_str(content: &str) -> Result<LockFile, ConfigError> {
    let file = LOCK_FILE_NAME;
    let version = read_version(file, content)?.unwrap_or(FileVersion::V1Beta1);
    let raw: RawLock = parse(file, content)?;
    let mut deps = Vec::with_capacity(raw.deps.len());
    for dep in raw.deps {
        let full_name = ModuleFullName::parse(&dep.name)?;
        let commit_id = CommitId::parse(&dep.commit)?;
        let digest = dep.digest.as_deref().map(Digest::parse).transpose()?;
        if version == FileVersion::V2 {
            match digest {
                Some(digest) if digest.digest_type() == DigestType::B5 => {}
                Some(digest) => {
                    return Err(ConfigError::validation(
                        file,
                        format!("dependency {full_name} has digest {digest}, expected a b5 digest"),
                    ))
                }
                None => {
                    return Err(ConfigError::validation(
                        file,
                        format!("dependency {full_name} has no digest"),
                    ))
                }
            }
        }
        deps.push(LockDep {
            full_name,
            commit_id,
            digest,
        });
    }
    deps.sort_by(|a, b| a.full_name.cmp(&b.full_name));
    for pair in deps.windows(2) {
        if pair[0].full_name == pair[1].full_name {
            return Err(ConfigError::validation(
                file,
                format!("dependency {} is listed more than once", pair[0].full_name),
            ));
        }
    }
    Ok(LockFile {
        file_version: version,
        deps,
    })
}

/// Reads `strata.lock` from the directory `prefix` of `bucket`.
pub fn get_lock_file_for_prefix(
    ctx: &Context,
    bucket: &dyn ReadBucket,
    prefix: &str,
) -> Result<LockFile, ConfigError> {
    let content = read_text(ctx, bucket, prefix, LOCK_FILE_NAME)?;
    load_lock_file_from_str(&content)
}

/// Renders a lock file as TOML, dependencies sorted by name.
pub fn lock_file_to_string(lock_file: &LockFile) -> Result<String, ConfigError> {
    let mut deps: Vec<&LockDep> = lock_file.deps.iter().collect();
    deps.sort_by(|a, b| a.full_name.cmp(&b.full_name));
    let raw = RawLock {
        version: lock_file.file_version.to_string(),
        deps: deps
            .into_iter()
            .map(|dep| RawLockDep {
                name: dep.full_name.to_string(),
                commit: dep.commit_id.to_string(),
                digest: dep.digest.map(|digest| digest.to_string()),
            })
            .collect(),
    };
    toml::to_string(&raw).map_err(|err| ConfigError::Parse {
        file: LOCK_FILE_NAME.to_string(),
        message: err.to_string(),
    })
}

fn read_text(
    ctx: &Context,
    bucket: &dyn ReadBucket,
    prefix: &str,
    name: &str,
) -> Result<String, ConfigError> {
    let path = normalpath::join(prefix, name);
    let data = read_all(bucket, ctx, &path)?;
    String::from_utf8(data).map_err(|_| ConfigError::Parse {
        file: path,
        message: "file is not valid UTF-8".to_string(),
    })
}

fn parse<T: DeserializeOwned>(file: &str, content: &str) -> Result<T, ConfigError> {
    toml::from_str(content).map_err(|err| ConfigError::Parse {
        file: file.to_string(),
        message: err.to_string(),
    })
}

fn read_version(file: &str, content: &str) -> Result<Option<FileVersion>, ConfigError> {
    let raw: VersionOnly = parse(file, content)?;
    raw.version
        .map(|version| {
            version
                .parse()
                .map_err(|version| ConfigError::InvalidVersion {
                    file: file.to_string(),
                    version,
                })
        })
        .transpose()
}

fn normalize(file: &str, path: &str) -> Result<String, ConfigError> {
    normalpath::normalize(path).map_err(|source| ConfigError::Path {
        file: file.to_string(),
        source,
    })
}

fn check_no_overlap(file: &str, what: &str, paths: &[String]) -> Result<(), ConfigError> {
    for (i, a) in paths.iter().enumerate() {
        for b in &paths[i + 1..] {
            if normalpath::equals_or_contains(a, b) || normalpath::equals_or_contains(b, a) {
                return Err(ConfigError::validation(
                    file,
                    format!("{what} {a:?} and {b:?} overlap"),
                ));
            }
        }
    }
    Ok(())
}

/// Nested paths are allowed; only repeats are rejected.
fn check_unique(file: &str, what: &str, paths: &[String]) -> Result<(), ConfigError> {
    let mut seen = std::collections::HashSet::new();
    for path in paths {
        if !seen.insert(path.as_str()) {
            return Err(ConfigError::validation(
                file,
                format!("{what} {path:?} is listed more than once"),
            ));
        }
    }
    Ok(())
}

fn parse_refs(deps: &[String]) -> Result<Vec<ModuleRef>, ConfigError> {
    deps.iter()
        .map(|dep| ModuleRef::parse(dep).map_err(ConfigError::from))
        .collect()
}

fn parse_name(name: Option<&str>) -> Result<Option<ModuleFullName>, ConfigError> {
    name.map(ModuleFullName::parse).transpose().map_err(ConfigError::from)
}

/// Rewrites workspace-relative ignore paths to be relative to `module_dir`,
/// dropping those outside it.
fn module_relative(file: &str, paths: &[String], module_dir: &str) -> Result<Vec<String>, ConfigError> {
    let mut out = Vec::new();
    for path in paths {
        let path = normalize(file, path)?;
        if let Ok(relative) = normalpath::rel(module_dir, &path) {
            out.push(relative);
        }
    }
    Ok(out)
}

fn check_config(
    file: &str,
    version: FileVersion,
    raw: &RawCheck,
    default: CheckConfig,
    module_dir: Option<&str>,
) -> Result<CheckConfig, ConfigError> {
    let rebase = |paths: &[String]| -> Result<Vec<String>, ConfigError> {
        match module_dir {
            Some(dir) => module_relative(file, paths, dir),
            None => paths.iter().map(|p| normalize(file, p)).collect(),
        }
    };
    let mut ignore_id_to_paths = BTreeMap::new();
    for (id, paths) in &raw.ignore_only {
        ignore_id_to_paths.insert(id.clone(), rebase(paths)?);
    }
    Ok(CheckConfig {
        file_version: version,
        use_ids: raw.use_ids.clone().unwrap_or(default.use_ids),
        except_ids: raw.except.clone(),
        ignore_paths: rebase(&raw.ignore)?,
        ignore_id_to_paths,
        disable_builtin: raw.disable_builtin,
    })
}

fn lint_config(
    file: &str,
    version: FileVersion,
    raw: Option<&RawCheck>,
    module_dir: Option<&str>,
) -> Result<LintConfig, ConfigError> {
    let default = LintConfig::default_for(version);
    match raw {
        None => Ok(default),
        Some(raw) => Ok(LintConfig {
            check: check_config(file, version, raw, default.check, module_dir)?,
            allow_comment_ignores: raw.allow_comment_ignores,
        }),
    }
}

fn breaking_config(
    file: &str,
    version: FileVersion,
    raw: Option<&RawCheck>,
    module_dir: Option<&str>,
) -> Result<BreakingConfig, ConfigError> {
    let default = BreakingConfig::default_for(version);
    match raw {
        None => Ok(default),
        Some(raw) => Ok(BreakingConfig {
            check: check_config(file, version, raw, default.check, module_dir)?,
            ignore_unstable_packages: raw.ignore_unstable_packages,
        }),
    }
}

fn convert_v1beta1(raw: RawV1Beta1) -> Result<ModuleConfigFile, ConfigError> {
    let file = CONFIG_FILE_NAME;
    let version = FileVersion::V1Beta1;
    let roots = if raw.build.roots.is_empty() {
        vec![".".to_string()]
    } else {
        raw.build
            .roots
            .iter()
            .map(|root| normalize(file, root))
            .collect::<Result<Vec<_>, _>>()?
    };
    check_no_overlap(file, "roots", &roots)?;
    let mut root_to_excludes: BTreeMap<String, Vec<String>> =
        roots.iter().map(|root| (root.clone(), Vec::new())).collect();
    for exclude in &raw.build.excludes {
        let exclude = normalize(file, exclude)?;
        if roots.contains(&exclude) {
            return Err(ConfigError::validation(
                file,
                format!("exclude {exclude:?} is equal to a root"),
            ));
        }
        let root = roots
            .iter()
            .find(|root| normalpath::contains(root, &exclude))
            .ok_or_else(|| {
                ConfigError::validation(file, format!("exclude {exclude:?} is not contained in any root"))
            })?;
        let relative = normalpath::rel(root, &exclude).map_err(|source| ConfigError::Path {
            file: file.to_string(),
            source,
        })?;
        if let Some(excludes) = root_to_excludes.get_mut(root) {
            excludes.push(relative);
        }
    }
    for excludes in root_to_excludes.values_mut() {
        excludes.sort();
        excludes.dedup();
    }
    let module_config = ModuleConfig {
        dir_path: ".".to_string(),
        full_name: parse_name(raw.name.as_deref())?,
        root_to_excludes,
        lint: lint_config(file, version, raw.lint.as_ref(), None)?,
        breaking: breaking_config(file, version, raw.breaking.as_ref(), None)?,
    };
    Ok(ModuleConfigFile {
        file_version: version,
        module_configs: vec![module_config],
        configured_dep_module_refs: parse_refs(&raw.deps)?,
        plugin_configs: Vec::new(),
    })
}

fn convert_v1(raw: RawV1) -> Result<ModuleConfigFile, ConfigError> {
    let file = CONFIG_FILE_NAME;
    let version = FileVersion::V1;
    let mut excludes = Vec::with_capacity(raw.build.excludes.len());
    for exclude in &raw.build.excludes {
        let exclude = normalize(file, exclude)?;
        if exclude == "." {
            return Err(ConfigError::validation(file, "cannot exclude the module root"));
        }
        excludes.push(exclude);
    }
    excludes.sort();
    excludes.dedup();
    let module_config = ModuleConfig {
        dir_path: ".".to_string(),
        full_name: parse_name(raw.name.as_deref())?,
        root_to_excludes: BTreeMap::from([(".".to_string(), excludes)]),
        lint: lint_config(file, version, raw.lint.as_ref(), None)?,
        breaking: breaking_config(file, version, raw.breaking.as_ref(), None)?,
    };
    Ok(ModuleConfigFile {
        file_version: version,
        module_configs: vec![module_config],
        configured_dep_module_refs: parse_refs(&raw.deps)?,
        plugin_configs: Vec::new(),
    })
}

fn convert_v2(raw: RawV2) -> Result<ModuleConfigFile, ConfigError> {
    let file = CONFIG_FILE_NAME;
    let version = FileVersion::V2;
    let mut module_configs = Vec::new();
    if raw.modules.is_empty() {
        module_configs.push(ModuleConfig {
            dir_path: ".".to_string(),
            full_name: None,
            root_to_excludes: BTreeMap::from([(".".to_string(), Vec::new())]),
            lint: lint_config(file, version, raw.lint.as_ref(), Some("."))?,
            breaking: breaking_config(file, version, raw.breaking.as_ref(), Some("."))?,
        });
    }
    let mut dir_paths = Vec::with_capacity(raw.modules.len());
    for module in &raw.modules {
        let dir_path = normalize(file, &module.path)?;
        let mut excludes = Vec::with_capacity(module.excludes.len());
        for exclude in &module.excludes {
            let exclude = normalize(file, exclude)?;
            if !normalpath::contains(&dir_path, &exclude) {
                return Err(ConfigError::validation(
                    file,
                    format!("exclude {exclude:?} is not contained in module {dir_path:?}"),
                ));
            }
            let relative = normalpath::rel(&dir_path, &exclude).map_err(|source| ConfigError::Path {
                file: file.to_string(),
                source,
            })?;
            excludes.push(relative);
        }
        excludes.sort();
        excludes.dedup();
        let lint_raw = module.lint.as_ref().or(raw.lint.as_ref());
        let breaking_raw = module.breaking.as_ref().or(raw.breaking.as_ref());
        module_configs.push(ModuleConfig {
            dir_path: dir_path.clone(),
            full_name: parse_name(module.name.as_deref())?,
            root_to_excludes: BTreeMap::from([(".".to_string(), excludes)]),
            lint: lint_config(file, version, lint_raw, Some(&dir_path))?,
            breaking: breaking_config(file, version, breaking_raw, Some(&dir_path))?,
        });
        dir_paths.push(dir_path);
    }
    check_unique(file, "module path", &dir_paths)?;
    let mut names = std::collections::HashSet::new();
    for config in &module_configs {
        if let Some(name) = &config.full_name {
            if !names.insert(name.clone()) {
                return Err(ConfigError::validation(
                    file,
                    format!("module name {name} is used by more than one module"),
                ));
            }
        }
    }
    Ok(ModuleConfigFile {
        file_version: version,
        module_configs,
        configured_dep_module_refs: parse_refs(&raw.deps)?,
        plugin_configs: raw.plugins.iter().map(plugin_config).collect(),
    })
}

fn plugin_config(raw: &RawPlugin) -> PluginConfig {
    let first = raw.plugin.split('/').next().unwrap_or_default();
    let plugin_type = if raw.plugin.ends_with(".wasm") {
        PluginConfigType::LocalWasm
    } else if first.contains('.')
        && first != "."
        && first != ".."
        && ModuleFullName::parse(&raw.plugin).is_ok()
    {
        PluginConfigType::Remote
    } else {
        PluginConfigType::Local
    };
    PluginConfig {
        plugin_type,
        name: raw.plugin.clone(),
        args: raw.args.clone(),
        options: raw.options.clone(),
    }
}

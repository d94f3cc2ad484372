//! Configuration files for Strata workspaces.
//!
//! This crate parses and validates the three files that drive workspace
//! resolution: the module config (`strata.toml`, versions `v1beta1`, `v1`
//! and `v2`), the workspace file (`strata.work.toml`), and the lock file
//! (`strata.lock`). All of them are TOML. Parsing produces immutable value
//! objects; defaults are explicit constructors rather than globals.

#![warn(missing_docs)]

pub mod error;
pub mod loader;
mod raw;
pub mod types;

pub use error::ConfigError;
pub use loader::{
    get_lock_file_for_prefix, get_module_config_file_for_prefix, get_work_file_for_prefix,
    load_lock_file_from_str, load_module_config_file_for_override,
    load_module_config_file_from_str, load_work_file_from_str, lock_file_to_string, ConfigOverride,
    CONFIG_FILE_NAME, LOCK_FILE_NAME, WORK_FILE_NAME,
};
pub use types::{
    BreakingConfig, CheckConfig, FileVersion, LintConfig, LockDep, LockFile, ModuleConfig,
    ModuleConfigFile, PluginConfig, PluginConfigType, WorkFile,
};

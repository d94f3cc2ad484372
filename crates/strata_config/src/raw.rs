//! On-disk TOML shapes, one per file version.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub(crate) struct VersionOnly {
    #[serde(default)]
    pub version: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct RawCheck {
    #[serde(rename = "use")]
    pub use_ids: Option<Vec<String>>,
    pub except: Vec<String>,
    pub ignore: Vec<String>,
    pub ignore_only: BTreeMap<String, Vec<String>>,
    pub disable_builtin: bool,
    pub allow_comment_ignores: bool,
    pub ignore_unstable_packages: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct RawBuildV1Beta1 {
    pub roots: Vec<String>,
    pub excludes: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawV1Beta1 {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub deps: Vec<String>,
    #[serde(default)]
    pub build: RawBuildV1Beta1,
    #[serde(default)]
    pub lint: Option<RawCheck>,
    #[serde(default)]
    pub breaking: Option<RawCheck>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct RawBuildV1 {
    pub excludes: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawV1 {
    #[allow(dead_code)]
    pub version: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub deps: Vec<String>,
    #[serde(default)]
    pub build: RawBuildV1,
    #[serde(default)]
    pub lint: Option<RawCheck>,
    #[serde(default)]
    pub breaking: Option<RawCheck>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawModuleV2 {
    pub path: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub excludes: Vec<String>,
    #[serde(default)]
    pub lint: Option<RawCheck>,
    #[serde(default)]
    pub breaking: Option<RawCheck>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawPlugin {
    pub plugin: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawV2 {
    #[allow(dead_code)]
    pub version: String,
    #[serde(default)]
    pub modules: Vec<RawModuleV2>,
    #[serde(default)]
    pub deps: Vec<String>,
    #[serde(default)]
    pub lint: Option<RawCheck>,
    #[serde(default)]
    pub breaking: Option<RawCheck>,
    #[serde(default)]
    pub plugins: Vec<RawPlugin>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawWork {
    #[allow(dead_code)]
    pub version: String,
    #[serde(default)]
    pub directories: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawLockDep {
    pub name: String,
    pub commit: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawLock {
    pub version: String,
    #[serde(default)]
    pub deps: Vec<RawLockDep>,
}

//! Locating the workspace a target directory belongs to.

use strata_common::{normalpath, Context};
use strata_config::{
    get_module_config_file_for_prefix, get_work_file_for_prefix, ConfigError, FileVersion,
    ModuleConfigFile, WorkFile,
};
use strata_storage::ReadBucket;
use tracing::{debug, info};

use crate::error::WorkspaceError;

/// How the modules of a workspace are declared.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WorkspaceLayout {
    /// A v2 `strata.toml` listing every module directory.
    V2(ModuleConfigFile),
    /// A `strata.work.toml` listing v1 module directories.
    Work(WorkFile),
    /// A single module directory with an optional v1 `strata.toml`.
    Single,
}

/// The result of discovery.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiscoveredWorkspace {
    /// The workspace root, relative to the bucket root.
    pub root: String,
    /// How the workspace declares its modules.
    pub layout: WorkspaceLayout,
}

/// Walks up from `target_sub_dir_path` to the closest directory holding a v2
/// `strata.toml` or a `strata.work.toml`.
///
/// Within one directory a v2 config takes precedence over a workspace file.
/// v1 config files do not define workspaces and are passed over. If nothing
/// is found the target directory is a single module.
pub fn discover_workspace(
    ctx: &Context,
    bucket: &dyn ReadBucket,
    target_sub_dir_path: &str,
) -> Result<DiscoveredWorkspace, WorkspaceError> {
    for dir in normalpath::ancestors(target_sub_dir_path) {
        ctx.check()?;
        if let Some(config) = optional(get_module_config_file_for_prefix(ctx, bucket, dir))? {
            if config.file_version == FileVersion::V2 {
                info!("using v2 workspace at {}", dir);
                return Ok(DiscoveredWorkspace {
                    root: dir.to_string(),
                    layout: WorkspaceLayout::V2(config),
                });
            }
            debug!("skipping {} config in {}", config.file_version, dir);
        }
        if let Some(work) = optional(get_work_file_for_prefix(ctx, bucket, dir))? {
            info!(
                "using workspace file at {} with {} directories",
                dir,
                work.dir_paths.len()
            );
            return Ok(DiscoveredWorkspace {
                root: dir.to_string(),
                layout: WorkspaceLayout::Work(work),
            });
        }
    }
    debug!("no workspace found, using {} as a single module", target_sub_dir_path);
    Ok(DiscoveredWorkspace {
        root: target_sub_dir_path.to_string(),
        layout: WorkspaceLayout::Single,
    })
}

/// Maps a missing file to `None`.
pub(crate) fn optional<T>(result: Result<T, ConfigError>) -> Result<Option<T>, ConfigError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) if err.is_not_exist() => Ok(None),
        Err(err) => Err(err),
    }
}

//! Error types for workspace resolution.

use strata_common::{Canceled, PathError, SystemError};
use strata_config::{ConfigError, FileVersion};
use strata_module::ModuleError;
use strata_storage::StorageError;

/// Errors from discovering and assembling a workspace.
#[derive(Clone, Debug, thiserror::Error)]
pub enum WorkspaceError {
    /// An internal invariant was violated, or the request matched nothing.
    #[error(transparent)]
    System(#[from] SystemError),

    /// The operation observed a canceled context.
    #[error(transparent)]
    Canceled(#[from] Canceled),

    /// A configuration file could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Building the module set failed.
    #[error(transparent)]
    Module(#[from] ModuleError),

    /// A bucket read failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A caller-supplied path was not a valid relative path.
    #[error("invalid path {path:?}: {source}")]
    Path {
        /// The rejected path.
        path: String,
        /// Why it was rejected.
        source: PathError,
    },

    /// A target path named a module directory.
    #[error("module \"{dir}\" was specified with --path - specify this module path directly as an input")]
    PathIsModuleDir {
        /// The module directory.
        dir: String,
    },

    /// An exclude path named a module directory.
    #[error("module \"{dir}\" was specified with --exclude-path - this flag cannot be used to specify module directories")]
    ExcludePathIsModuleDir {
        /// The module directory.
        dir: String,
    },

    /// A schema file target was requested together with target paths.
    #[error("cannot target schema file {path:?} and target paths at the same time")]
    SchemaFileTargetWithPaths {
        /// The schema file target.
        path: String,
    },

    /// Two config files declared the same dependency at different refs.
    #[error("found different refs for the same module within deps in the workspace: {refs}")]
    ConflictingDepRefs {
        /// The disagreeing refs, comma separated.
        refs: String,
    },

    /// A lock file's version does not fit the config that owns it.
    #[error("got a {lock_version} lock file for a {config_version} config")]
    LockVersionMismatch {
        /// The lock file's version.
        lock_version: FileVersion,
        /// The config file's version.
        config_version: FileVersion,
    },

    /// A directory listed in a workspace file holds a v2 config.
    #[error("module directory \"{dir}\" has a v2 config and cannot be listed in a workspace file")]
    V2ConfigInWorkFile {
        /// The module directory.
        dir: String,
    },
}

impl WorkspaceError {
    /// Returns `true` for system errors, including those raised while
    /// building the module set.
    pub fn is_system(&self) -> bool {
        match self {
            WorkspaceError::System(_) => true,
            WorkspaceError::Module(err) => err.is_system(),
            _ => false,
        }
    }

    /// Returns `true` if targets were requested but no target files remain.
    pub fn is_no_target_files(&self) -> bool {
        matches!(self, WorkspaceError::Module(ModuleError::NoTargetFiles))
    }

    pub(crate) fn system(message: impl Into<String>) -> Self {
        WorkspaceError::System(SystemError::new(message))
    }

    pub(crate) fn path(path: &str, source: PathError) -> Self {
        WorkspaceError::Path {
            path: path.to_string(),
            source,
        }
    }
}

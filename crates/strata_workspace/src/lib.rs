//! Workspace resolution for Strata.
//!
//! A workspace is found by walking up from a target directory to the closest
//! v2 `strata.toml` or `strata.work.toml`; without either, the target
//! directory is a single v1 module. Each module directory gets a
//! [`ModuleTargeting`] from the caller's include and exclude paths, lock file
//! dependencies are added as remote modules, and the result is a
//! [`Workspace`]: the module set plus per-module lint and breaking
//! configuration.

#![warn(missing_docs)]

mod bucket;
pub mod discovery;
pub mod error;
pub mod provider;
pub mod targeting;
pub mod workspace;

pub use discovery::{discover_workspace, DiscoveredWorkspace, WorkspaceLayout};
pub use error::WorkspaceError;
pub use provider::{WorkspaceBucketOptions, WorkspaceModuleKeyOptions, WorkspaceProvider};
pub use targeting::{ModuleTargeting, TargetingRequest};
pub use workspace::Workspace;

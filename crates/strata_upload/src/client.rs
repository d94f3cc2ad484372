//! The upload wire types and the client seam to a registry.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strata_cas::Digest;
use strata_common::{CommitId, Context, ModuleFullName, ModuleRef};
use strata_module::{MemoryRegistry, ModuleError, ModuleKey};
use tracing::debug;

use crate::error::UploadError;

/// One file of an uploaded module.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadFile {
    /// The module-relative path.
    pub path: String,
    /// The file's bytes.
    pub content: Vec<u8>,
}

/// A dependency of an uploaded module.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadDepRef {
    /// A module pushed in the same request, referenced by name.
    Local(ModuleFullName),
    /// A module already on the registry, pinned to a commit.
    Remote {
        /// The module's name.
        full_name: ModuleFullName,
        /// The pinned commit.
        commit_id: CommitId,
    },
}

impl UploadDepRef {
    /// The name of the referenced module.
    pub fn full_name(&self) -> &ModuleFullName {
        match self {
            UploadDepRef::Local(full_name) => full_name,
            UploadDepRef::Remote { full_name, .. } => full_name,
        }
    }
}

/// The content of one module in an upload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadContent {
    /// The module to create a commit for.
    pub module_ref: ModuleRef,
    /// Every file of the module, sorted by path.
    pub files: Vec<UploadFile>,
    /// Every dependency, direct or transitive, sorted and unique.
    pub dep_refs: Vec<UploadDepRef>,
    /// The raw `strata.toml` of a v1 module directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub v1_config_file: Option<UploadFile>,
    /// The raw `strata.lock` of a v1 module directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub v1_lock_file: Option<UploadFile>,
}

/// A batch of module contents sharing one set of labels.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadRequest {
    /// One entry per module.
    pub contents: Vec<UploadContent>,
    /// Labels to point at the new commits, sorted and unique.
    pub labels: Vec<String>,
}

/// A commit the registry created for one content.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedCommit {
    /// The module's name.
    pub full_name: ModuleFullName,
    /// The new commit.
    pub commit_id: CommitId,
    /// The digest the registry computed for the content.
    pub digest: Digest,
    /// When the registry created the commit.
    pub create_time: DateTime<Utc>,
}

/// Sends uploads to a registry.
pub trait UploadClient: Send + Sync {
    /// Uploads `request`, returning one commit per content in request order.
    fn upload(&self, ctx: &Context, request: &UploadRequest) -> Result<Vec<UploadedCommit>, UploadError>;
}

impl UploadClient for MemoryRegistry {
    /// Pushes every content, ordering pushes so that local dependencies are
    /// stored before the modules that need them.
    fn upload(&self, ctx: &Context, request: &UploadRequest) -> Result<Vec<UploadedCommit>, UploadError> {
        let mut pushed: HashMap<ModuleFullName, ModuleKey> = HashMap::new();
        let mut results: Vec<Option<UploadedCommit>> = vec![None; request.contents.len()];
        let mut remaining: Vec<usize> = (0..request.contents.len()).collect();
        while !remaining.is_empty() {
            ctx.check()?;
            let mut deferred = Vec::new();
            for index in remaining.iter().copied() {
                let content = &request.contents[index];
                let Some(deps) = dep_keys(self, &content.dep_refs, &pushed)? else {
                    deferred.push(index);
                    continue;
                };
                let full_name = content.module_ref.full_name();
                let files = content
                    .files
                    .iter()
                    .map(|file| (file.path.clone(), file.content.clone()))
                    .collect();
                let key = self.push(ctx, full_name, files, &deps, &request.labels)?;
                debug!("stored {}", key);
                let create_time = self.commit_create_time(key.commit_id()).ok_or_else(|| {
                    UploadError::system(format!("registry lost commit {key} after storing it"))
                })?;
                results[index] = Some(UploadedCommit {
                    full_name: full_name.clone(),
                    commit_id: key.commit_id().clone(),
                    digest: key.digest(ctx)?,
                    create_time,
                });
                pushed.insert(full_name.clone(), key);
            }
            if deferred.len() == remaining.len() {
                let names: Vec<String> = deferred
                    .iter()
                    .map(|index| request.contents[*index].module_ref.to_string())
                    .collect();
                return Err(ModuleError::Remote {
                    message: format!("unresolvable local dependencies among {}", names.join(", ")),
                }
                .into());
            }
            remaining = deferred;
        }
        Ok(results.into_iter().flatten().collect())
    }
}

/// Resolves dependency refs to keys; `None` while a local dependency has
/// not been pushed yet.
fn dep_keys(
    registry: &MemoryRegistry,
    dep_refs: &[UploadDepRef],
    pushed: &HashMap<ModuleFullName, ModuleKey>,
) -> Result<Option<Vec<ModuleKey>>, UploadError> {
    let mut keys = Vec::with_capacity(dep_refs.len());
    for dep_ref in dep_refs {
        match dep_ref {
            UploadDepRef::Local(full_name) => match pushed.get(full_name) {
                Some(key) => keys.push(key.clone()),
                None => return Ok(None),
            },
            UploadDepRef::Remote {
                full_name,
                commit_id,
            } => {
                let module_ref = ModuleRef::new(full_name.clone(), Some(commit_id.to_string()));
                keys.push(registry.resolve(&module_ref)?);
            }
        }
    }
    Ok(Some(keys))
}

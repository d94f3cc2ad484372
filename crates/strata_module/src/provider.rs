//! Seams to the remote registry.

use std::sync::Arc;

use strata_cas::Digest;
use strata_common::{CommitId, Context, ModuleFullName};

use crate::data::ModuleData;
use crate::error::ModuleError;
use crate::key::ModuleKey;

/// Fetches module content by key.
pub trait ModuleDataProvider: Send + Sync {
    /// Returns one [`ModuleData`] per key, in order.
    ///
    /// All or nothing: if any key cannot be resolved the whole call fails.
    fn get_module_datas_for_module_keys(
        &self,
        ctx: &Context,
        keys: &[ModuleKey],
    ) -> Result<Vec<ModuleData>, ModuleError>;
}

/// Looks up the digests of commits.
pub trait CommitProvider: Send + Sync {
    /// Returns the digest recorded for `commit_id` of `full_name`.
    fn get_commit_digest(
        &self,
        ctx: &Context,
        full_name: &ModuleFullName,
        commit_id: &CommitId,
    ) -> Result<Digest, ModuleError>;
}

/// Creates a key whose digest is fetched from `provider` on first use.
pub fn lazy_module_key(
    provider: Arc<dyn CommitProvider>,
    full_name: ModuleFullName,
    commit_id: CommitId,
) -> ModuleKey {
    let name = full_name.clone();
    let commit = commit_id.clone();
    ModuleKey::new_lazy(full_name, commit_id, move |ctx| {
        provider.get_commit_digest(ctx, &name, &commit)
    })
}

/// A provider for builds that have no remote modules.
#[derive(Clone, Copy, Debug, Default)]
pub struct NopModuleDataProvider;

impl ModuleDataProvider for NopModuleDataProvider {
    fn get_module_datas_for_module_keys(
        &self,
        _ctx: &Context,
        keys: &[ModuleKey],
    ) -> Result<Vec<ModuleData>, ModuleError> {
        match keys.first() {
            None => Ok(Vec::new()),
            Some(key) => Err(ModuleError::Remote {
                message: format!("no registry is configured to fetch {key}"),
            }),
        }
    }
}

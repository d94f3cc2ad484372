//! Module keys: a name, a commit, and a lazily resolved digest.

use std::fmt;
use std::sync::Arc;

use strata_cas::Digest;
use strata_common::{CommitId, Context, ModuleFullName};

use crate::error::ModuleError;
use crate::lazy::Lazy;

/// Identifies one commit of a remote module.
///
/// The digest may be supplied up front or resolved on first use; once
/// resolved it is cached for the lifetime of the key and all of its clones.
#[derive(Clone)]
pub struct ModuleKey {
    inner: Arc<KeyInner>,
}

struct KeyInner {
    full_name: ModuleFullName,
    commit_id: CommitId,
    digest: Lazy<Digest>,
}

impl ModuleKey {
    /// Creates a key whose digest is already known.
    pub fn new(full_name: ModuleFullName, commit_id: CommitId, digest: Digest) -> Self {
        Self {
            inner: Arc::new(KeyInner {
                full_name,
                commit_id,
                digest: Lazy::ready(digest),
            }),
        }
    }

    /// Creates a key whose digest is resolved by `resolve` the first time it
    /// is needed.
    pub fn new_lazy<F>(full_name: ModuleFullName, commit_id: CommitId, resolve: F) -> Self
    where
        F: FnOnce(&Context) -> Result<Digest, ModuleError> + Send + 'static,
    {
        Self {
            inner: Arc::new(KeyInner {
                full_name,
                commit_id,
                digest: Lazy::new(resolve),
            }),
        }
    }

    /// The module's name.
    pub fn full_name(&self) -> &ModuleFullName {
        &self.inner.full_name
    }

    /// The commit this key pins.
    pub fn commit_id(&self) -> &CommitId {
        &self.inner.commit_id
    }

    /// The expected digest of the commit's content.
    pub fn digest(&self, ctx: &Context) -> Result<Digest, ModuleError> {
        self.inner.digest.get(ctx)
    }
}

impl fmt::Display for ModuleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.inner.full_name, self.inner.commit_id)
    }
}

impl fmt::Debug for ModuleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ModuleKey").field(&self.to_string()).finish()
    }
}

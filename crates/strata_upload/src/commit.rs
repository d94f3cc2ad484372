//! Commits created by an upload.

use std::fmt;

use chrono::{DateTime, Utc};
use strata_cas::Digest;
use strata_common::Context;
use strata_module::{ModuleError, ModuleKey};

/// A commit on a registry, identified by a key whose digest is the one the
/// registry returned.
///
/// The key can be used to fetch the commit later, and any content fetched
/// by it is verified against that digest.
#[derive(Clone, Debug)]
pub struct Commit {
    module_key: ModuleKey,
    create_time: DateTime<Utc>,
}

impl Commit {
    /// Wraps `module_key`, created at `create_time`.
    pub fn new(module_key: ModuleKey, create_time: DateTime<Utc>) -> Self {
        Self {
            module_key,
            create_time,
        }
    }

    /// The key of the commit.
    pub fn module_key(&self) -> &ModuleKey {
        &self.module_key
    }

    /// When the registry created the commit.
    pub fn create_time(&self) -> DateTime<Utc> {
        self.create_time
    }

    /// The digest of the commit's content.
    pub fn digest(&self, ctx: &Context) -> Result<Digest, ModuleError> {
        self.module_key.digest(ctx)
    }
}

impl fmt::Display for Commit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.module_key, f)
    }
}

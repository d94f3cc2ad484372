//! An in-process registry for tests and offline flows.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use strata_cas::{b5_digest, manifest_for_bucket, CasDigest, Digest};
use strata_common::{CommitId, Context, ModuleFullName, ModuleRef};
use strata_storage::{MemBucket, ReadBucket};
use tracing::debug;

use crate::data::ModuleData;
use crate::error::ModuleError;
use crate::file::module_files_bucket;
use crate::key::ModuleKey;
use crate::provider::{CommitProvider, ModuleDataProvider};

struct StoredCommit {
    key: ModuleKey,
    files: BTreeMap<String, Vec<u8>>,
    deps: Vec<ModuleKey>,
    create_time: DateTime<Utc>,
}

#[derive(Default)]
struct RegistryState {
    commits: HashMap<CommitId, StoredCommit>,
    /// Commits of each module in push order.
    history: HashMap<ModuleFullName, Vec<CommitId>>,
    labels: HashMap<(ModuleFullName, String), CommitId>,
}

/// A registry for a single hostname, held in memory.
///
/// Commit IDs are derived from the module name and digest, so pushing the
/// same content twice yields the same commit.
pub struct MemoryRegistry {
    hostname: String,
    state: Mutex<RegistryState>,
    fetches: AtomicUsize,
}

impl MemoryRegistry {
    /// Creates an empty registry serving `hostname`.
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            state: Mutex::new(RegistryState::default()),
            fetches: AtomicUsize::new(0),
        }
    }

    /// The hostname this registry serves.
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// The number of module datas handed out so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::Relaxed)
    }

    fn state(&self) -> MutexGuard<'_, RegistryState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poison) => poison.into_inner(),
        }
    }

    /// Stores a commit of `full_name` and returns its key.
    ///
    /// `deps` must hold every module the pushed files depend on, directly or
    /// transitively. Only module files are kept. Every label is moved to
    /// the new commit.
    pub fn push(
        &self,
        ctx: &Context,
        full_name: &ModuleFullName,
        files: Vec<(String, Vec<u8>)>,
        deps: &[ModuleKey],
        labels: &[String],
    ) -> Result<ModuleKey, ModuleError> {
        ctx.check()?;
        if full_name.registry() != self.hostname {
            return Err(ModuleError::Remote {
                message: format!("registry {} cannot store module {full_name}", self.hostname),
            });
        }
        let bucket: Arc<dyn ReadBucket> = Arc::new(MemBucket::from_files(files)?);
        let module_files = module_files_bucket(ctx, bucket)?;
        let manifest = manifest_for_bucket(ctx, module_files.as_ref())?;
        let dep_digests = deps
            .iter()
            .map(|dep| dep.digest(ctx))
            .collect::<Result<Vec<_>, _>>()?;
        let digest = b5_digest(&manifest, &dep_digests)?;
        let commit_id = commit_id_for(full_name, &digest)?;

        let mut kept = BTreeMap::new();
        for node in manifest.file_nodes() {
            kept.insert(
                node.path().to_string(),
                strata_storage::read_all(module_files.as_ref(), ctx, node.path())?,
            );
        }

        let key = ModuleKey::new(full_name.clone(), commit_id.clone(), digest);
        let mut state = self.state();
        if !state.commits.contains_key(&commit_id) {
            debug!("registry {} stored {}", self.hostname, key);
            state.commits.insert(
                commit_id.clone(),
                StoredCommit {
                    key: key.clone(),
                    files: kept,
                    deps: deps.to_vec(),
                    create_time: Utc::now(),
                },
            );
            state
                .history
                .entry(full_name.clone())
                .or_default()
                .push(commit_id.clone());
        }
        for label in labels {
            state
                .labels
                .insert((full_name.clone(), label.clone()), commit_id.clone());
        }
        Ok(key)
    }

    /// Resolves a reference to the key of a stored commit.
    ///
    /// A reference without a ref resolves to the latest commit. A ref is
    /// tried as a commit ID first and then as a label.
    pub fn resolve(&self, module_ref: &ModuleRef) -> Result<ModuleKey, ModuleError> {
        let state = self.state();
        let full_name = module_ref.full_name();
        let not_found = || ModuleError::NotFound {
            key: module_ref.to_string(),
        };
        let commit_id = match module_ref.reference() {
            None => state
                .history
                .get(full_name)
                .and_then(|commits| commits.last())
                .cloned()
                .ok_or_else(not_found)?,
            Some(reference) => match CommitId::parse(reference) {
                Ok(commit_id) => commit_id,
                Err(_) => state
                    .labels
                    .get(&(full_name.clone(), reference.to_string()))
                    .cloned()
                    .ok_or_else(not_found)?,
            },
        };
        match state.commits.get(&commit_id) {
            Some(commit) if commit.key.full_name() == full_name => Ok(commit.key.clone()),
            _ => Err(not_found()),
        }
    }

    /// When the commit was first stored. Pushing the same content again
    /// keeps the original time.
    pub fn commit_create_time(&self, commit_id: &CommitId) -> Option<DateTime<Utc>> {
        self.state()
            .commits
            .get(commit_id)
            .map(|commit| commit.create_time)
    }

    /// Replaces a stored file, leaving the commit's digest unchanged.
    ///
    /// Simulates a compromised store.
    pub fn tamper(&self, commit_id: &CommitId, path: &str, content: impl Into<Vec<u8>>) {
        if let Some(commit) = self.state().commits.get_mut(commit_id) {
            commit.files.insert(path.to_string(), content.into());
        }
    }
}

/// Commit IDs are the first 32 hex characters of a hash of the name and
/// digest.
fn commit_id_for(full_name: &ModuleFullName, digest: &Digest) -> Result<CommitId, ModuleError> {
    let hash = CasDigest::from_bytes(format!("{full_name}:{digest}").as_bytes()).to_string();
    Ok(CommitId::parse(&hash[..32])?)
}

impl ModuleDataProvider for MemoryRegistry {
    fn get_module_datas_for_module_keys(
        &self,
        ctx: &Context,
        keys: &[ModuleKey],
    ) -> Result<Vec<ModuleData>, ModuleError> {
        ctx.check()?;
        let state = self.state();
        let mut datas = Vec::with_capacity(keys.len());
        for key in keys {
            let commit = state
                .commits
                .get(key.commit_id())
                .filter(|commit| commit.key.full_name() == key.full_name())
                .ok_or_else(|| ModuleError::NotFound { key: key.to_string() })?;
            let files: Vec<(String, Vec<u8>)> = commit
                .files
                .iter()
                .map(|(path, data)| (path.clone(), data.clone()))
                .collect();
            let deps = commit.deps.clone();
            datas.push(ModuleData::new(
                key.clone(),
                move |_| Ok(Arc::new(MemBucket::from_files(files)?) as Arc<dyn ReadBucket>),
                move |_| Ok(deps),
            ));
        }
        self.fetches.fetch_add(datas.len(), Ordering::Relaxed);
        Ok(datas)
    }
}

impl CommitProvider for MemoryRegistry {
    fn get_commit_digest(
        &self,
        ctx: &Context,
        full_name: &ModuleFullName,
        commit_id: &CommitId,
    ) -> Result<Digest, ModuleError> {
        ctx.check()?;
        let key = self
            .state()
            .commits
            .get(commit_id)
            .filter(|commit| commit.key.full_name() == full_name)
            .map(|commit| commit.key.clone())
            .ok_or_else(|| ModuleError::NotFound {
                key: format!("{full_name}:{commit_id}"),
            })?;
        key.digest(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(value: &str) -> ModuleFullName {
        ModuleFullName::parse(value).unwrap()
    }

    fn files(entries: &[(&str, &str)]) -> Vec<(String, Vec<u8>)> {
        entries
            .iter()
            .map(|(path, content)| (path.to_string(), content.as_bytes().to_vec()))
            .collect()
    }

    #[test]
    fn push_is_idempotent() {
        let ctx = Context::new();
        let registry = MemoryRegistry::new("r.com");
        let pets = name("r.com/acme/pets");
        let first = registry
            .push(&ctx, &pets, files(&[("pet.schema", "message Pet {}")]), &[], &[])
            .unwrap();
        let second = registry
            .push(&ctx, &pets, files(&[("pet.schema", "message Pet {}")]), &[], &[])
            .unwrap();
        assert_eq!(first.commit_id(), second.commit_id());
    }

    #[test]
    fn create_time_is_kept_across_repeated_pushes() {
        let ctx = Context::new();
        let registry = MemoryRegistry::new("r.com");
        let pets = name("r.com/acme/pets");
        let before = Utc::now();
        let key = registry
            .push(&ctx, &pets, files(&[("pet.schema", "message Pet {}")]), &[], &[])
            .unwrap();
        let created = registry.commit_create_time(key.commit_id()).unwrap();
        assert!(created >= before);
        registry
            .push(&ctx, &pets, files(&[("pet.schema", "message Pet {}")]), &[], &[])
            .unwrap();
        assert_eq!(registry.commit_create_time(key.commit_id()), Some(created));
        let unknown = CommitId::parse("0123456789abcdef0123456789abcdef").unwrap();
        assert_eq!(registry.commit_create_time(&unknown), None);
    }

    #[test]
    fn push_rejects_other_registries() {
        let ctx = Context::new();
        let registry = MemoryRegistry::new("r.com");
        let err = registry
            .push(&ctx, &name("other.com/acme/pets"), Vec::new(), &[], &[])
            .unwrap_err();
        assert!(matches!(err, ModuleError::Remote { .. }));
    }

    #[test]
    fn resolve_by_latest_commit_and_label() {
        let ctx = Context::new();
        let registry = MemoryRegistry::new("r.com");
        let pets = name("r.com/acme/pets");
        let v1 = registry
            .push(&ctx, &pets, files(&[("a.schema", "message A {}")]), &[], &["stable".to_string()])
            .unwrap();
        let v2 = registry
            .push(&ctx, &pets, files(&[("a.schema", "message B {}")]), &[], &[])
            .unwrap();

        let latest = registry.resolve(&ModuleRef::new(pets.clone(), None)).unwrap();
        assert_eq!(latest.commit_id(), v2.commit_id());
        let labeled = registry
            .resolve(&ModuleRef::new(pets.clone(), Some("stable".to_string())))
            .unwrap();
        assert_eq!(labeled.commit_id(), v1.commit_id());
        let by_commit = registry
            .resolve(&ModuleRef::new(pets.clone(), Some(v1.commit_id().to_string())))
            .unwrap();
        assert_eq!(by_commit.commit_id(), v1.commit_id());
        assert!(registry
            .resolve(&ModuleRef::new(pets, Some("missing".to_string())))
            .is_err());
    }

    #[test]
    fn fetched_data_verifies_and_counts() {
        let ctx = Context::new();
        let registry = MemoryRegistry::new("r.com");
        let key = registry
            .push(
                &ctx,
                &name("r.com/acme/pets"),
                files(&[("pet.schema", "message Pet {}"), ("notes.txt", "dropped")]),
                &[],
                &[],
            )
            .unwrap();
        let datas = registry
            .get_module_datas_for_module_keys(&ctx, &[key])
            .unwrap();
        assert_eq!(registry.fetch_count(), 1);
        let bucket = datas[0].bucket(&ctx).unwrap();
        assert!(bucket.stat(&ctx, "pet.schema").is_ok());
        assert!(bucket.stat(&ctx, "notes.txt").is_err());
    }

    #[test]
    fn tampered_commit_fails_verification() {
        let ctx = Context::new();
        let registry = MemoryRegistry::new("r.com");
        let key = registry
            .push(&ctx, &name("r.com/acme/pets"), files(&[("pet.schema", "message Pet {}")]), &[], &[])
            .unwrap();
        registry.tamper(key.commit_id(), "pet.schema", "message Cat {}");
        let datas = registry
            .get_module_datas_for_module_keys(&ctx, &[key])
            .unwrap();
        let err = datas[0].bucket(&ctx).unwrap_err();
        assert!(matches!(err, ModuleError::VerificationFailed { .. }));
    }

    #[test]
    fn unknown_commits_fail_the_whole_batch() {
        let ctx = Context::new();
        let registry = MemoryRegistry::new("r.com");
        let pets = name("r.com/acme/pets");
        let key = registry
            .push(&ctx, &pets, files(&[("pet.schema", "message Pet {}")]), &[], &[])
            .unwrap();
        let missing = ModuleKey::new(
            pets,
            CommitId::parse("0123456789abcdef0123456789abcdef").unwrap(),
            key.digest(&ctx).unwrap(),
        );
        let err = registry
            .get_module_datas_for_module_keys(&ctx, &[key, missing])
            .unwrap_err();
        assert!(matches!(err, ModuleError::NotFound { .. }));
        assert_eq!(registry.fetch_count(), 0);
    }
}

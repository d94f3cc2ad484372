//! A bucket-backed cache of fetched module data.
//!
//! Each entry lives in its own directory keyed by digest type, module name
//! and commit:
//!
//! ```text
//! b5/r.com/acme/pets/<commit>/module.toml
//! b5/r.com/acme/pets/<commit>/files/<module paths...>
//! ```
//!
//! `module.toml` records the digest and the declared dependencies and is
//! written last, so an entry whose files were only partly written is a miss.
//! Reads are fail-safe: a missing, unreadable, or mismatched entry is a
//! cache miss rather than an error. Data served from the store is verified
//! against its key on first use like any other [`ModuleData`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use strata_cas::{digest_equal, Digest};
use strata_common::{normalpath, CommitId, Context, ModuleFullName};
use strata_storage::{read_all, walk_infos, MappedBucket, Mapper, ReadBucket, WriteBucket};
use tracing::{debug, info, warn};

use crate::data::ModuleData;
use crate::error::ModuleError;
use crate::key::ModuleKey;
use crate::provider::ModuleDataProvider;

/// Name of the per-entry metadata file.
const ENTRY_FILE_NAME: &str = "module.toml";

/// Directory holding an entry's module files.
const FILES_DIR: &str = "files";

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct StoredEntry {
    digest: String,
    #[serde(default)]
    deps: Vec<StoredDep>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct StoredDep {
    name: String,
    commit: String,
    digest: String,
}

/// Stores and retrieves [`ModuleData`] by [`ModuleKey`].
pub struct ModuleDataStore<B> {
    bucket: Arc<B>,
}

impl<B> Clone for ModuleDataStore<B> {
    fn clone(&self) -> Self {
        Self {
            bucket: Arc::clone(&self.bucket),
        }
    }
}

impl<B: WriteBucket + 'static> ModuleDataStore<B> {
    /// Creates a store over `bucket`.
    pub fn new(bucket: Arc<B>) -> Self {
        Self { bucket }
    }

    /// Looks up every key, returning the data found and the keys that were
    /// not, each in request order.
    pub fn get_module_datas_for_module_keys(
        &self,
        ctx: &Context,
        keys: &[ModuleKey],
    ) -> Result<(Vec<ModuleData>, Vec<ModuleKey>), ModuleError> {
        let mut found = Vec::new();
        let mut not_found = Vec::new();
        for key in keys {
            ctx.check()?;
            match self.get(ctx, key)? {
                Some(data) => found.push(data),
                None => not_found.push(key.clone()),
            }
        }
        debug!(
            "module data store: {} found, {} not found",
            found.len(),
            not_found.len()
        );
        Ok((found, not_found))
    }

    /// Writes every data's verified files and declared dependencies.
    ///
    /// Fails if any data does not match the digest of its key; nothing is
    /// recorded for that data.
    pub fn put_module_datas(&self, ctx: &Context, datas: &[ModuleData]) -> Result<(), ModuleError> {
        for data in datas {
            ctx.check()?;
            self.put(ctx, data)?;
        }
        Ok(())
    }

    fn get(&self, ctx: &Context, key: &ModuleKey) -> Result<Option<ModuleData>, ModuleError> {
        let digest = key.digest(ctx)?;
        let dir = entry_dir(key.full_name(), key.commit_id(), &digest);
        let entry_path = normalpath::join(&dir, ENTRY_FILE_NAME);
        let bytes = match read_all(self.bucket.as_ref(), ctx, &entry_path) {
            Ok(bytes) => bytes,
            Err(err) if err.is_not_exist() => return Ok(None),
            Err(err) => {
                warn!("ignoring unreadable store entry {}: {}", entry_path, err);
                return Ok(None);
            }
        };
        let deps = match parse_entry(&bytes, &digest) {
            Ok(deps) => deps,
            Err(message) => {
                warn!("ignoring store entry {}: {}", entry_path, message);
                return Ok(None);
            }
        };
        let files: Arc<dyn ReadBucket> = Arc::new(MappedBucket::new(
            Arc::clone(&self.bucket) as Arc<dyn ReadBucket>,
            vec![Mapper::Prefix(normalpath::join(&dir, FILES_DIR))],
        ));
        Ok(Some(ModuleData::new(
            key.clone(),
            move |_| Ok(files),
            move |_| Ok(deps),
        )))
    }

    fn put(&self, ctx: &Context, data: &ModuleData) -> Result<(), ModuleError> {
        let key = data.module_key();
        let files = data.bucket(ctx)?;
        let deps = data.declared_dep_module_keys(ctx)?;
        let digest = key.digest(ctx)?;
        let dir = entry_dir(key.full_name(), key.commit_id(), &digest);
        let files_dir = normalpath::join(&dir, FILES_DIR);
        for info in walk_infos(files.as_ref(), ctx, ".")? {
            let content = read_all(files.as_ref(), ctx, &info.path)?;
            self.bucket
                .put(ctx, &normalpath::join(&files_dir, &info.path), content)?;
        }
        let mut stored_deps = Vec::with_capacity(deps.len());
        for dep in &deps {
            stored_deps.push(StoredDep {
                name: dep.full_name().to_string(),
                commit: dep.commit_id().to_string(),
                digest: dep.digest(ctx)?.to_string(),
            });
        }
        let entry = StoredEntry {
            digest: digest.to_string(),
            deps: stored_deps,
        };
        let content = toml::to_string(&entry)
            .map_err(|err| ModuleError::system(format!("cannot encode store entry for {key}: {err}")))?;
        self.bucket
            .put(ctx, &normalpath::join(&dir, ENTRY_FILE_NAME), content.into_bytes())?;
        debug!("stored {} in module data store", key);
        Ok(())
    }
}

fn entry_dir(full_name: &ModuleFullName, commit_id: &CommitId, digest: &Digest) -> String {
    format!(
        "{}/{}/{}/{}/{}",
        digest.digest_type(),
        full_name.registry(),
        full_name.owner(),
        full_name.name(),
        commit_id
    )
}

/// Decodes an entry, checking it against the digest it was looked up by.
fn parse_entry(bytes: &[u8], expected: &Digest) -> Result<Vec<ModuleKey>, String> {
    let text = std::str::from_utf8(bytes).map_err(|err| err.to_string())?;
    let entry: StoredEntry = toml::from_str(text).map_err(|err| err.to_string())?;
    let digest = Digest::parse(&entry.digest).map_err(|err| err.to_string())?;
    if !digest_equal(&digest, expected) {
        return Err(format!("recorded digest {digest} does not match {expected}"));
    }
    entry
        .deps
        .into_iter()
        .map(|dep| {
            Ok(ModuleKey::new(
                ModuleFullName::parse(&dep.name).map_err(|err| err.to_string())?,
                CommitId::parse(&dep.commit).map_err(|err| err.to_string())?,
                Digest::parse(&dep.digest).map_err(|err| err.to_string())?,
            ))
        })
        .collect()
}

/// A [`ModuleDataProvider`] that serves from a [`ModuleDataStore`] and
/// fills it from a delegate on a miss.
pub struct CachedModuleDataProvider<B> {
    delegate: Arc<dyn ModuleDataProvider>,
    store: ModuleDataStore<B>,
}

impl<B: WriteBucket + 'static> CachedModuleDataProvider<B> {
    /// Wraps `delegate` with `store`.
    pub fn new(delegate: Arc<dyn ModuleDataProvider>, store: ModuleDataStore<B>) -> Self {
        Self { delegate, store }
    }
}

impl<B: WriteBucket + 'static> ModuleDataProvider for CachedModuleDataProvider<B> {
    fn get_module_datas_for_module_keys(
        &self,
        ctx: &Context,
        keys: &[ModuleKey],
    ) -> Result<Vec<ModuleData>, ModuleError> {
        let (found, not_found) = self.store.get_module_datas_for_module_keys(ctx, keys)?;
        let mut fetched = Vec::new();
        if !not_found.is_empty() {
            info!("fetching {} modules missing from the store", not_found.len());
            fetched = self
                .delegate
                .get_module_datas_for_module_keys(ctx, &not_found)?;
            self.store.put_module_datas(ctx, &fetched)?;
        }
        let mut found = found.into_iter().peekable();
        let mut fetched = fetched.into_iter().peekable();
        let mut datas = Vec::with_capacity(keys.len());
        for key in keys {
            let next = if found
                .peek()
                .is_some_and(|data| data.module_key().commit_id() == key.commit_id())
            {
                found.next()
            } else {
                fetched.next()
            };
            let data = next.ok_or_else(|| {
                ModuleError::system(format!("no module data was produced for {key}"))
            })?;
            datas.push(data);
        }
        Ok(datas)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::MemoryRegistry;
    use strata_storage::MemBucket;

    fn name(value: &str) -> ModuleFullName {
        ModuleFullName::parse(value).unwrap()
    }

    fn push(registry: &MemoryRegistry, full_name: &str, path: &str, content: &str, deps: &[ModuleKey]) -> ModuleKey {
        registry
            .push(
                &Context::new(),
                &name(full_name),
                vec![(path.to_string(), content.as_bytes().to_vec())],
                deps,
                &[],
            )
            .unwrap()
    }

    fn names(keys: impl IntoIterator<Item = ModuleFullName>) -> Vec<String> {
        keys.into_iter().map(|name| name.to_string()).collect()
    }

    /// Three modules, with `mod2` importing `mod1`, keyed in the order
    /// mod1, mod3, mod2.
    fn fixture() -> (Arc<MemoryRegistry>, Vec<ModuleKey>) {
        let registry = Arc::new(MemoryRegistry::new("r.com"));
        let mod1 = push(&registry, "r.com/foo/mod1", "mod1.schema", "package mod1;", &[]);
        let mod2 = push(
            &registry,
            "r.com/foo/mod2",
            "mod2.schema",
            "package mod2; import \"mod1.schema\";",
            &[mod1.clone()],
        );
        let mod3 = push(&registry, "r.com/foo/mod3", "mod3.schema", "package mod3;", &[]);
        (registry, vec![mod1, mod3, mod2])
    }

    #[test]
    fn get_reports_misses_then_hits_after_put() {
        let ctx = Context::new();
        let (registry, keys) = fixture();
        let store = ModuleDataStore::new(Arc::new(MemBucket::new()));

        let (found, not_found) = store.get_module_datas_for_module_keys(&ctx, &keys).unwrap();
        assert!(found.is_empty());
        assert_eq!(
            names(not_found.iter().map(|key| key.full_name().clone())),
            vec!["r.com/foo/mod1", "r.com/foo/mod3", "r.com/foo/mod2"]
        );

        let datas = registry.get_module_datas_for_module_keys(&ctx, &keys).unwrap();
        store.put_module_datas(&ctx, &datas).unwrap();

        let (found, not_found) = store.get_module_datas_for_module_keys(&ctx, &keys).unwrap();
        assert!(not_found.is_empty());
        assert_eq!(
            names(found.iter().map(|data| data.module_key().full_name().clone())),
            vec!["r.com/foo/mod1", "r.com/foo/mod3", "r.com/foo/mod2"]
        );
        let mod2 = &found[2];
        let deps = mod2.declared_dep_module_keys(&ctx).unwrap();
        assert_eq!(names(deps.iter().map(|key| key.full_name().clone())), vec!["r.com/foo/mod1"]);
        let bucket = mod2.bucket(&ctx).unwrap();
        assert_eq!(
            read_all(bucket.as_ref(), &ctx, "mod2.schema").unwrap(),
            b"package mod2; import \"mod1.schema\";"
        );
    }

    #[test]
    fn tampered_entry_fails_verification_on_read() {
        let ctx = Context::new();
        let (registry, keys) = fixture();
        let bucket = Arc::new(MemBucket::new());
        let store = ModuleDataStore::new(Arc::clone(&bucket));
        let datas = registry.get_module_datas_for_module_keys(&ctx, &keys[..1]).unwrap();
        store.put_module_datas(&ctx, &datas).unwrap();

        let digest = keys[0].digest(&ctx).unwrap();
        let dir = entry_dir(keys[0].full_name(), keys[0].commit_id(), &digest);
        bucket
            .put(&ctx, &format!("{dir}/files/mod1.schema"), b"package evil;".to_vec())
            .unwrap();

        let (found, _) = store.get_module_datas_for_module_keys(&ctx, &keys[..1]).unwrap();
        assert!(matches!(
            found[0].bucket(&ctx),
            Err(ModuleError::VerificationFailed { .. })
        ));
    }

    #[test]
    fn corrupt_entry_is_a_miss() {
        let ctx = Context::new();
        let (_, keys) = fixture();
        let bucket = Arc::new(MemBucket::new());
        let digest = keys[0].digest(&ctx).unwrap();
        let dir = entry_dir(keys[0].full_name(), keys[0].commit_id(), &digest);
        bucket
            .put(&ctx, &format!("{dir}/module.toml"), b"digest = \"not a digest\"".to_vec())
            .unwrap();
        let store = ModuleDataStore::new(bucket);
        let (found, not_found) = store.get_module_datas_for_module_keys(&ctx, &keys[..1]).unwrap();
        assert!(found.is_empty());
        assert_eq!(not_found.len(), 1);
    }

    #[test]
    fn tampered_delegate_data_is_not_stored() {
        let ctx = Context::new();
        let (registry, keys) = fixture();
        registry.tamper(keys[1].commit_id(), "mod3.schema", "package evil;");
        let bucket = Arc::new(MemBucket::new());
        let store = ModuleDataStore::new(Arc::clone(&bucket));
        let datas = registry.get_module_datas_for_module_keys(&ctx, &keys[1..2]).unwrap();
        assert!(matches!(
            store.put_module_datas(&ctx, &datas),
            Err(ModuleError::VerificationFailed { .. })
        ));
        assert!(bucket.is_empty());
    }

    #[test]
    fn cached_provider_fetches_each_key_once() {
        let ctx = Context::new();
        let (registry, keys) = fixture();
        let store = ModuleDataStore::new(Arc::new(MemBucket::new()));
        let provider = CachedModuleDataProvider::new(registry.clone(), store);

        let first = provider.get_module_datas_for_module_keys(&ctx, &keys[..2]).unwrap();
        assert_eq!(registry.fetch_count(), 2);
        let second = provider.get_module_datas_for_module_keys(&ctx, &keys).unwrap();
        assert_eq!(registry.fetch_count(), 3);
        assert_eq!(first.len(), 2);
        assert_eq!(
            names(second.iter().map(|data| data.module_key().full_name().clone())),
            vec!["r.com/foo/mod1", "r.com/foo/mod3", "r.com/foo/mod2"]
        );
        for data in &second {
            assert!(data.bucket(&ctx).is_ok());
        }
    }
}

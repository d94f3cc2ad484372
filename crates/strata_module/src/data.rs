//! Raw module content fetched for a [`ModuleKey`], verified before use.

use std::fmt;
use std::sync::Arc;

use strata_cas::{b5_digest, digest_equal, manifest_for_bucket};
use strata_common::{Context, Memo};
use strata_storage::ReadBucket;

use crate::error::ModuleError;
use crate::file::module_files_bucket;
use crate::key::ModuleKey;
use crate::lazy::Lazy;

/// The content of one remote module commit.
///
/// Both accessors first run a tamper check: the B5 digest of the returned
/// files and declared dependencies is recomputed and compared with the
/// digest of the [`ModuleKey`] the data was requested by. The check runs
/// once; a failure is permanent and every later call returns the same error.
#[derive(Clone)]
pub struct ModuleData {
    inner: Arc<DataInner>,
}

struct DataInner {
    key: ModuleKey,
    bucket: Lazy<Arc<dyn ReadBucket>>,
    declared_deps: Lazy<Vec<ModuleKey>>,
    check: Memo<(), ModuleError>,
}

impl ModuleData {
    /// Creates module data whose bucket and dependencies are produced on
    /// demand.
    ///
    /// The bucket is restricted to module files before it is digested.
    pub fn new<B, D>(key: ModuleKey, get_bucket: B, get_declared_deps: D) -> Self
    where
        B: FnOnce(&Context) -> Result<Arc<dyn ReadBucket>, ModuleError> + Send + 'static,
        D: FnOnce(&Context) -> Result<Vec<ModuleKey>, ModuleError> + Send + 'static,
    {
        Self {
            inner: Arc::new(DataInner {
                key,
                bucket: Lazy::new(move |ctx| module_files_bucket(ctx, get_bucket(ctx)?)),
                declared_deps: Lazy::new(get_declared_deps),
                check: Memo::new(),
            }),
        }
    }

    /// The key this data was fetched for.
    pub fn module_key(&self) -> &ModuleKey {
        &self.inner.key
    }

    /// The module's files, after verification.
    pub fn bucket(&self, ctx: &Context) -> Result<Arc<dyn ReadBucket>, ModuleError> {
        self.check_digest(ctx)?;
        self.inner.bucket.get(ctx)
    }

    /// The dependencies recorded with this commit, after verification.
    pub fn declared_dep_module_keys(&self, ctx: &Context) -> Result<Vec<ModuleKey>, ModuleError> {
        self.check_digest(ctx)?;
        self.inner.declared_deps.get(ctx)
    }

    fn check_digest(&self, ctx: &Context) -> Result<(), ModuleError> {
        self.inner.check.get_or_try_init(|| {
            let inner = &self.inner;
            let bucket = inner.bucket.get(ctx)?;
            let deps = inner.declared_deps.get(ctx)?;
            let expected = inner.key.digest(ctx)?;
            let manifest = manifest_for_bucket(ctx, bucket.as_ref())?;
            let dep_digests = deps
                .iter()
                .map(|dep| dep.digest(ctx))
                .collect::<Result<Vec<_>, _>>()?;
            let actual = b5_digest(&manifest, &dep_digests)?;
            if !digest_equal(&expected, &actual) {
                return Err(ModuleError::VerificationFailed {
                    key: inner.key.to_string(),
                    expected,
                    actual,
                });
            }
            Ok(())
        })
    }
}

impl fmt::Debug for ModuleData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleData")
            .field("key", &self.inner.key)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_cas::{Digest, DigestType};
    use strata_common::{CommitId, ModuleFullName};
    use strata_storage::MemBucket;

    fn files() -> Vec<(&'static str, &'static str)> {
        vec![("pets.schema", "message Pet {}"), ("LICENSE", "mit")]
    }

    fn digest_of(files: &[(&str, &str)]) -> Digest {
        let ctx = Context::new();
        let bucket = MemBucket::from_files(files.iter().copied()).unwrap();
        let manifest = manifest_for_bucket(&ctx, &bucket).unwrap();
        b5_digest(&manifest, &[]).unwrap()
    }

    fn key(digest: Digest) -> ModuleKey {
        ModuleKey::new(
            ModuleFullName::parse("r.com/acme/pets").unwrap(),
            CommitId::parse("0123456789abcdef0123456789abcdef").unwrap(),
            digest,
        )
    }

    fn data(key: ModuleKey, files: Vec<(&'static str, &'static str)>) -> ModuleData {
        ModuleData::new(
            key,
            move |_| Ok(Arc::new(MemBucket::from_files(files)?) as Arc<dyn ReadBucket>),
            |_| Ok(Vec::new()),
        )
    }

    #[test]
    fn matching_digest_passes() {
        let ctx = Context::new();
        let data = data(key(digest_of(&files())), files());
        assert!(data.bucket(&ctx).is_ok());
        assert!(data.declared_dep_module_keys(&ctx).unwrap().is_empty());
    }

    #[test]
    fn non_module_files_are_not_digested() {
        let ctx = Context::new();
        let mut with_extra = files();
        with_extra.push(("notes.txt", "not part of the module"));
        let data = data(key(digest_of(&files())), with_extra);
        assert!(data.bucket(&ctx).is_ok());
    }

    #[test]
    fn tampered_content_fails_permanently() {
        let ctx = Context::new();
        let tampered = vec![("pets.schema", "message Cat {}"), ("LICENSE", "mit")];
        let data = data(key(digest_of(&files())), tampered);
        let first = data.bucket(&ctx).unwrap_err();
        assert!(matches!(first, ModuleError::VerificationFailed { .. }));
        let second = data.declared_dep_module_keys(&ctx).unwrap_err();
        assert_eq!(first.to_string(), second.to_string());
        assert_eq!(first.to_string(), data.bucket(&ctx).unwrap_err().to_string());
    }

    #[test]
    fn tampered_deps_fail_verification() {
        let ctx = Context::new();
        let dep = key(Digest::new(DigestType::B5, strata_cas::CasDigest::from_bytes(b"dep")));
        let files = files();
        let data = ModuleData::new(
            key(digest_of(&files)),
            move |_| Ok(Arc::new(MemBucket::from_files(files)?) as Arc<dyn ReadBucket>),
            move |_| Ok(vec![dep]),
        );
        assert!(matches!(
            data.declared_dep_module_keys(&ctx),
            Err(ModuleError::VerificationFailed { .. })
        ));
    }

    #[test]
    fn digest_type_mismatch_fails_verification() {
        let ctx = Context::new();
        let b5 = digest_of(&files());
        let b4 = Digest::new(DigestType::B4, *b5.value());
        let data = data(key(b4), files());
        assert!(data.bucket(&ctx).is_err());
    }
}

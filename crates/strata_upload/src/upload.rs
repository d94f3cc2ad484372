//! The upload pipeline.

use std::collections::{BTreeSet, HashSet};
use std::io::Read;

use strata_cas::digest_equal;
use strata_common::{Context, ModuleFullName, ModuleRef};
use strata_module::{
    get_file_infos, Module, ModuleError, ModuleKey, ModuleReadBucket, ObjectData,
};
use strata_storage::StorageError;
use tracing::info;

use crate::client::{UploadClient, UploadContent, UploadDepRef, UploadFile, UploadRequest};
use crate::commit::Commit;
use crate::error::UploadError;

/// Options for [`upload`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UploadOptions {
    /// Labels to point at the new commits.
    pub labels: Vec<String>,
    /// Recomputes each module's digest locally and rejects a commit whose
    /// returned digest differs. Off by default: the registry's digest is
    /// trusted.
    pub verify_digests: bool,
}

/// Pushes `modules` in one request and returns their commits in order.
///
/// Every module must be local and named, and all names must share one
/// registry; these checks run before anything is sent. Local dependencies
/// are referenced by name and must be among `modules`; remote dependencies
/// are pinned to the commit they were fetched at.
pub fn upload(
    ctx: &Context,
    client: &dyn UploadClient,
    modules: &[Module],
    options: &UploadOptions,
) -> Result<Vec<Commit>, UploadError> {
    ctx.check()?;
    if modules.is_empty() {
        return Ok(Vec::new());
    }
    let names = validate(modules)?;
    let uploaded: HashSet<&ModuleFullName> = names.iter().collect();

    let mut contents = Vec::with_capacity(modules.len());
    for (module, full_name) in modules.iter().zip(&names) {
        ctx.check()?;
        contents.push(UploadContent {
            module_ref: ModuleRef::new(full_name.clone(), None),
            files: files(ctx, module)?,
            dep_refs: dep_refs(ctx, module, &uploaded)?,
            v1_config_file: module.v1_config_object_data().map(object_file),
            v1_lock_file: module.v1_lock_object_data().map(object_file),
        });
    }
    let labels: Vec<String> = options
        .labels
        .iter()
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let request = UploadRequest { contents, labels };

    info!(
        "uploading {} modules to {} with {} labels",
        request.contents.len(),
        names[0].registry(),
        request.labels.len()
    );
    let commits = client.upload(ctx, &request)?;
    if commits.len() != request.contents.len() {
        return Err(UploadError::CommitCountMismatch {
            expected: request.contents.len(),
            actual: commits.len(),
        });
    }

    let mut result = Vec::with_capacity(commits.len());
    for ((module, full_name), commit) in modules.iter().zip(&names).zip(commits) {
        if &commit.full_name != full_name {
            return Err(UploadError::system(format!(
                "registry returned a commit for {} in place of {}",
                commit.full_name, full_name
            )));
        }
        if options.verify_digests {
            let expected = module.digest(ctx)?;
            if !digest_equal(&expected, &commit.digest) {
                return Err(UploadError::DigestMismatch {
                    full_name: full_name.clone(),
                    expected,
                    actual: commit.digest,
                });
            }
        }
        result.push(Commit::new(
            ModuleKey::new(commit.full_name, commit.commit_id, commit.digest),
            commit.create_time,
        ));
    }
    info!("uploaded {} commits", result.len());
    Ok(result)
}

/// Checks that every module is local and named on a single registry, and
/// returns the names.
fn validate(modules: &[Module]) -> Result<Vec<ModuleFullName>, UploadError> {
    let mut names = Vec::with_capacity(modules.len());
    for module in modules {
        if !module.is_local() {
            return Err(UploadError::NotLocal {
                id: module.opaque_id(),
            });
        }
        let full_name = module.full_name().ok_or_else(|| UploadError::NoName {
            id: module.opaque_id(),
        })?;
        names.push(full_name.clone());
    }
    let registries: BTreeSet<&str> = names.iter().map(ModuleFullName::registry).collect();
    if registries.len() > 1 {
        return Err(UploadError::MultipleRegistries {
            list: registries.into_iter().collect::<Vec<_>>().join(", "),
        });
    }
    Ok(names)
}

fn files(ctx: &Context, module: &Module) -> Result<Vec<UploadFile>, UploadError> {
    let mut files = Vec::new();
    for info in get_file_infos(module, ctx)? {
        let mut file = module.get_file(ctx, info.path())?;
        let mut content = Vec::new();
        file.read_to_end(&mut content).map_err(|err| {
            ModuleError::Storage(StorageError::io(info.path(), err))
        })?;
        files.push(UploadFile {
            path: info.path().to_string(),
            content,
        });
    }
    Ok(files)
}

fn object_file(data: &ObjectData) -> UploadFile {
    UploadFile {
        path: data.name().to_string(),
        content: data.data().to_vec(),
    }
}

fn dep_refs(
    ctx: &Context,
    module: &Module,
    uploaded: &HashSet<&ModuleFullName>,
) -> Result<Vec<UploadDepRef>, UploadError> {
    let mut refs = BTreeSet::new();
    for dep in module.module_deps(ctx)? {
        let dep = dep.module();
        if dep.is_local() {
            let full_name = dep.full_name().ok_or_else(|| UploadError::NoName {
                id: dep.opaque_id(),
            })?;
            if !uploaded.contains(full_name) {
                return Err(UploadError::LocalDepNotUploaded {
                    module: module.opaque_id(),
                    dep: full_name.to_string(),
                });
            }
            refs.insert(UploadDepRef::Local(full_name.clone()));
        } else {
            let key = dep.module_key().ok_or_else(|| {
                UploadError::system(format!("remote module {} has no key", dep.opaque_id()))
            })?;
            refs.insert(UploadDepRef::Remote {
                full_name: key.full_name().clone(),
                commit_id: key.commit_id().clone(),
            });
        }
    }
    Ok(refs.into_iter().collect())
}

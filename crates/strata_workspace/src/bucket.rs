//! Views of a workspace bucket for one module directory.

use std::collections::BTreeMap;
use std::sync::Arc;

use strata_common::normalpath;
use strata_module::{DOC_FILE_PATHS, LICENSE_FILE_PATH, SCHEMA_FILE_EXT};
use strata_storage::{MappedBucket, Mapper, Matcher, MultiBucket, ReadBucket};

/// Re-roots `bucket` at `prefix`. `"."` returns the bucket unchanged.
pub(crate) fn sub_bucket(bucket: Arc<dyn ReadBucket>, prefix: &str) -> Arc<dyn ReadBucket> {
    if prefix == "." {
        return bucket;
    }
    Arc::new(MappedBucket::new(bucket, vec![Mapper::Prefix(prefix.to_string())]))
}

/// The files of the module at `dir_path`: the schema files of every root
/// re-rooted into the module namespace, minus its root-relative excludes,
/// plus the documentation and license files of the module directory.
///
/// Roots only apply to schema files. When two roots hold the same relative
/// path the earlier root wins. Files under `nested_dir_paths`, the
/// workspace-relative dirs of modules nested inside this one, belong to
/// those modules and are left out.
pub(crate) fn module_dir_bucket(
    workspace_bucket: &Arc<dyn ReadBucket>,
    dir_path: &str,
    root_to_excludes: &BTreeMap<String, Vec<String>>,
    nested_dir_paths: &[String],
) -> Arc<dyn ReadBucket> {
    let mut buckets: Vec<Arc<dyn ReadBucket>> = Vec::with_capacity(root_to_excludes.len() + 2);
    for (root, excludes) in root_to_excludes {
        let mut mappers = Vec::with_capacity(4);
        if !nested_dir_paths.is_empty() {
            let nested = nested_dir_paths
                .iter()
                .map(|nested| Matcher::EqualOrContained(nested.clone()))
                .collect();
            mappers.push(Mapper::Match(Matcher::not(Matcher::Or(nested))));
        }
        mappers.push(Mapper::Prefix(normalpath::join(dir_path, root)));
        mappers.push(Mapper::Match(Matcher::ext(SCHEMA_FILE_EXT)));
        if !excludes.is_empty() {
            let excluded = excludes
                .iter()
                .map(|exclude| Matcher::EqualOrContained(exclude.clone()))
                .collect();
            mappers.push(Mapper::Match(Matcher::not(Matcher::Or(excluded))));
        }
        buckets.push(Arc::new(MappedBucket::new(Arc::clone(workspace_bucket), mappers)));
    }
    let doc_files = DOC_FILE_PATHS.iter().map(|path| Matcher::equal(*path)).collect();
    for matcher in [Matcher::Or(doc_files), Matcher::equal(LICENSE_FILE_PATH)] {
        buckets.push(Arc::new(MappedBucket::new(
            Arc::clone(workspace_bucket),
            vec![Mapper::Prefix(dir_path.to_string()), Mapper::Match(matcher)],
        )));
    }
    Arc::new(MultiBucket::new(buckets))
}

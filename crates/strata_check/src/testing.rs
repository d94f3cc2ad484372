//! Image fixtures for unit tests.

use std::sync::Arc;

use strata_common::Context;
use strata_image::{build_image, BuildImageOptions, Image};
use strata_module::{LocalModuleOptions, ModuleSetBuilder, NopModuleDataProvider};
use strata_storage::{MemBucket, ReadBucket};

/// Compiles `files` as the single target module of a workspace.
pub(crate) fn image(files: &[(&str, &str)]) -> Image {
    let ctx = Context::new();
    let bucket: Arc<dyn ReadBucket> = Arc::new(
        MemBucket::from_files(files.iter().map(|(path, content)| (*path, content.as_bytes().to_vec())))
            .unwrap(),
    );
    let mut builder = ModuleSetBuilder::new(&ctx, Arc::new(NopModuleDataProvider));
    builder.add_local_module(bucket, "test", true, LocalModuleOptions::default());
    let set = builder.build().unwrap();
    build_image(
        &ctx,
        set.to_module_read_bucket_with_only_schema_files().as_ref(),
        &BuildImageOptions::default(),
    )
    .unwrap()
    .image()
    .unwrap()
}

//! Conformance test helpers for the Strata schema toolchain.
//!
//! Provides fixture builders and a pipeline function that resolves a
//! workspace from in-memory files, compiles it into an image, and lints the
//! result, returning everything for assertion in integration tests.

#![warn(missing_docs)]

use std::sync::Arc;

use strata_check::CheckEngine;
use strata_common::{Context, ModuleFullName};
use strata_config::LintConfig;
use strata_diagnostics::FileAnnotation;
use strata_image::{build_image, BuildImageOptions, BuildOutcome, Image};
use strata_module::{MemoryRegistry, ModuleKey};
use strata_storage::{MemBucket, ReadBucket};
use strata_workspace::{Workspace, WorkspaceBucketOptions, WorkspaceProvider};

/// The registry hostname used by fixtures.
pub const REGISTRY: &str = "r.com";

/// Result of running workspace resolution, image build, and lint.
pub struct PipelineResult {
    /// The resolved workspace.
    pub workspace: Workspace,
    /// The image, if the build had no compile errors.
    pub image: Option<Image>,
    /// Compile errors as annotations.
    pub compile_annotations: Vec<FileAnnotation>,
    /// Lint findings for the image's target files.
    pub lint_annotations: Vec<FileAnnotation>,
}

impl PipelineResult {
    /// The external paths of the image's files in image order, with a flag
    /// marking imports.
    pub fn image_external_paths(&self) -> Vec<(String, bool)> {
        self.image
            .iter()
            .flat_map(|image| image.files())
            .map(|file| (file.external_path().to_string(), file.is_import()))
            .collect()
    }

    /// The rule IDs of the lint findings, in annotation order.
    pub fn lint_types(&self) -> Vec<&str> {
        self.lint_annotations
            .iter()
            .map(|annotation| annotation.type_string.as_str())
            .collect()
    }
}

/// Creates an in-memory bucket from `(path, content)` pairs.
pub fn mem_bucket(files: &[(&str, &str)]) -> Arc<dyn ReadBucket> {
    Arc::new(
        MemBucket::from_files(files.iter().map(|(path, content)| (*path, content.as_bytes().to_vec())))
            .unwrap(),
    )
}

/// Renders a v2 `strata.toml` declaring one module per `(path, name)`.
pub fn make_v2_config(modules: &[(&str, Option<&str>)]) -> String {
    let mut root = toml::Table::new();
    root.insert("version".to_string(), toml::Value::from("v2"));
    let entries = modules
        .iter()
        .map(|(path, name)| {
            let mut module = toml::Table::new();
            module.insert("path".to_string(), toml::Value::from(*path));
            if let Some(name) = name {
                module.insert("name".to_string(), toml::Value::from(*name));
            }
            toml::Value::Table(module)
        })
        .collect();
    root.insert("modules".to_string(), toml::Value::Array(entries));
    toml::to_string(&root).unwrap()
}

/// Creates a workspace provider backed by `registry`.
pub fn provider(registry: &Arc<MemoryRegistry>) -> WorkspaceProvider {
    WorkspaceProvider::new(registry.clone(), registry.clone())
}

/// Pushes `files` to `registry` as a new commit of `name`.
pub fn push(
    registry: &MemoryRegistry,
    name: &str,
    files: &[(&str, &str)],
    deps: &[ModuleKey],
) -> ModuleKey {
    let full_name = ModuleFullName::parse(name).unwrap();
    let files = files
        .iter()
        .map(|(path, content)| (path.to_string(), content.as_bytes().to_vec()))
        .collect();
    registry
        .push(&Context::new(), &full_name, files, deps, &[])
        .unwrap()
}

/// Compiles every target file of `workspace`.
pub fn build_workspace(workspace: &Workspace) -> BuildOutcome {
    build_image(
        &Context::new(),
        workspace
            .module_set()
            .to_module_read_bucket_with_only_schema_files()
            .as_ref(),
        &BuildImageOptions::default(),
    )
    .unwrap()
}

/// Runs the full pipeline over in-memory `files` with an empty registry.
pub fn full_pipeline(files: &[(&str, &str)], options: &WorkspaceBucketOptions) -> PipelineResult {
    let registry = Arc::new(MemoryRegistry::new(REGISTRY));
    full_pipeline_with_registry(files, options, &registry)
}

/// Runs the full pipeline over in-memory `files`, fetching remote modules
/// from `registry`.
///
/// Lint uses the configuration of the first target module.
pub fn full_pipeline_with_registry(
    files: &[(&str, &str)],
    options: &WorkspaceBucketOptions,
    registry: &Arc<MemoryRegistry>,
) -> PipelineResult {
    let ctx = Context::new();
    let workspace = provider(registry)
        .get_workspace_for_bucket(&ctx, mem_bucket(files), options)
        .unwrap();
    finish_pipeline(&ctx, workspace)
}

/// Builds and lints an already resolved workspace.
pub fn finish_pipeline(ctx: &Context, workspace: Workspace) -> PipelineResult {
    let outcome = build_workspace(&workspace);
    let compile_annotations = outcome.annotations().to_vec();
    let image = outcome.image();
    let lint_config = workspace
        .module_set()
        .target_modules()
        .first()
        .and_then(|module| workspace.lint_config_for_opaque_id(&module.opaque_id()))
        .cloned()
        .unwrap_or_else(|| LintConfig::default_for(strata_config::FileVersion::V2));
    let lint_annotations = match &image {
        Some(image) => CheckEngine::new().lint(ctx, image, &lint_config).unwrap(),
        None => Vec::new(),
    };
    PipelineResult {
        workspace,
        image,
        compile_annotations,
        lint_annotations,
    }
}

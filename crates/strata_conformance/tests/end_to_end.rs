//! End-to-end tests: workspace resolution, image build, and checks over
//! multi-module workspaces.

use std::fs;
use std::sync::Arc;

use strata_check::CheckEngine;
use strata_common::Context;
use strata_config::{BreakingConfig, FileVersion};
use strata_conformance::{
    build_workspace, finish_pipeline, full_pipeline, make_v2_config, provider, REGISTRY,
};
use strata_module::MemoryRegistry;
use strata_storage::OsBucket;
use strata_workspace::WorkspaceBucketOptions;

const FOO_A: &str = "syntax = \"schema2\";\npackage foo;\nimport \"b.schema\";\nmessage A {\n  .bar.B b = 1;\n}\n";
const BAR_B: &str = "syntax = \"schema2\";\npackage bar;\nmessage B {\n  string name = 1;\n}\n";

fn sub_dir(path: &str) -> WorkspaceBucketOptions {
    WorkspaceBucketOptions {
        target_sub_dir_path: path.to_string(),
        ..WorkspaceBucketOptions::default()
    }
}

#[test]
fn v2_workspace_image_lists_imports_before_targets() {
    let config = make_v2_config(&[("foo", None), ("bar", None)]);
    let result = full_pipeline(
        &[
            ("strata.toml", config.as_str()),
            ("foo/a.schema", FOO_A),
            ("bar/b.schema", BAR_B),
        ],
        &sub_dir("foo"),
    );
    assert!(result.compile_annotations.is_empty());
    assert_eq!(
        result.image_external_paths(),
        vec![
            ("bar/b.schema".to_string(), true),
            ("foo/a.schema".to_string(), false),
        ]
    );
    let image = result.image.as_ref().unwrap();
    assert_eq!(image.paths(), vec!["b.schema", "a.schema"]);
    assert!(result.workspace.is_v2());
    assert!(result.lint_annotations.is_empty(), "{:?}", result.lint_annotations);
}

#[test]
fn whole_workspace_targets_every_module() {
    let config = make_v2_config(&[("foo", None), ("bar", None)]);
    let result = full_pipeline(
        &[
            ("strata.toml", config.as_str()),
            ("foo/a.schema", FOO_A),
            ("bar/b.schema", BAR_B),
        ],
        &WorkspaceBucketOptions::default(),
    );
    assert_eq!(
        result.image_external_paths(),
        vec![
            ("bar/b.schema".to_string(), false),
            ("foo/a.schema".to_string(), false),
        ]
    );
    assert_eq!(result.workspace.module_set().target_modules().len(), 2);
}

#[test]
fn lint_reports_each_rule_against_target_files_only() {
    let config = make_v2_config(&[("foo", None), ("bar", None)]);
    let sloppy = "import \"b.schema\";\nimport \"c.schema\";\nmessage bad_name {\n  .bar.B someField = 1;\n}\n";
    let result = full_pipeline(
        &[
            ("strata.toml", config.as_str()),
            ("foo/a.schema", sloppy),
            ("bar/b.schema", BAR_B),
            ("bar/c.schema", "message unused_import {}\n"),
        ],
        &sub_dir("foo"),
    );
    assert_eq!(
        result.lint_types(),
        vec![
            "IMPORT_USED",
            "PACKAGE_DEFINED",
            "SYNTAX_SPECIFIED",
            "MESSAGE_PASCAL_CASE",
            "FIELD_LOWER_SNAKE_CASE",
        ]
    );
    assert!(result
        .lint_annotations
        .iter()
        .all(|annotation| annotation.external_path.as_deref() == Some("foo/a.schema")));
}

#[test]
fn compile_errors_come_back_as_annotations() {
    let config = make_v2_config(&[("foo", None)]);
    let result = full_pipeline(
        &[
            ("strata.toml", config.as_str()),
            ("foo/a.schema", "syntax = \"schema2\";\nmessage A { Missing m = 1; }\n"),
        ],
        &WorkspaceBucketOptions::default(),
    );
    assert!(result.image.is_none());
    assert_eq!(result.compile_annotations.len(), 1);
    assert_eq!(result.compile_annotations[0].path.as_deref(), Some("a.schema"));
    assert_eq!(result.compile_annotations[0].start_line, 2);
}

#[test]
fn os_bucket_workspace_reports_filesystem_paths() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("foo")).unwrap();
    fs::create_dir_all(dir.path().join("bar")).unwrap();
    fs::write(
        dir.path().join("strata.toml"),
        make_v2_config(&[("foo", None), ("bar", None)]),
    )
    .unwrap();
    fs::write(dir.path().join("foo").join("a.schema"), FOO_A).unwrap();
    fs::write(dir.path().join("bar").join("b.schema"), BAR_B).unwrap();

    let ctx = Context::new();
    let registry = Arc::new(MemoryRegistry::new(REGISTRY));
    let bucket = Arc::new(OsBucket::new(dir.path()).unwrap());
    let workspace = provider(&registry)
        .get_workspace_for_bucket(&ctx, bucket, &sub_dir("foo"))
        .unwrap();
    let result = finish_pipeline(&ctx, workspace);
    let expected = vec![
        (dir.path().join("bar").join("b.schema").display().to_string(), true),
        (dir.path().join("foo").join("a.schema").display().to_string(), false),
    ];
    assert_eq!(result.image_external_paths(), expected);
}

#[test]
fn breaking_compares_two_workspace_images() {
    let config = make_v2_config(&[("foo", None), ("bar", None)]);
    let before = full_pipeline(
        &[
            ("strata.toml", config.as_str()),
            ("foo/a.schema", FOO_A),
            ("bar/b.schema", BAR_B),
        ],
        &WorkspaceBucketOptions::default(),
    );
    let after = full_pipeline(
        &[
            ("strata.toml", config.as_str()),
            ("foo/a.schema", FOO_A),
            (
                "bar/b.schema",
                "syntax = \"schema2\";\npackage bar;\nmessage B {\n  int32 name = 1;\n}\n",
            ),
        ],
        &WorkspaceBucketOptions::default(),
    );
    let annotations = CheckEngine::new()
        .breaking(
            &Context::new(),
            after.image.as_ref().unwrap(),
            before.image.as_ref().unwrap(),
            &BreakingConfig::default_for(FileVersion::V2),
        )
        .unwrap();
    assert_eq!(annotations.len(), 1);
    assert_eq!(annotations[0].type_string, "FIELD_SAME_TYPE");
    assert_eq!(annotations[0].external_path.as_deref(), Some("bar/b.schema"));
    assert_eq!(annotations[0].start_line, 4);
}

#[test]
fn pipeline_image_matches_direct_build() {
    let config = make_v2_config(&[("foo", None), ("bar", None)]);
    let result = full_pipeline(
        &[
            ("strata.toml", config.as_str()),
            ("foo/a.schema", FOO_A),
            ("bar/b.schema", BAR_B),
        ],
        &sub_dir("foo"),
    );
    let rebuilt = build_workspace(&result.workspace).image().unwrap();
    assert_eq!(rebuilt.paths(), result.image.as_ref().unwrap().paths());
}

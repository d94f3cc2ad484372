//! Cross-crate properties: digests, tamper-proofing, targeting, and upload.

use std::sync::Arc;

use strata_common::Context;
use strata_image::{build_image, BuildImageOptions};
use strata_module::{
    get_file_infos, LocalModuleOptions, MemoryRegistry, ModuleError, ModuleSetBuilder,
    NopModuleDataProvider,
};
use strata_conformance::{full_pipeline, make_v2_config, mem_bucket, provider, push, REGISTRY};
use strata_upload::{upload, UploadError, UploadOptions};
use strata_workspace::{WorkspaceBucketOptions, WorkspaceError, WorkspaceModuleKeyOptions};

const FOO_A: &str = "syntax = \"schema2\";\npackage foo;\nimport \"b.schema\";\nmessage A {\n  .bar.B b = 1;\n}\n";
const BAR_B: &str = "syntax = \"schema2\";\npackage bar;\nmessage B {}\n";

#[test]
fn module_digest_ignores_file_insertion_order() {
    let ctx = Context::new();
    let digest = |files: &[(&str, &str)]| {
        let mut builder = ModuleSetBuilder::new(&ctx, Arc::new(NopModuleDataProvider));
        builder.add_local_module(mem_bucket(files), "m", true, LocalModuleOptions::default());
        let set = builder.build().unwrap();
        set.get_module_for_bucket_id("m").unwrap().digest(&ctx).unwrap()
    };
    let first = digest(&[("a.schema", "message A {}"), ("b/c.schema", "message C {}")]);
    let second = digest(&[("b/c.schema", "message C {}"), ("a.schema", "message A {}")]);
    assert_eq!(first, second);
    assert_ne!(first, digest(&[("a.schema", "message A {}")]));
}

#[test]
fn tampered_lock_dependency_aborts_workspace_resolution() {
    let registry = Arc::new(MemoryRegistry::new(REGISTRY));
    let dep = push(&registry, "r.com/acme/dep", &[("dep.schema", "message D {}\n")], &[]);
    registry.tamper(dep.commit_id(), "dep.schema", "message Evil {}\n");
    let lock = format!(
        "version = \"v1\"\n\n[[deps]]\nname = \"r.com/acme/dep\"\ncommit = \"{}\"\n",
        dep.commit_id()
    );
    let bucket = mem_bucket(&[
        ("strata.toml", "version = \"v1\"\n"),
        ("strata.lock", lock.as_str()),
        ("a.schema", "import \"dep.schema\";\n"),
    ]);
    let ctx = Context::new();
    let provider = provider(&registry);
    let first = provider
        .get_workspace_for_bucket(&ctx, bucket.clone(), &WorkspaceBucketOptions::default())
        .unwrap_err();
    assert!(matches!(
        first,
        WorkspaceError::Module(ModuleError::VerificationFailed { .. })
    ));
    let second = provider
        .get_workspace_for_bucket(&ctx, bucket, &WorkspaceBucketOptions::default())
        .unwrap_err();
    assert_eq!(first.to_string(), second.to_string());
}

#[test]
fn shared_lock_dependency_is_fetched_once() {
    let registry = Arc::new(MemoryRegistry::new(REGISTRY));
    let dep = push(&registry, "r.com/acme/dep", &[("dep.schema", "message D {}\n")], &[]);
    let lock = format!(
        "version = \"v1\"\n\n[[deps]]\nname = \"r.com/acme/dep\"\ncommit = \"{}\"\n",
        dep.commit_id()
    );
    let bucket = mem_bucket(&[
        ("strata.work.toml", "version = \"v1\"\ndirectories = [\"a\", \"b\"]\n"),
        ("a/strata.toml", "version = \"v1\"\n"),
        ("a/strata.lock", lock.as_str()),
        ("a/a.schema", "import \"dep.schema\";\n"),
        ("b/strata.toml", "version = \"v1\"\n"),
        ("b/strata.lock", lock.as_str()),
        ("b/b.schema", "import \"dep.schema\";\n"),
    ]);
    let ctx = Context::new();
    let workspace = provider(&registry)
        .get_workspace_for_bucket(&ctx, bucket, &WorkspaceBucketOptions::default())
        .unwrap();
    assert_eq!(workspace.module_set().modules().len(), 3);
    assert_eq!(registry.fetch_count(), 1);
}

#[test]
fn target_paths_narrow_the_image() {
    let config = make_v2_config(&[("foo", None), ("bar", None)]);
    let registry = Arc::new(MemoryRegistry::new(REGISTRY));
    let options = WorkspaceBucketOptions {
        target_paths: vec!["foo/a.schema".to_string()],
        ..WorkspaceBucketOptions::default()
    };
    let ctx = Context::new();
    let workspace = provider(&registry)
        .get_workspace_for_bucket(
            &ctx,
            mem_bucket(&[
                ("strata.toml", config.as_str()),
                ("foo/a.schema", FOO_A),
                ("foo/other.schema", "syntax = \"schema2\";\nmessage Other {}\n"),
                ("bar/b.schema", BAR_B),
            ]),
            &options,
        )
        .unwrap();
    let image = build_image(
        &ctx,
        workspace
            .module_set()
            .to_module_read_bucket_with_only_schema_files()
            .as_ref(),
        &BuildImageOptions::default(),
    )
    .unwrap()
    .image()
    .unwrap();
    let targets: Vec<&str> = image.target_files().map(|file| file.path()).collect();
    assert_eq!(targets, vec!["a.schema"]);
    assert_eq!(image.paths(), vec!["b.schema", "a.schema"]);
}

#[test]
fn non_target_module_has_no_target_files_after_a_full_build() {
    let config = make_v2_config(&[("a", None), ("a/b", None), ("other", None)]);
    let options = WorkspaceBucketOptions {
        target_paths: vec!["a/b/x.schema".to_string()],
        ..WorkspaceBucketOptions::default()
    };
    let result = full_pipeline(
        &[
            ("strata.toml", config.as_str()),
            ("a/top.schema", "syntax = \"schema2\";\npackage top;\nmessage Top {}\n"),
            ("a/b/x.schema", "syntax = \"schema2\";\npackage x;\nmessage X {}\n"),
            ("other/o.schema", "syntax = \"schema2\";\npackage other;\nmessage O {}\n"),
        ],
        &options,
    );
    assert!(result.compile_annotations.is_empty());
    assert!(result.image.is_some());

    let ctx = Context::new();
    let module_set = result.workspace.module_set();
    let infos = |bucket_id: &str| -> (bool, Vec<(String, bool)>) {
        let module = module_set.get_module_for_bucket_id(bucket_id).unwrap();
        let files = get_file_infos(module, &ctx)
            .unwrap()
            .iter()
            .map(|info| (info.path().to_string(), info.is_target_file()))
            .collect();
        (module.is_target(), files)
    };

    assert_eq!(infos("a/b"), (true, vec![("x.schema".to_string(), true)]));
    assert_eq!(infos("a"), (false, vec![("top.schema".to_string(), false)]));
    assert_eq!(infos("other"), (false, vec![("o.schema".to_string(), false)]));
}

#[test]
fn unreachable_sub_dir_and_empty_targets_fail_differently() {
    let config = make_v2_config(&[("foo", None), ("bar", None)]);
    let files = [
        ("strata.toml", config.as_str()),
        ("foo/a.schema", FOO_A),
        ("bar/b.schema", BAR_B),
    ];
    let registry = Arc::new(MemoryRegistry::new(REGISTRY));
    let ctx = Context::new();

    let outside = WorkspaceBucketOptions {
        target_sub_dir_path: "docs".to_string(),
        ..WorkspaceBucketOptions::default()
    };
    let err = provider(&registry)
        .get_workspace_for_bucket(&ctx, mem_bucket(&files), &outside)
        .unwrap_err();
    assert!(err.is_system());
    assert!(!err.is_no_target_files());

    let missing = WorkspaceBucketOptions {
        target_paths: vec!["foo/missing.schema".to_string()],
        ..WorkspaceBucketOptions::default()
    };
    let err = provider(&registry)
        .get_workspace_for_bucket(&ctx, mem_bucket(&files), &missing)
        .unwrap_err();
    assert!(err.is_no_target_files());
    assert!(!err.is_system());
}

#[test]
fn image_order_does_not_depend_on_parallelism() {
    let ctx = Context::new();
    let mut builder = ModuleSetBuilder::new(&ctx, Arc::new(NopModuleDataProvider));
    let files: Vec<(String, String)> = (0..12)
        .map(|i| {
            let import = if i > 0 {
                format!("import \"f{}.schema\";\n", i - 1)
            } else {
                String::new()
            };
            (
                format!("f{i}.schema"),
                format!("syntax = \"schema2\";\n{import}message M{i} {{}}\n"),
            )
        })
        .collect();
    let refs: Vec<(&str, &str)> = files.iter().map(|(p, c)| (p.as_str(), c.as_str())).collect();
    builder.add_local_module(mem_bucket(&refs), "m", true, LocalModuleOptions::default());
    let set = builder.build().unwrap();
    let bucket = set.to_module_read_bucket_with_only_schema_files();
    let paths = |no_parallelism: bool| -> Vec<String> {
        let options = BuildImageOptions {
            no_parallelism,
            ..BuildImageOptions::default()
        };
        build_image(&ctx, bucket.as_ref(), &options)
            .unwrap()
            .image()
            .unwrap()
            .paths()
            .into_iter()
            .map(str::to_string)
            .collect()
    };
    let serial = paths(true);
    assert_eq!(serial[0], "f0.schema");
    assert_eq!(serial[11], "f11.schema");
    for _ in 0..4 {
        assert_eq!(paths(false), serial);
    }
}

#[test]
fn upload_rejects_unnamed_modules_before_sending() {
    let config = make_v2_config(&[("foo", None), ("bar", None)]);
    let registry = Arc::new(MemoryRegistry::new(REGISTRY));
    let ctx = Context::new();
    let workspace = provider(&registry)
        .get_workspace_for_bucket(
            &ctx,
            mem_bucket(&[
                ("strata.toml", config.as_str()),
                ("foo/a.schema", FOO_A),
                ("bar/b.schema", BAR_B),
            ]),
            &WorkspaceBucketOptions::default(),
        )
        .unwrap();
    let err = upload(
        &ctx,
        registry.as_ref(),
        workspace.module_set().modules(),
        &UploadOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(err, UploadError::NoName { .. }));
}

#[test]
fn upload_rejects_mixed_registries() {
    let config = make_v2_config(&[("foo", Some("r.com/acme/foo")), ("bar", Some("s.com/acme/bar"))]);
    let registry = Arc::new(MemoryRegistry::new(REGISTRY));
    let ctx = Context::new();
    let workspace = provider(&registry)
        .get_workspace_for_bucket(
            &ctx,
            mem_bucket(&[
                ("strata.toml", config.as_str()),
                ("foo/a.schema", FOO_A),
                ("bar/b.schema", BAR_B),
            ]),
            &WorkspaceBucketOptions::default(),
        )
        .unwrap();
    let err = upload(
        &ctx,
        registry.as_ref(),
        workspace.module_set().modules(),
        &UploadOptions::default(),
    )
    .unwrap_err();
    assert_eq!(err.to_string(), "multiple registries detected: r.com, s.com");
}

#[test]
fn uploaded_workspace_round_trips_through_the_registry() {
    let config = make_v2_config(&[("foo", Some("r.com/acme/foo")), ("bar", Some("r.com/acme/bar"))]);
    let registry = Arc::new(MemoryRegistry::new(REGISTRY));
    let ctx = Context::new();
    let workspace = provider(&registry)
        .get_workspace_for_bucket(
            &ctx,
            mem_bucket(&[
                ("strata.toml", config.as_str()),
                ("foo/a.schema", FOO_A),
                ("bar/b.schema", BAR_B),
            ]),
            &WorkspaceBucketOptions::default(),
        )
        .unwrap();
    let modules = workspace.module_set().modules();
    let options = UploadOptions {
        labels: vec!["main".to_string()],
        verify_digests: true,
    };
    let commits = upload(&ctx, registry.as_ref(), modules, &options).unwrap();
    assert_eq!(commits.len(), modules.len());
    for (commit, module) in commits.iter().zip(modules) {
        assert_eq!(commit.digest(&ctx).unwrap(), module.digest(&ctx).unwrap());
    }

    let foo = commits
        .iter()
        .find(|commit| commit.module_key().full_name().to_string() == "r.com/acme/foo")
        .unwrap();
    let fetched = provider(&registry)
        .get_workspace_for_module_key(&ctx, foo.module_key().clone(), &WorkspaceModuleKeyOptions::default())
        .unwrap();
    assert_eq!(fetched.module_set().modules().len(), 2);
    let image = build_image(
        &ctx,
        fetched
            .module_set()
            .to_module_read_bucket_with_only_schema_files()
            .as_ref(),
        &BuildImageOptions::default(),
    )
    .unwrap()
    .image()
    .unwrap();
    assert_eq!(image.paths(), vec!["b.schema", "a.schema"]);
    assert!(image.get_file("b.schema").unwrap().is_import());
}

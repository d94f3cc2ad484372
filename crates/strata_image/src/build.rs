//! Building an [`Image`] from a module read bucket.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use strata_common::Context;
use strata_diagnostics::{dedup_and_sort, FileAnnotation};
use strata_module::{get_target_file_infos, FileType, ModuleReadBucket};
use tracing::{debug, info};

use crate::compiler::{CompileOptions, CompileWarning, CompiledFile, Compiler};
use crate::error::ImageError;
use crate::image::{Image, ImageFile};

/// The annotation type of compile diagnostics.
pub const COMPILE_ANNOTATION_TYPE: &str = "COMPILE";

const DEFAULT_COMPILE_MESSAGE: &str = "Compile error.";

/// Options for [`build_image`].
#[derive(Clone, Copy, Debug, Default)]
pub struct BuildImageOptions {
    /// Leave source positions out of the descriptors.
    pub exclude_source_code_info: bool,
    /// Compile on a single thread.
    pub no_parallelism: bool,
}

/// The result of a build that ran to completion.
#[derive(Debug)]
pub enum BuildOutcome {
    /// Compilation succeeded.
    Image(Image),
    /// Compilation reported errors, sorted by position.
    Failed(Vec<FileAnnotation>),
}

impl BuildOutcome {
    /// The image, if compilation succeeded.
    pub fn image(self) -> Option<Image> {
        match self {
            BuildOutcome::Image(image) => Some(image),
            BuildOutcome::Failed(_) => None,
        }
    }

    /// The annotations, if compilation failed.
    pub fn annotations(&self) -> &[FileAnnotation] {
        match self {
            BuildOutcome::Image(_) => &[],
            BuildOutcome::Failed(annotations) => annotations,
        }
    }
}

/// Compiles the target schema files of `bucket` into an [`Image`].
///
/// `bucket` must hold every file its targets import, transitively, and
/// must say so through [`ModuleReadBucket::should_be_self_contained`].
/// The image lists every target and every file a target imports, imports
/// first; its order is the same for any degree of parallelism.
pub fn build_image(
    ctx: &Context,
    bucket: &dyn ModuleReadBucket,
    options: &BuildImageOptions,
) -> Result<BuildOutcome, ImageError> {
    if !bucket.should_be_self_contained() {
        return Err(ImageError::system(
            "passed a module read bucket to build_image that was not expected to be self-contained",
        ));
    }
    let paths: Vec<String> = get_target_file_infos(bucket, ctx)?
        .into_iter()
        .filter(|info| info.file_type() == FileType::Schema)
        .map(|info| info.path().to_string())
        .collect();
    if paths.is_empty() {
        return Err(ImageError::NoInputFiles);
    }

    let compiler = Compiler::new(&CompileOptions {
        parallelism: if options.no_parallelism { 1 } else { 0 },
        exclude_source_code_info: options.exclude_source_code_info,
    })?;
    info!(
        "compiling {} target files on {} threads",
        paths.len(),
        compiler.parallelism()
    );
    let output = compiler.compile(ctx, bucket, &paths)?;

    if output.has_errors() {
        let annotations = output
            .diagnostics
            .iter()
            .map(|diag| {
                let mut annotation =
                    FileAnnotation::from_diagnostic(diag, &output.source_db, COMPILE_ANNOTATION_TYPE);
                if annotation.message.is_empty() {
                    annotation.message = DEFAULT_COMPILE_MESSAGE.to_string();
                }
                annotation
            })
            .collect();
        let annotations = dedup_and_sort(annotations);
        info!("compilation failed with {} annotations", annotations.len());
        return Ok(BuildOutcome::Failed(annotations));
    }

    let requested = sort_to_requested_order(&paths, output.files)?;
    let image = assemble(&paths, &requested, &output.all_files, &output.warnings)?;
    info!("built image with {} files", image.files().len());
    Ok(BuildOutcome::Image(image))
}

/// Puts compiled files back into the order they were requested in.
fn sort_to_requested_order(
    paths: &[String],
    files: Vec<Arc<CompiledFile>>,
) -> Result<Vec<Arc<CompiledFile>>, ImageError> {
    if files.len() != paths.len() {
        return Err(ImageError::system(format!(
            "expected file descriptors to be of length {} but was {}",
            paths.len(),
            files.len()
        )));
    }
    let position: HashMap<&str, usize> = paths
        .iter()
        .enumerate()
        .map(|(i, path)| (path.as_str(), i))
        .collect();
    let mut slots: Vec<Option<Arc<CompiledFile>>> = vec![None; paths.len()];
    for file in files {
        let name = &file.descriptor.name;
        let Some(&at) = position.get(name.as_str()) else {
            return Err(ImageError::system(format!(
                "compiled unrequested file descriptor: {name}"
            )));
        };
        if slots[at].is_some() {
            return Err(ImageError::system(format!("duplicate file descriptor: {name}")));
        }
        slots[at] = Some(file);
    }
    slots
        .into_iter()
        .zip(paths)
        .map(|(slot, path)| match slot {
            Some(file) if file.descriptor.name == *path => Ok(file),
            _ => Err(ImageError::system(format!(
                "no file descriptor for requested path {path}"
            ))),
        })
        .collect()
}

/// Emits each target's imports before the target itself, every file once.
///
/// The traversal keeps an explicit stack of `(file, next import)` frames
/// and a visited bit per file, so deep import chains cannot overflow the
/// call stack.
fn assemble(
    paths: &[String],
    requested: &[Arc<CompiledFile>],
    all_files: &BTreeMap<String, Arc<CompiledFile>>,
    warnings: &[CompileWarning],
) -> Result<Image, ImageError> {
    let arena: Vec<&Arc<CompiledFile>> = all_files.values().collect();
    let slot: HashMap<&str, usize> = arena
        .iter()
        .enumerate()
        .map(|(i, file)| (file.descriptor.name.as_str(), i))
        .collect();
    let targets: HashSet<&str> = paths.iter().map(String::as_str).collect();

    let mut syntax_unspecified = HashSet::new();
    let mut unused: HashMap<&str, Vec<usize>> = HashMap::new();
    for warning in warnings {
        match warning {
            CompileWarning::SyntaxUnspecified { path } => {
                syntax_unspecified.insert(path.as_str());
            }
            CompileWarning::UnusedImport { path, index, .. } => {
                unused.entry(path.as_str()).or_default().push(*index);
            }
        }
    }

    let mut visited = vec![false; arena.len()];
    let mut order = Vec::with_capacity(arena.len());
    for root in requested {
        let Some(&root) = slot.get(root.descriptor.name.as_str()) else {
            return Err(ImageError::system(format!(
                "requested file {} missing from compiled files",
                root.descriptor.name
            )));
        };
        if visited[root] {
            continue;
        }
        visited[root] = true;
        let mut stack: Vec<(usize, usize)> = vec![(root, 0)];
        while let Some((current, next)) = stack.pop() {
            let dependencies = &arena[current].descriptor.dependencies;
            if next < dependencies.len() {
                stack.push((current, next + 1));
                let Some(&dep) = slot.get(dependencies[next].as_str()) else {
                    return Err(ImageError::system(format!(
                        "{} imports {} which was not compiled",
                        arena[current].descriptor.name, dependencies[next]
                    )));
                };
                if !visited[dep] {
                    visited[dep] = true;
                    stack.push((dep, 0));
                }
            } else {
                order.push(current);
            }
        }
    }

    let files = order
        .into_iter()
        .map(|i| {
            let file = arena[i];
            let path = file.descriptor.name.as_str();
            ImageFile::new(
                file.descriptor.clone(),
                file.external_path.clone(),
                file.origin.module_full_name.clone(),
                file.origin.commit_id.clone(),
                !targets.contains(path),
            )
            .with_syntax_unspecified(syntax_unspecified.contains(path))
            .with_unused_dependency_indexes(unused.get(path).cloned().unwrap_or_default())
        })
        .collect();
    debug!("assembled image from {} compiled files", arena.len());
    Image::new(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_module::{LocalModuleOptions, ModuleSet, ModuleSetBuilder, NopModuleDataProvider};
    use strata_storage::{MemBucket, ReadBucket};

    fn module_set(modules: &[(&str, bool, &[(&str, &str)])]) -> ModuleSet {
        let ctx = Context::new();
        let mut builder = ModuleSetBuilder::new(&ctx, Arc::new(NopModuleDataProvider));
        for (id, is_target, files) in modules {
            let bucket: Arc<dyn ReadBucket> = Arc::new(
                MemBucket::from_files(files.iter().map(|(p, c)| (*p, c.as_bytes().to_vec()))).unwrap(),
            );
            builder.add_local_module(bucket, *id, *is_target, LocalModuleOptions::default());
        }
        builder.build().unwrap()
    }

    fn build(set: &ModuleSet, no_parallelism: bool) -> BuildOutcome {
        let options = BuildImageOptions {
            no_parallelism,
            ..BuildImageOptions::default()
        };
        build_image(
            &Context::new(),
            set.to_module_read_bucket_with_only_schema_files().as_ref(),
            &options,
        )
        .unwrap()
    }

    const X: &str = "syntax = \"schema2\";\nimport \"y.schema\";\nmessage X { Y y = 1; }\n";
    const Y: &str = "syntax = \"schema2\";\nimport \"z.schema\";\nmessage Y { Z z = 1; }\n";
    const Z: &str = "syntax = \"schema2\";\nmessage Z { string name = 1; }\n";

    #[test]
    fn imports_precede_importers_regardless_of_parallelism() {
        let set = module_set(&[
            ("x", true, &[("x.schema", X)]),
            ("deps", false, &[("y.schema", Y), ("z.schema", Z)]),
        ]);
        let serial = build(&set, true).image().unwrap();
        let parallel = build(&set, false).image().unwrap();
        assert_eq!(serial.paths(), vec!["z.schema", "y.schema", "x.schema"]);
        assert_eq!(serial.paths(), parallel.paths());
        let imports: Vec<bool> = serial.files().iter().map(ImageFile::is_import).collect();
        assert_eq!(imports, vec![true, true, false]);
    }

    #[test]
    fn files_carry_descriptors_and_origins() {
        let set = module_set(&[(
            "x",
            true,
            &[
                ("z.schema", Z),
                ("pets.schema", "syntax = \"schema1\";\npackage acme.pets;\nimport \"z.schema\";\nmessage Pet {\n  enum Kind { CAT = 0; }\n  Kind kind = 1;\n  .Z tag = 2;\n}\n"),
            ],
        )]);
        let image = build(&set, false).image().unwrap();
        let pets = image.get_file("pets.schema").unwrap();
        assert!(!pets.is_import());
        let descriptor = pets.descriptor();
        assert_eq!(descriptor.package, "acme.pets");
        let pet = &descriptor.message_types[0];
        assert_eq!(pet.full_name, "acme.pets.Pet");
        assert_eq!(pet.fields[0].field_type, crate::FieldType::Enum("acme.pets.Pet.Kind".to_string()));
        assert_eq!(pet.fields[1].field_type, crate::FieldType::Message("Z".to_string()));
        let location = descriptor.location("acme.pets.Pet.kind").unwrap();
        assert_eq!(location.start_line, 6);
        assert!(pets.unused_dependency_indexes().is_empty());
    }

    #[test]
    fn warnings_are_recorded_on_files() {
        let set = module_set(&[(
            "x",
            true,
            &[
                ("a.schema", "import \"b.schema\";\nmessage A {}\n"),
                ("b.schema", "syntax = \"schema2\";\nmessage B {}\n"),
            ],
        )]);
        let image = build(&set, false).image().unwrap();
        let a = image.get_file("a.schema").unwrap();
        assert!(a.is_syntax_unspecified());
        assert_eq!(a.unused_dependency_indexes(), &[0]);
        assert!(!image.get_file("b.schema").unwrap().is_syntax_unspecified());
    }

    #[test]
    fn public_imports_make_symbols_visible() {
        let set = module_set(&[(
            "x",
            true,
            &[
                ("a.schema", "import \"b.schema\";\nmessage A { C c = 1; }\n"),
                ("b.schema", "import public \"c.schema\";\n"),
                ("c.schema", "message C {}\n"),
            ],
        )]);
        let image = build(&set, false).image().unwrap();
        assert!(image.get_file("a.schema").unwrap().unused_dependency_indexes().is_empty());
        assert!(image.get_file("b.schema").unwrap().unused_dependency_indexes().is_empty());
    }

    #[test]
    fn compile_errors_become_sorted_annotations() {
        let set = module_set(&[(
            "x",
            true,
            &[
                ("a.schema", "message A {\n  Missing m = 1;\n  string m = 1;\n}\n"),
                ("b.schema", "import \"gone.schema\";\n"),
            ],
        )]);
        let outcome = build(&set, false);
        let rendered: Vec<String> = outcome.annotations().iter().map(ToString::to_string).collect();
        assert_eq!(
            rendered,
            vec![
                "a.schema:2:3:\"Missing\" is not defined",
                "a.schema:3:10:field \"m\" is already defined in message \"A\"",
                "a.schema:3:14:field number 1 is already used in message \"A\"",
                "b.schema:1:1:import \"gone.schema\" was not found",
            ]
        );
        assert!(outcome
            .annotations()
            .iter()
            .all(|annotation| annotation.type_string == COMPILE_ANNOTATION_TYPE));
        assert!(outcome.image().is_none());
    }

    #[test]
    fn unimported_symbols_are_not_visible() {
        let set = module_set(&[(
            "x",
            true,
            &[
                ("a.schema", "message A { B b = 1; }\n"),
                ("b.schema", "message B {}\n"),
            ],
        )]);
        let outcome = build(&set, false);
        assert_eq!(
            outcome.annotations()[0].message,
            "\"B\" is defined in \"b.schema\", which is not imported"
        );
    }

    #[test]
    fn import_cycles_are_reported() {
        let set = module_set(&[(
            "x",
            true,
            &[
                ("a.schema", "import \"b.schema\";\n"),
                ("b.schema", "import \"a.schema\";\n"),
            ],
        )]);
        let outcome = build(&set, false);
        assert!(outcome
            .annotations()
            .iter()
            .any(|annotation| annotation.message == "import cycle: a.schema -> b.schema -> a.schema"));
    }

    #[test]
    fn only_target_files_are_requested() {
        let set = module_set(&[
            ("x", true, &[("x.schema", X)]),
            ("deps", false, &[("y.schema", Y), ("z.schema", Z), ("unused.schema", "message U {}")]),
        ]);
        let image = build(&set, false).image().unwrap();
        assert!(image.get_file("unused.schema").is_none());
        assert_eq!(image.target_files().count(), 1);
    }

    #[test]
    fn no_target_files_is_an_error() {
        let set = module_set(&[("deps", false, &[("z.schema", Z)])]);
        let err = build_image(
            &Context::new(),
            set.to_module_read_bucket().as_ref(),
            &BuildImageOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ImageError::NoInputFiles));
    }

    #[test]
    fn bucket_must_be_self_contained() {
        let set = module_set(&[("x", true, &[("z.schema", Z)])]);
        let module = set.get_module_for_bucket_id("x").unwrap();
        let err = build_image(&Context::new(), module, &BuildImageOptions::default()).unwrap_err();
        assert!(err.is_system());
        assert!(err.to_string().contains("not expected to be self-contained"));
    }
}

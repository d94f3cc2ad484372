//! The parallel compiler driver.
//!
//! Compilation runs in two phases on a dedicated `rayon` pool. Loading
//! proceeds in waves: the requested files are read and parsed in parallel,
//! then every import not yet seen forms the next wave. File IDs are assigned
//! in path order within each wave, so results do not depend on scheduling.
//! Once every reachable file is parsed, all files are linked in parallel.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use rayon::prelude::*;
use rayon::ThreadPool;
use strata_common::{CommitId, Context, ModuleFullName};
use strata_diagnostics::{Diagnostic, DiagnosticCode, DiagnosticSink};
use strata_module::ModuleReadBucket;
use strata_parser::SchemaFile;
use strata_source::{FileId, SourceDb};
use tracing::debug;

use crate::descriptor::FileDescriptor;
use crate::error::ImageError;
use crate::errors;
use crate::link::{link_file, SymbolTable};

/// Options for a [`Compiler`].
#[derive(Clone, Copy, Debug, Default)]
pub struct CompileOptions {
    /// Worker threads to use; `0` means one per CPU.
    pub parallelism: usize,
    /// Leave [`FileDescriptor::source_code_info`] empty.
    pub exclude_source_code_info: bool,
}

/// The module a compiled file came from.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FileOrigin {
    /// The module's name, if it has one.
    pub module_full_name: Option<ModuleFullName>,
    /// The module's commit, if it is remote.
    pub commit_id: Option<CommitId>,
}

/// A linked file.
#[derive(Clone, Debug)]
pub struct CompiledFile {
    /// The linked descriptor.
    pub descriptor: FileDescriptor,
    /// The path to show users.
    pub external_path: String,
    /// The module the file was read from.
    pub origin: FileOrigin,
}

/// A non-fatal finding about one file.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum CompileWarning {
    /// The file has no `syntax` statement.
    SyntaxUnspecified {
        /// The file's path.
        path: String,
    },
    /// None of an import's symbols are referenced.
    UnusedImport {
        /// The importing file's path.
        path: String,
        /// The index of the import among the file's imports.
        index: usize,
        /// The imported path.
        import: String,
    },
}

impl CompileWarning {
    /// The path of the file the warning is about.
    pub fn path(&self) -> &str {
        match self {
            CompileWarning::SyntaxUnspecified { path } | CompileWarning::UnusedImport { path, .. } => path,
        }
    }

    /// The warning's diagnostic code.
    pub fn code(&self) -> DiagnosticCode {
        match self {
            CompileWarning::SyntaxUnspecified { .. } => errors::W301,
            CompileWarning::UnusedImport { .. } => errors::W300,
        }
    }
}

/// Everything a compilation produced.
#[derive(Debug)]
pub struct CompileOutput {
    /// The requested files, in no particular order. Empty if there were
    /// errors.
    pub files: Vec<Arc<CompiledFile>>,
    /// Every compiled file, requested or imported, by path.
    pub all_files: BTreeMap<String, Arc<CompiledFile>>,
    /// Parse and link errors.
    pub diagnostics: Vec<Diagnostic>,
    /// Warnings, sorted.
    pub warnings: Vec<CompileWarning>,
    /// The text of every loaded file.
    pub source_db: SourceDb,
}

impl CompileOutput {
    /// Returns `true` if compilation failed.
    pub fn has_errors(&self) -> bool {
        !self.diagnostics.is_empty()
    }
}

/// One parsed file of a compilation.
pub(crate) struct ParsedFile {
    pub path: String,
    pub external_path: String,
    pub origin: FileOrigin,
    pub id: FileId,
    pub ast: SchemaFile,
}

struct LoadedFile {
    external_path: String,
    origin: FileOrigin,
    content: String,
}

/// Compiles schema files read from a [`ModuleReadBucket`].
pub struct Compiler {
    pool: ThreadPool,
    exclude_source_code_info: bool,
}

impl Compiler {
    /// Creates a compiler with its own thread pool.
    pub fn new(options: &CompileOptions) -> Result<Self, ImageError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(options.parallelism)
            .thread_name(|i| format!("strata-compile-{i}"))
            .build()
            .map_err(|err| ImageError::system(format!("failed to start compiler threads: {err}")))?;
        Ok(Self {
            pool,
            exclude_source_code_info: options.exclude_source_code_info,
        })
    }

    /// The number of worker threads.
    pub fn parallelism(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Compiles `paths` and every file they import, transitively.
    ///
    /// Diagnostics are returned in the output, not as an error. Every path
    /// in `paths` must exist in `bucket`.
    pub fn compile(
        &self,
        ctx: &Context,
        bucket: &dyn ModuleReadBucket,
        paths: &[String],
    ) -> Result<CompileOutput, ImageError> {
        let sink = DiagnosticSink::new();
        let mut source_db = SourceDb::new();
        let files = self.load(ctx, bucket, paths, &mut source_db, &sink)?;
        let parse_failed = sink.has_errors();

        let by_path: HashMap<&str, usize> = files
            .iter()
            .enumerate()
            .map(|(index, file)| (file.path.as_str(), index))
            .collect();
        let imports: Vec<Vec<Option<usize>>> = files
            .iter()
            .map(|file| {
                file.ast
                    .imports
                    .iter()
                    .map(|import| {
                        let target = by_path.get(import.path.as_str()).copied();
                        if target.is_none() {
                            sink.emit(errors::error_import_not_found(&import.path, import.span));
                        }
                        target
                    })
                    .collect()
            })
            .collect();

        let mut warnings = Vec::new();
        let mut linked = Vec::new();
        if !parse_failed {
            check_import_cycles(&files, &imports, &sink);
            let table = SymbolTable::build(&files, &sink);
            let include_source_code_info = !self.exclude_source_code_info;
            let db = &source_db;
            linked = self.pool.install(|| {
                (0..files.len())
                    .into_par_iter()
                    .map(|index| {
                        ctx.check()?;
                        let source = db.get_file(files[index].id).ok_or_else(|| {
                            ImageError::system(format!("{} was parsed but not loaded", files[index].path))
                        })?;
                        Ok(link_file(
                            index,
                            &files,
                            &imports,
                            &table,
                            source,
                            include_source_code_info,
                            &sink,
                        ))
                    })
                    .collect::<Result<Vec<_>, ImageError>>()
            })?;
            for (index, file) in files.iter().enumerate() {
                if file.ast.syntax.is_none() {
                    warnings.push(CompileWarning::SyntaxUnspecified {
                        path: file.path.clone(),
                    });
                }
                for (position, import) in file.ast.imports.iter().enumerate() {
                    let unused = !import.public
                        && imports[index][position].is_some()
                        && !linked[index].used_imports[position];
                    if unused {
                        warnings.push(CompileWarning::UnusedImport {
                            path: file.path.clone(),
                            index: position,
                            import: import.path.clone(),
                        });
                    }
                }
            }
            warnings.sort();
        }

        let mut diagnostics: Vec<Diagnostic> = sink
            .take_all()
            .into_iter()
            .filter(|diag| diag.severity.is_error())
            .collect();
        diagnostics.sort_by(|a, b| {
            (a.primary_span.file, a.primary_span.start, &a.message)
                .cmp(&(b.primary_span.file, b.primary_span.start, &b.message))
        });
        if !diagnostics.is_empty() {
            debug!("compilation failed with {} errors", diagnostics.len());
            return Ok(CompileOutput {
                files: Vec::new(),
                all_files: BTreeMap::new(),
                diagnostics,
                warnings,
                source_db,
            });
        }

        let requested: HashSet<&str> = paths.iter().map(String::as_str).collect();
        let mut all_files = BTreeMap::new();
        let mut requested_files = Vec::new();
        for (file, linked) in files.iter().zip(linked) {
            let compiled = Arc::new(CompiledFile {
                descriptor: linked.descriptor,
                external_path: file.external_path.clone(),
                origin: file.origin.clone(),
            });
            if requested.contains(file.path.as_str()) {
                requested_files.push(Arc::clone(&compiled));
            }
            all_files.insert(file.path.clone(), compiled);
        }
        Ok(CompileOutput {
            files: requested_files,
            all_files,
            diagnostics,
            warnings,
            source_db,
        })
    }

    /// Loads and parses `paths` and their imports, wave by wave.
    fn load(
        &self,
        ctx: &Context,
        bucket: &dyn ModuleReadBucket,
        paths: &[String],
        source_db: &mut SourceDb,
        sink: &DiagnosticSink,
    ) -> Result<Vec<ParsedFile>, ImageError> {
        let requested: HashSet<&str> = paths.iter().map(String::as_str).collect();
        let mut seen: HashSet<String> = paths.iter().cloned().collect();
        let mut wave: Vec<String> = seen.iter().cloned().collect();
        wave.sort();

        let mut files: Vec<ParsedFile> = Vec::new();
        let mut round = 0;
        while !wave.is_empty() {
            ctx.check()?;
            round += 1;
            let loaded = self.pool.install(|| {
                wave.par_iter()
                    .map(|path| load_file(ctx, bucket, path))
                    .collect::<Result<Vec<_>, ImageError>>()
            })?;

            let mut pending = Vec::new();
            for (path, loaded) in wave.iter().zip(loaded) {
                match loaded {
                    Some(loaded) => {
                        let id = source_db.add_source(path.clone(), loaded.external_path.clone(), loaded.content);
                        pending.push((path.clone(), id, loaded.external_path, loaded.origin));
                    }
                    None if requested.contains(path.as_str()) => {
                        return Err(ImageError::system(format!(
                            "requested file {path} is not in the module read bucket"
                        )));
                    }
                    // Reported as a link error once all files are loaded.
                    None => {}
                }
            }

            let db = &*source_db;
            let asts = self.pool.install(|| {
                pending
                    .par_iter()
                    .map(|(path, id, _, _)| {
                        db.get_file(*id)
                            .map(|source| strata_parser::parse_file(source, sink))
                            .ok_or_else(|| ImageError::system(format!("{path} was not loaded")))
                    })
                    .collect::<Result<Vec<_>, ImageError>>()
            })?;
            debug!("compile wave {} parsed {} files", round, asts.len());

            let mut next = Vec::new();
            for ((path, id, external_path, origin), ast) in pending.into_iter().zip(asts) {
                for import in &ast.imports {
                    if seen.insert(import.path.clone()) {
                        next.push(import.path.clone());
                    }
                }
                files.push(ParsedFile {
                    path,
                    external_path,
                    origin,
                    id,
                    ast,
                });
            }
            next.sort();
            wave = next;
        }
        Ok(files)
    }
}

/// Reads one file, returning `None` if the bucket does not have it.
fn load_file(
    ctx: &Context,
    bucket: &dyn ModuleReadBucket,
    path: &str,
) -> Result<Option<LoadedFile>, ImageError> {
    ctx.check()?;
    let file = match bucket.get_file(ctx, path) {
        Ok(file) => file,
        Err(err) if err.is_not_exist() => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    let module = file.info().module();
    let origin = FileOrigin {
        module_full_name: module.full_name().cloned(),
        commit_id: module.commit_id().cloned(),
    };
    let external_path = file.info().external_path().to_string();
    let content = file.read_to_string()?;
    Ok(Some(LoadedFile {
        external_path,
        origin,
        content,
    }))
}

/// Reports each group of files that import each other, once, at the first
/// import of the group's first file that stays inside the group.
fn check_import_cycles(files: &[ParsedFile], imports: &[Vec<Option<usize>>], sink: &DiagnosticSink) {
    let mut graph: DiGraph<usize, ()> = DiGraph::new();
    let nodes: Vec<NodeIndex> = (0..files.len()).map(|i| graph.add_node(i)).collect();
    for (from, targets) in imports.iter().enumerate() {
        for to in targets.iter().flatten() {
            graph.add_edge(nodes[from], nodes[*to], ());
        }
    }
    for component in tarjan_scc(&graph) {
        let mut members: Vec<usize> = component.iter().map(|&node| graph[node]).collect();
        let self_import = members.len() == 1 && imports[members[0]].contains(&Some(members[0]));
        if members.len() < 2 && !self_import {
            continue;
        }
        members.sort_by(|a, b| files[*a].path.cmp(&files[*b].path));
        let first = members[0];
        let mut cycle: Vec<&str> = members.iter().map(|&m| files[m].path.as_str()).collect();
        cycle.push(&files[first].path);
        let span = files[first]
            .ast
            .imports
            .iter()
            .zip(&imports[first])
            .find(|(_, target)| target.is_some_and(|t| members.contains(&t)))
            .map(|(import, _)| import.span)
            .unwrap_or(files[first].ast.span);
        sink.emit(errors::error_import_cycle(&cycle.join(" -> "), span));
    }
}

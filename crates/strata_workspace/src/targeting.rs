//! Path targeting: which modules of a workspace, and which files within
//! them, a request selects.
//!
//! Requests name paths relative to the workspace root. Each path is
//! attributed to the deepest module directory that strictly contains it,
//! rewritten relative to that directory, and then remapped through the
//! module's roots so that it lines up with the module's own file paths.
//!
//! A request may instead name a single schema file. Only the module that
//! owns the file is reached, and only that file (optionally with the rest of
//! its package) is a target.

use strata_common::normalpath;

use crate::error::WorkspaceError;

/// A targeting request, with all paths relative to the workspace root.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TargetingRequest {
    /// The directory the request was made from. `"."` selects everything.
    pub target_sub_dir_path: String,
    /// Paths to target. Empty means everything under the sub-directory.
    pub target_paths: Vec<String>,
    /// Paths whose files are never targets.
    pub target_exclude_paths: Vec<String>,
    /// A single schema file to target. Cannot be combined with
    /// `target_paths`.
    pub schema_file_target_path: Option<String>,
    /// Also target the files sharing the package of the schema file target.
    pub include_package_files: bool,
}

impl Default for TargetingRequest {
    fn default() -> Self {
        Self {
            target_sub_dir_path: ".".to_string(),
            target_paths: Vec::new(),
            target_exclude_paths: Vec::new(),
            schema_file_target_path: None,
            include_package_files: false,
        }
    }
}

/// The targeting decision for one module directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModuleTargeting {
    /// The module directory, relative to the workspace root.
    pub module_dir_path: String,
    /// Whether the request reached this module at all.
    pub is_tentative_target: bool,
    /// Whether the module is still a target once paths are mapped through
    /// its roots.
    pub is_target_module: bool,
    /// Module paths limiting the target files. Empty means all files.
    pub target_paths: Vec<String>,
    /// Module paths whose files are not targets.
    pub target_exclude_paths: Vec<String>,
    /// The schema file target, as a module path.
    pub schema_file_target_path: Option<String>,
    /// Whether the package of the schema file target is targeted too.
    pub include_package_files: bool,
}

impl ModuleTargeting {
    /// Computes the targeting of `module_dir_path`, whose files live under
    /// `roots` (relative to the module directory).
    ///
    /// `all_module_dir_paths` lists every module directory of the workspace
    /// so that a path inside a nested module is attributed only to the
    /// nested one.
    pub fn new(
        module_dir_path: &str,
        roots: &[String],
        all_module_dir_paths: &[String],
        request: &TargetingRequest,
    ) -> Result<Self, WorkspaceError> {
        let dir = module_dir_path;
        let owns = |path: &str| owner(all_module_dir_paths, path) == Some(dir);

        let mut is_tentative_target = false;
        let mut whole_module = false;
        let mut relative_targets = Vec::new();
        let mut relative_file = None;
        if let Some(file) = &request.schema_file_target_path {
            if !request.target_paths.is_empty() {
                return Err(WorkspaceError::SchemaFileTargetWithPaths {
                    path: file.clone(),
                });
            }
            if normalpath::contains(dir, file) && owns(file) {
                is_tentative_target = true;
                relative_file = Some(rel(dir, file)?);
            }
        } else if request.target_paths.is_empty() {
            let sub_dir = request.target_sub_dir_path.as_str();
            if normalpath::equals_or_contains(sub_dir, dir) {
                is_tentative_target = true;
                whole_module = true;
            } else if normalpath::contains(dir, sub_dir) && owns(sub_dir) {
                is_tentative_target = true;
                relative_targets.push(rel(dir, sub_dir)?);
            }
        } else {
            for path in &request.target_paths {
                if path == dir {
                    return Err(WorkspaceError::PathIsModuleDir {
                        dir: dir.to_string(),
                    });
                }
                if normalpath::contains(path, dir) {
                    is_tentative_target = true;
                    whole_module = true;
                } else if normalpath::contains(dir, path) && owns(path) {
                    is_tentative_target = true;
                    relative_targets.push(rel(dir, path)?);
                }
            }
        }

        let mut excluded = false;
        let mut relative_excludes = Vec::new();
        for path in &request.target_exclude_paths {
            if path == dir {
                return Err(WorkspaceError::ExcludePathIsModuleDir {
                    dir: dir.to_string(),
                });
            }
            if normalpath::contains(path, dir) {
                excluded = true;
            } else if normalpath::contains(dir, path) && owns(path) {
                relative_excludes.push(rel(dir, path)?);
            }
        }

        let mut target_paths = Vec::new();
        let mut targets_resolved = whole_module;
        if !whole_module {
            for path in &relative_targets {
                match map_to_roots(roots, path) {
                    Some(mapped) if mapped == "." => {
                        targets_resolved = true;
                        target_paths.clear();
                        break;
                    }
                    Some(mapped) => {
                        targets_resolved = true;
                        target_paths.push(mapped);
                    }
                    None => {}
                }
            }
        }

        let mut schema_file_target_path = None;
        if let Some(file) = &relative_file {
            match map_to_roots(roots, file) {
                Some(mapped) if mapped != "." => {
                    targets_resolved = true;
                    schema_file_target_path = Some(mapped);
                }
                _ => {}
            }
        }

        let mut target_exclude_paths = Vec::new();
        for path in &relative_excludes {
            match map_to_roots(roots, path) {
                Some(mapped) if mapped == "." => excluded = true,
                Some(mapped) => target_exclude_paths.push(mapped),
                None => {}
            }
        }
        target_paths.sort();
        target_paths.dedup();
        target_exclude_paths.sort();
        target_exclude_paths.dedup();

        Ok(Self {
            module_dir_path: dir.to_string(),
            is_tentative_target,
            is_target_module: is_tentative_target && targets_resolved && !excluded,
            target_paths,
            target_exclude_paths,
            include_package_files: request.include_package_files && schema_file_target_path.is_some(),
            schema_file_target_path,
        })
    }
}

/// The deepest module directory strictly containing `path`.
fn owner<'a>(all_module_dir_paths: &'a [String], path: &str) -> Option<&'a str> {
    all_module_dir_paths
        .iter()
        .filter(|dir| normalpath::contains(dir, path))
        .max_by_key(|dir| if dir.as_str() == "." { 0 } else { dir.len() + 1 })
        .map(String::as_str)
}

fn rel(dir: &str, path: &str) -> Result<String, WorkspaceError> {
    normalpath::rel(dir, path).map_err(|err| WorkspaceError::path(path, err))
}

/// Maps a module-directory-relative path into the module's namespace.
///
/// A path under a root keeps its remainder after the root. A path that is a
/// root, or an ancestor of one, selects the whole module and maps to `"."`.
/// A path outside every root matches no module file.
fn map_to_roots(roots: &[String], path: &str) -> Option<String> {
    for root in roots {
        if normalpath::equals_or_contains(root, path) {
            return normalpath::rel(root, path).ok();
        }
    }
    if roots.iter().any(|root| normalpath::contains(path, root)) {
        return Some(".".to_string());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dot() -> Vec<String> {
        vec![".".to_string()]
    }

    fn dirs(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn request(paths: &[&str], excludes: &[&str]) -> TargetingRequest {
        TargetingRequest {
            target_sub_dir_path: ".".to_string(),
            target_paths: dirs(paths),
            target_exclude_paths: dirs(excludes),
            ..TargetingRequest::default()
        }
    }

    fn file_request(file: &str) -> TargetingRequest {
        TargetingRequest {
            schema_file_target_path: Some(file.to_string()),
            include_package_files: true,
            ..TargetingRequest::default()
        }
    }

    #[test]
    fn empty_request_targets_every_module() {
        let all = dirs(&["a", "b"]);
        let targeting = ModuleTargeting::new("a", &dot(), &all, &TargetingRequest::default()).unwrap();
        assert!(targeting.is_target_module);
        assert!(targeting.target_paths.is_empty());
    }

    #[test]
    fn path_in_nested_module_targets_only_that_module() {
        let all = dirs(&["a", "a/b", "other"]);
        let req = request(&["a/b/x.schema"], &[]);

        let nested = ModuleTargeting::new("a/b", &dot(), &all, &req).unwrap();
        assert!(nested.is_target_module);
        assert_eq!(nested.target_paths, vec!["x.schema".to_string()]);

        let outer = ModuleTargeting::new("a", &dot(), &all, &req).unwrap();
        assert!(!outer.is_tentative_target);
        assert!(!outer.is_target_module);

        let other = ModuleTargeting::new("other", &dot(), &all, &req).unwrap();
        assert!(!other.is_target_module);
    }

    #[test]
    fn module_dir_as_path_is_rejected() {
        let all = dirs(&["a"]);
        let err = ModuleTargeting::new("a", &dot(), &all, &request(&["a"], &[])).unwrap_err();
        assert_eq!(
            err.to_string(),
            "module \"a\" was specified with --path - specify this module path directly as an input"
        );
        let err = ModuleTargeting::new("a", &dot(), &all, &request(&[], &["a"])).unwrap_err();
        assert_eq!(
            err.to_string(),
            "module \"a\" was specified with --exclude-path - this flag cannot be used to specify module directories"
        );
    }

    #[test]
    fn paths_are_remapped_through_roots() {
        let all = dirs(&["m"]);
        let roots = dirs(&["proto", "vendor"]);
        let req = request(&["m/proto/acme/a.schema", "m/vendor"], &["m/proto/acme/internal"]);
        let targeting = ModuleTargeting::new("m", &roots, &all, &req).unwrap();
        assert!(targeting.is_target_module);
        // "m/vendor" is a whole root, so every file is a target.
        assert!(targeting.target_paths.is_empty());
        assert_eq!(targeting.target_exclude_paths, vec!["acme/internal".to_string()]);
    }

    #[test]
    fn paths_outside_roots_leave_module_untargeted() {
        let all = dirs(&["m"]);
        let roots = dirs(&["proto"]);
        let targeting =
            ModuleTargeting::new("m", &roots, &all, &request(&["m/docs/a.schema"], &[])).unwrap();
        assert!(targeting.is_tentative_target);
        assert!(!targeting.is_target_module);
    }

    #[test]
    fn sub_dir_inside_module_becomes_a_target_path() {
        let all = dirs(&["a", "b"]);
        let req = TargetingRequest {
            target_sub_dir_path: "a/pets".to_string(),
            ..TargetingRequest::default()
        };
        let a = ModuleTargeting::new("a", &dot(), &all, &req).unwrap();
        assert!(a.is_target_module);
        assert_eq!(a.target_paths, vec!["pets".to_string()]);
        let b = ModuleTargeting::new("b", &dot(), &all, &req).unwrap();
        assert!(!b.is_tentative_target);
    }

    #[test]
    fn excluding_an_ancestor_untargets_the_module() {
        let all = dirs(&["a/b"]);
        let targeting = ModuleTargeting::new("a/b", &dot(), &all, &request(&[], &["a"])).unwrap();
        assert!(targeting.is_tentative_target);
        assert!(!targeting.is_target_module);
    }

    #[test]
    fn schema_file_target_reaches_only_its_owner() {
        let all = dirs(&["a", "a/b", "other"]);
        let req = file_request("a/b/pets/cat.schema");

        let nested = ModuleTargeting::new("a/b", &dot(), &all, &req).unwrap();
        assert!(nested.is_target_module);
        assert!(nested.target_paths.is_empty());
        assert_eq!(nested.schema_file_target_path.as_deref(), Some("pets/cat.schema"));
        assert!(nested.include_package_files);

        for dir in ["a", "other"] {
            let targeting = ModuleTargeting::new(dir, &dot(), &all, &req).unwrap();
            assert!(!targeting.is_tentative_target);
            assert!(!targeting.is_target_module);
            assert_eq!(targeting.schema_file_target_path, None);
            assert!(!targeting.include_package_files);
        }
    }

    #[test]
    fn schema_file_target_is_remapped_through_roots() {
        let all = dirs(&["m"]);
        let roots = dirs(&["proto"]);
        let targeting =
            ModuleTargeting::new("m", &roots, &all, &file_request("m/proto/acme/a.schema")).unwrap();
        assert!(targeting.is_target_module);
        assert_eq!(targeting.schema_file_target_path.as_deref(), Some("acme/a.schema"));

        let outside =
            ModuleTargeting::new("m", &roots, &all, &file_request("m/docs/a.schema")).unwrap();
        assert!(outside.is_tentative_target);
        assert!(!outside.is_target_module);
        assert_eq!(outside.schema_file_target_path, None);
    }

    #[test]
    fn schema_file_target_cannot_be_combined_with_paths() {
        let all = dirs(&["a"]);
        let req = TargetingRequest {
            target_paths: dirs(&["a/x"]),
            ..file_request("a/x/cat.schema")
        };
        let err = ModuleTargeting::new("a", &dot(), &all, &req).unwrap_err();
        assert!(matches!(err, WorkspaceError::SchemaFileTargetWithPaths { .. }));
    }
}

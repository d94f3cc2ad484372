//! The compiled output of a build.

use std::collections::HashMap;

use serde::Serialize;
use strata_common::{CommitId, ModuleFullName};

use crate::descriptor::FileDescriptor;
use crate::error::ImageError;

/// One file of an [`Image`].
#[derive(Clone, Debug, Serialize)]
pub struct ImageFile {
    descriptor: FileDescriptor,
    external_path: String,
    module_full_name: Option<ModuleFullName>,
    commit_id: Option<CommitId>,
    is_import: bool,
    is_syntax_unspecified: bool,
    unused_dependency_indexes: Vec<usize>,
}

impl ImageFile {
    /// Creates an image file.
    pub fn new(
        descriptor: FileDescriptor,
        external_path: impl Into<String>,
        module_full_name: Option<ModuleFullName>,
        commit_id: Option<CommitId>,
        is_import: bool,
    ) -> Self {
        Self {
            descriptor,
            external_path: external_path.into(),
            module_full_name,
            commit_id,
            is_import,
            is_syntax_unspecified: false,
            unused_dependency_indexes: Vec::new(),
        }
    }

    /// Marks the file as having no `syntax` statement.
    pub fn with_syntax_unspecified(mut self, is_syntax_unspecified: bool) -> Self {
        self.is_syntax_unspecified = is_syntax_unspecified;
        self
    }

    /// Records which imports are unused, as indexes into the descriptor's
    /// dependencies.
    pub fn with_unused_dependency_indexes(mut self, mut indexes: Vec<usize>) -> Self {
        indexes.sort_unstable();
        indexes.dedup();
        self.unused_dependency_indexes = indexes;
        self
    }

    /// The file's path.
    pub fn path(&self) -> &str {
        &self.descriptor.name
    }

    /// The linked descriptor.
    pub fn descriptor(&self) -> &FileDescriptor {
        &self.descriptor
    }

    /// The path to show users.
    pub fn external_path(&self) -> &str {
        &self.external_path
    }

    /// The name of the module the file came from.
    pub fn module_full_name(&self) -> Option<&ModuleFullName> {
        self.module_full_name.as_ref()
    }

    /// The commit of the module the file came from.
    pub fn commit_id(&self) -> Option<&CommitId> {
        self.commit_id.as_ref()
    }

    /// Whether the file is only present because a target imports it.
    pub fn is_import(&self) -> bool {
        self.is_import
    }

    /// Whether the file lacks a `syntax` statement.
    pub fn is_syntax_unspecified(&self) -> bool {
        self.is_syntax_unspecified
    }

    /// Indexes of imports none of whose symbols are used.
    pub fn unused_dependency_indexes(&self) -> &[usize] {
        &self.unused_dependency_indexes
    }
}

/// Compiled files in dependency order: no file precedes a file it imports,
/// and every path appears once.
#[derive(Clone, Debug, Serialize)]
pub struct Image {
    files: Vec<ImageFile>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl Image {
    /// Creates an image, checking that paths are unique and that every
    /// import of a file is either earlier in `files` or absent.
    pub fn new(files: Vec<ImageFile>) -> Result<Self, ImageError> {
        let mut index = HashMap::with_capacity(files.len());
        for (position, file) in files.iter().enumerate() {
            if index.insert(file.path().to_string(), position).is_some() {
                return Err(ImageError::system(format!("duplicate file descriptor: {}", file.path())));
            }
        }
        for (position, file) in files.iter().enumerate() {
            for dependency in &file.descriptor.dependencies {
                if index.get(dependency).is_some_and(|&at| at > position) {
                    return Err(ImageError::system(format!(
                        "{} precedes its import {dependency} in the image",
                        file.path()
                    )));
                }
            }
        }
        Ok(Self { files, index })
    }

    /// All files in order.
    pub fn files(&self) -> &[ImageFile] {
        &self.files
    }

    /// The file at `path`.
    pub fn get_file(&self, path: &str) -> Option<&ImageFile> {
        self.index.get(path).map(|&position| &self.files[position])
    }

    /// The files that are not imports, in order.
    pub fn target_files(&self) -> impl Iterator<Item = &ImageFile> {
        self.files.iter().filter(|file| !file.is_import)
    }

    /// The paths of all files in order.
    pub fn paths(&self) -> Vec<&str> {
        self.files.iter().map(ImageFile::path).collect()
    }

    /// Renders the image as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(name: &str, dependencies: &[&str]) -> FileDescriptor {
        FileDescriptor {
            name: name.to_string(),
            package: String::new(),
            syntax: "schema1".to_string(),
            dependencies: dependencies.iter().map(|d| d.to_string()).collect(),
            public_dependencies: Vec::new(),
            message_types: Vec::new(),
            enum_types: Vec::new(),
            source_code_info: None,
        }
    }

    #[test]
    fn rejects_duplicate_paths() {
        let err = Image::new(vec![
            ImageFile::new(descriptor("a.schema", &[]), "a.schema", None, None, false),
            ImageFile::new(descriptor("a.schema", &[]), "a.schema", None, None, false),
        ])
        .unwrap_err();
        assert!(err.is_system());
        assert!(err.to_string().contains("duplicate file descriptor: a.schema"));
    }

    #[test]
    fn rejects_imports_after_importers() {
        let err = Image::new(vec![
            ImageFile::new(descriptor("a.schema", &["b.schema"]), "a.schema", None, None, false),
            ImageFile::new(descriptor("b.schema", &[]), "b.schema", None, None, true),
        ])
        .unwrap_err();
        assert!(err.is_system());
    }

    #[test]
    fn lookups_and_targets() {
        let image = Image::new(vec![
            ImageFile::new(descriptor("b.schema", &[]), "b.schema", None, None, true),
            ImageFile::new(descriptor("a.schema", &["b.schema"]), "src/a.schema", None, None, false)
                .with_unused_dependency_indexes(vec![0, 0]),
        ])
        .unwrap();
        assert_eq!(image.paths(), vec!["b.schema", "a.schema"]);
        let a = image.get_file("a.schema").unwrap();
        assert_eq!(a.external_path(), "src/a.schema");
        assert_eq!(a.unused_dependency_indexes(), &[0]);
        let targets: Vec<&str> = image.target_files().map(ImageFile::path).collect();
        assert_eq!(targets, vec!["a.schema"]);
        assert!(image.to_json().unwrap().contains("\"is_import\": true"));
    }
}

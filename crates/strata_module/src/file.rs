//! Files within a module and how they are classified.

use std::fmt;
use std::io::{self, Read};
use std::sync::Arc;

use strata_common::Context;
use strata_storage::{MappedBucket, Mapper, Matcher, ReadBucket, ReadObject};

use crate::error::ModuleError;
use crate::module::Module;

/// The extension of schema files.
pub const SCHEMA_FILE_EXT: &str = ".schema";

/// Candidate documentation files, in order of preference.
pub const DOC_FILE_PATHS: [&str; 3] = ["strata.md", "README.md", "README.markdown"];

/// The module license file.
pub const LICENSE_FILE_PATH: &str = "LICENSE";

/// What role a file plays in a module.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum FileType {
    /// A `.schema` file.
    Schema,
    /// The documentation file.
    Doc,
    /// The license file.
    License,
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FileType::Schema => "schema",
            FileType::Doc => "doc",
            FileType::License => "license",
        })
    }
}

/// Classifies a module-relative path by name alone.
pub fn classify_path(path: &str) -> Option<FileType> {
    if strata_common::normalpath::ext(path) == SCHEMA_FILE_EXT {
        Some(FileType::Schema)
    } else if path == LICENSE_FILE_PATH {
        Some(FileType::License)
    } else if DOC_FILE_PATHS.contains(&path) {
        Some(FileType::Doc)
    } else {
        None
    }
}

/// Returns the documentation file `bucket` would use, if any.
pub fn doc_file_path(ctx: &Context, bucket: &dyn ReadBucket) -> Result<Option<&'static str>, ModuleError> {
    for candidate in DOC_FILE_PATHS {
        match bucket.stat(ctx, candidate) {
            Ok(_) => return Ok(Some(candidate)),
            Err(err) if err.is_not_exist() => {}
            Err(err) => return Err(err.into()),
        }
    }
    Ok(None)
}

/// Restricts `delegate` to the files a module is made of: schema files, the
/// license, and at most one documentation file.
pub fn module_files_bucket(
    ctx: &Context,
    delegate: Arc<dyn ReadBucket>,
) -> Result<Arc<dyn ReadBucket>, ModuleError> {
    let mut allowed = vec![
        Matcher::ext(SCHEMA_FILE_EXT),
        Matcher::equal(LICENSE_FILE_PATH),
    ];
    if let Some(doc) = doc_file_path(ctx, delegate.as_ref())? {
        allowed.push(Matcher::equal(doc));
    }
    Ok(Arc::new(MappedBucket::new(
        delegate,
        vec![Mapper::Match(Matcher::Or(allowed))],
    )))
}

/// Metadata about one file in a module.
#[derive(Clone, Debug)]
pub struct FileInfo {
    path: String,
    external_path: String,
    file_type: FileType,
    is_target_file: bool,
    module: Module,
}

impl FileInfo {
    pub(crate) fn new(
        path: String,
        external_path: String,
        file_type: FileType,
        is_target_file: bool,
        module: Module,
    ) -> Self {
        Self {
            path,
            external_path,
            file_type,
            is_target_file,
            module,
        }
    }

    /// The module-relative path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The path to show users.
    pub fn external_path(&self) -> &str {
        &self.external_path
    }

    /// The file's role.
    pub fn file_type(&self) -> FileType {
        self.file_type
    }

    /// Whether the file was selected for output.
    ///
    /// Always `false` when the owning module is not a target.
    pub fn is_target_file(&self) -> bool {
        self.is_target_file
    }

    /// The module the file belongs to.
    pub fn module(&self) -> &Module {
        &self.module
    }
}

/// A readable file together with its metadata.
pub struct ModuleFile {
    info: FileInfo,
    object: ReadObject,
}

impl ModuleFile {
    pub(crate) fn new(info: FileInfo, object: ReadObject) -> Self {
        Self { info, object }
    }

    /// The file's metadata.
    pub fn info(&self) -> &FileInfo {
        &self.info
    }

    /// Reads the whole file as UTF-8 text.
    pub fn read_to_string(mut self) -> Result<String, ModuleError> {
        let mut content = String::new();
        let path = self.info.path.clone();
        self.object.read_to_string(&mut content).map_err(|err| {
            ModuleError::Storage(strata_storage::StorageError::Io {
                path,
                source: Arc::new(err),
            })
        })?;
        Ok(content)
    }
}

impl Read for ModuleFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.object.read(buf)
    }
}

impl fmt::Debug for ModuleFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleFile").field("info", &self.info).finish()
    }
}

/// A named blob carried with a module but not part of its files, such as
/// the configuration file a module directory was read from.
#[derive(Clone, PartialEq, Eq)]
pub struct ObjectData {
    name: String,
    data: Vec<u8>,
}

impl ObjectData {
    /// Wraps `data` under the file name `name`.
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    /// The file name, such as `strata.toml`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The raw bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

impl fmt::Debug for ObjectData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectData")
            .field("name", &self.name)
            .field("len", &self.data.len())
            .finish()
    }
}

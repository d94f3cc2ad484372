//! The module model: modules, their keys and fetched data, and the
//! immutable [`ModuleSet`] a build works on.
//!
//! A [`Module`] is either local, backed by a bucket, or remote, backed by
//! [`ModuleData`] fetched through a [`ModuleDataProvider`]. Remote data is
//! verified against the digest of the [`ModuleKey`] it was requested by
//! before any of it is used. Dependencies between modules are discovered
//! from the import statements of their schema files.

#![warn(missing_docs)]

pub mod bucket;
pub mod builder;
pub mod data;
pub mod error;
pub mod file;
pub mod key;
mod lazy;
pub mod module;
pub mod module_set;
pub mod provider;
pub mod registry;
pub mod store;

pub use bucket::{
    get_doc_file, get_file_infos, get_license_file, get_target_file_infos,
    FilteredModuleReadBucket, ModuleReadBucket, MultiModuleReadBucket, StorageReadBucket,
};
pub use builder::{LocalModuleOptions, ModuleSetBuilder};
pub use data::ModuleData;
pub use error::ModuleError;
pub use file::{
    classify_path, module_files_bucket, FileInfo, FileType, ModuleFile, ObjectData, DOC_FILE_PATHS,
    LICENSE_FILE_PATH, SCHEMA_FILE_EXT,
};
pub use key::ModuleKey;
pub use module::{Module, ModuleDep};
pub use module_set::ModuleSet;
pub use provider::{lazy_module_key, CommitProvider, ModuleDataProvider, NopModuleDataProvider};
pub use registry::MemoryRegistry;
pub use store::{CachedModuleDataProvider, ModuleDataStore};

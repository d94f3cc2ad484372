//! Compiles schema files into an [`Image`].
//!
//! [`build_image`] is the entry point: it takes a self-contained
//! [`ModuleReadBucket`](strata_module::ModuleReadBucket), compiles its
//! target files and everything they import on a thread pool, and returns
//! either an image in dependency order or the compile errors as
//! [`FileAnnotation`](strata_diagnostics::FileAnnotation)s. The [`Compiler`]
//! can also be driven directly.

#![warn(missing_docs)]

pub mod build;
pub mod compiler;
pub mod descriptor;
pub mod error;
pub mod errors;
pub mod image;
mod link;

pub use build::{build_image, BuildImageOptions, BuildOutcome, COMPILE_ANNOTATION_TYPE};
pub use compiler::{CompileOptions, CompileOutput, CompileWarning, CompiledFile, Compiler, FileOrigin};
pub use descriptor::{
    EnumDescriptor, EnumValueDescriptor, FieldDescriptor, FieldType, FileDescriptor,
    MessageDescriptor, SourceCodeInfo, SourceLocation,
};
pub use error::ImageError;
pub use image::{Image, ImageFile};

//! Shared foundational types used across the Strata schema toolchain.
//!
//! This crate provides the system error type, the cancellation [`Context`],
//! the once-memoized [`Memo`] cell, normalized relative path helpers, and the
//! naming types that identify modules on a registry.

#![warn(missing_docs)]

pub mod context;
pub mod memo;
pub mod name;
pub mod normalpath;
pub mod result;

pub use context::{Canceled, Context};
pub use memo::Memo;
pub use name::{CommitId, ModuleFullName, ModuleRef, NameError};
pub use normalpath::PathError;
pub use result::{SystemError, SystemResult};

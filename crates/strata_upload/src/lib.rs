//! Pushing local modules to a registry.
//!
//! [`upload`] turns local modules into one [`UploadRequest`], sends it
//! through an [`UploadClient`], and pairs each returned digest with its
//! module to produce a [`Commit`].

#![warn(missing_docs)]

pub mod client;
pub mod commit;
pub mod error;
pub mod upload;

pub use client::{
    UploadClient, UploadContent, UploadDepRef, UploadFile, UploadRequest, UploadedCommit,
};
pub use commit::Commit;
pub use error::UploadError;
pub use upload::{upload, UploadOptions};

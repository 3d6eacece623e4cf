//! Storage access for job inputs, outputs and bookmarks.
//!
//! A [`StorageLocation`] names a place (`s3://bucket/prefix/` or a local
//! directory); a [`StorageBackend`] binds it to an `object_store`
//! implementation and exposes key-relative list/get/put.

pub mod backend;
pub mod error;
pub mod location;

pub use backend::{ObjectEntry, StorageBackend};
pub use error::StorageError;
pub use location::StorageLocation;

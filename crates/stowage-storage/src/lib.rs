//! Stowage Storage Library
//!
//! This crate provides the object-store abstraction and implementations for
//! Stowage. It includes the `Storage` trait plus S3 and local-filesystem
//! backends.
//!
//! # Object key format
//!
//! Keys are tenant-scoped. All backends use the same layout for consistency:
//!
//! - **Assets**: `{tenant_type}/{tenant_id}/{asset_id}/{relative_path}`
//! - **Temporary batch archives**: `{batch_prefix}/{batch_id}.zip`
//!
//! Keys must not contain `..` or a leading `/`. Key generation is centralized
//! in the `keys` module so all backends stay consistent.

pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

use serde::{Deserialize, Serialize};

/// Storage backend type
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    S3,
    Local,
}

// Re-export commonly used types
pub use factory::create_storage;
pub use keys::{asset_object_key, batch_archive_key};
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use traits::{Storage, StorageError, StorageResult};

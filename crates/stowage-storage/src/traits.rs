//! Storage abstraction trait
//!
//! This module defines the Storage trait that all object-store backends must
//! implement. The trait instance is bound to one bucket; callers never pass
//! bucket names per operation.

use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use sha2::{Digest, Sha256};
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncRead;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid object key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Hex-encoded SHA-256 of a payload. Stored on the asset row as the content
/// checksum; all backends compute it the same way.
pub(crate) fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Object-store abstraction.
///
/// All backends (S3, local filesystem) must implement this trait. The trait
/// must be safe for concurrent use by multiple requests; implementations hold
/// no per-request state.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Upload a payload to `key`. Returns the hex SHA-256 content checksum.
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> StorageResult<String>;

    /// Upload from an async reader (for large payloads). The reader is
    /// consumed until EOF. Returns the hex SHA-256 content checksum.
    async fn put_stream(
        &self,
        key: &str,
        content_type: &str,
        content_length: Option<u64>,
        reader: Pin<Box<dyn AsyncRead + Send + Unpin>>,
    ) -> StorageResult<String>;

    /// Download an object fully into memory.
    async fn get(&self, key: &str) -> StorageResult<Bytes>;

    /// Download an object as a stream of chunks (for large payloads).
    async fn get_stream(
        &self,
        key: &str,
    ) -> StorageResult<Pin<Box<dyn Stream<Item = Result<Bytes, StorageError>> + Send>>>;

    /// Delete an object.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Check if an object exists.
    async fn exists(&self, key: &str) -> StorageResult<bool>;

    /// Size in bytes of an object, if it exists.
    async fn content_length(&self, key: &str) -> StorageResult<u64>;

    /// Generate a presigned GET URL granting time-boxed read access.
    /// Presigned GET URLs honor HTTP range requests, so the same URL serves
    /// both downloads and streaming playback.
    async fn signed_get_url(&self, key: &str, expires_in: Duration) -> StorageResult<String>;

    /// Generate a presigned PUT URL for a direct client upload.
    async fn signed_put_url(
        &self,
        key: &str,
        content_type: &str,
        expires_in: Duration,
    ) -> StorageResult<String>;

    /// Verify the configured bucket is reachable, creating it where the
    /// backend supports that (local filesystem).
    async fn ensure_bucket(&self) -> StorageResult<()>;

    /// The bucket this instance is bound to.
    fn bucket(&self) -> &str;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}

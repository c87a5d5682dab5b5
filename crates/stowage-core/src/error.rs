//! Error types module
//!
//! This module provides the core error types used throughout Stowage. All
//! errors are unified under the `AppError` enum, which can represent database,
//! storage, validation, isolation, and ingestion errors.
//!
//! The `Database` variant and `From<sqlx::Error>` are gated behind the `sqlx`
//! feature. With `default-features = false` the database variant carries a
//! plain message instead.

use std::io;

use uuid::Uuid;

#[cfg(feature = "sqlx")]
use sqlx::Error as SqlxError;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for denials and resource limits
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata for error responses - defines how an error should be presented.
/// This trait allows errors to self-describe their HTTP response characteristics.
pub trait ErrorMetadata {
    /// HTTP status code to return
    fn http_status_code(&self) -> u16;

    /// Machine-readable error code (e.g., "ZIP_BOMB_DETECTED")
    fn error_code(&self) -> &'static str;

    /// Whether this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Client-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Whether details should be hidden in production
    fn is_sensitive(&self) -> bool;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[source] SqlxError),

    #[cfg(not(feature = "sqlx"))]
    #[error("Database error: {0}")]
    Database(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Content validation rejection. Carries the pipeline's stable code so the
    /// boundary layer can surface it verbatim.
    #[error("{message}")]
    Validation {
        code: &'static str,
        message: String,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    /// Asset lookup miss. Also used for cross-tenant reads, which must be
    /// indistinguishable from a genuine miss.
    #[error("Asset not found: {0}")]
    AssetNotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("File too large: {0}")]
    PayloadTooLarge(String),

    #[error("Invalid archive: {0}")]
    InvalidArchive(String),

    #[error("Zip bomb detected: compression ratio {ratio:.1} exceeds limit {limit:.1}")]
    ZipBomb { ratio: f64, limit: f64 },

    #[error("Assets not found: {0:?}")]
    BatchNotFound(Vec<Uuid>),

    #[error("Access denied for assets: {0:?}")]
    BatchAccessDenied(Vec<Uuid>),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

#[cfg(feature = "sqlx")]
impl From<SqlxError> for AppError {
    fn from(err: SqlxError) -> Self {
        AppError::Database(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::Internal(format!("IO error: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InvalidInput(format!("JSON parsing error: {}", err))
    }
}

impl From<uuid::Error> for AppError {
    fn from(err: uuid::Error) -> Self {
        AppError::InvalidInput(format!("UUID parsing error: {}", err))
    }
}

/// Static metadata for each variant: (http_status, error_code, recoverable, sensitive, log_level).
/// Reduces duplication in the ErrorMetadata impl; client_message stays per-variant
/// for dynamic content.
fn app_error_static_metadata(err: &AppError) -> (u16, &'static str, bool, bool, LogLevel) {
    match err {
        AppError::Database(_) => (500, "DATABASE_ERROR", true, true, LogLevel::Error),
        AppError::Storage(_) => (500, "STORAGE_ERROR", true, true, LogLevel::Error),
        AppError::InvalidInput(_) => (400, "INVALID_INPUT", false, false, LogLevel::Debug),
        AppError::Validation { code, .. } => (400, code, false, false, LogLevel::Debug),
        AppError::NotFound(_) => (404, "NOT_FOUND", false, false, LogLevel::Debug),
        AppError::AssetNotFound(_) => (404, "ASSET_NOT_FOUND", false, false, LogLevel::Debug),
        AppError::PermissionDenied(_) => (403, "PERMISSION_DENIED", false, false, LogLevel::Warn),
        AppError::PayloadTooLarge(_) => (413, "FILE_TOO_LARGE", false, false, LogLevel::Debug),
        AppError::InvalidArchive(_) => (400, "INVALID_ZIP_FILE", false, false, LogLevel::Debug),
        AppError::ZipBomb { .. } => (400, "ZIP_BOMB_DETECTED", false, false, LogLevel::Warn),
        AppError::BatchNotFound(_) => (404, "ASSET_NOT_FOUND", false, false, LogLevel::Debug),
        AppError::BatchAccessDenied(_) => (403, "ACCESS_DENIED", false, false, LogLevel::Warn),
        AppError::Unauthorized(_) => (401, "UNAUTHORIZED", false, false, LogLevel::Debug),
        AppError::Internal(_) => (500, "INTERNAL_ERROR", true, true, LogLevel::Error),
        AppError::InternalWithSource { .. } => (500, "INTERNAL_ERROR", true, true, LogLevel::Error),
    }
}

impl AppError {
    /// Get the error type name for detailed error responses
    pub fn error_type(&self) -> &'static str {
        match self {
            AppError::Database(_) => "Database",
            AppError::Storage(_) => "Storage",
            AppError::InvalidInput(_) => "InvalidInput",
            AppError::Validation { .. } => "Validation",
            AppError::NotFound(_) => "NotFound",
            AppError::AssetNotFound(_) => "AssetNotFound",
            AppError::PermissionDenied(_) => "PermissionDenied",
            AppError::PayloadTooLarge(_) => "PayloadTooLarge",
            AppError::InvalidArchive(_) => "InvalidArchive",
            AppError::ZipBomb { .. } => "ZipBomb",
            AppError::BatchNotFound(_) => "BatchNotFound",
            AppError::BatchAccessDenied(_) => "BatchAccessDenied",
            AppError::Unauthorized(_) => "Unauthorized",
            AppError::Internal(_) => "Internal",
            AppError::InternalWithSource { .. } => "Internal",
        }
    }

    /// Get detailed error information including the source chain
    pub fn detailed_message(&self) -> String {
        use std::error::Error;

        let mut details = self.to_string();

        let mut source = self.source();
        let mut depth = 0;
        while let Some(err) = source {
            depth += 1;
            if depth > 5 {
                details.push_str("\n  ... (truncated)");
                break;
            }
            details.push_str(&format!("\n  Caused by: {}", err));
            source = err.source();
        }

        details
    }
}

impl ErrorMetadata for AppError {
    fn http_status_code(&self) -> u16 {
        app_error_static_metadata(self).0
    }

    fn error_code(&self) -> &'static str {
        app_error_static_metadata(self).1
    }

    fn is_recoverable(&self) -> bool {
        app_error_static_metadata(self).2
    }

    fn is_sensitive(&self) -> bool {
        app_error_static_metadata(self).3
    }

    fn log_level(&self) -> LogLevel {
        app_error_static_metadata(self).4
    }

    fn client_message(&self) -> String {
        match self {
            AppError::Database(_) => "Failed to access database".to_string(),
            AppError::Storage(_) => "Failed to access storage".to_string(),
            AppError::InvalidInput(ref msg) => msg.clone(),
            AppError::Validation { ref message, .. } => message.clone(),
            AppError::NotFound(ref msg) => msg.clone(),
            AppError::AssetNotFound(ref msg) => format!("Asset not found: {}", msg),
            AppError::PermissionDenied(_) => "Permission denied".to_string(),
            AppError::PayloadTooLarge(ref msg) => msg.clone(),
            AppError::InvalidArchive(ref msg) => msg.clone(),
            AppError::ZipBomb { .. } => {
                "Archive rejected: entry compression ratio exceeds the allowed limit".to_string()
            }
            AppError::BatchNotFound(ids) => format!(
                "Assets not found: {}",
                ids.iter()
                    .map(|id| id.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            AppError::BatchAccessDenied(ids) => format!(
                "Access denied for assets: {}",
                ids.iter()
                    .map(|id| id.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            AppError::Unauthorized(ref msg) => msg.clone(),
            AppError::Internal(_) => "Internal server error".to_string(),
            AppError::InternalWithSource { .. } => "Internal server error".to_string(),
        }
    }
}

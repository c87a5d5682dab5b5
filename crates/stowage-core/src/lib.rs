//! Stowage Core Library
//!
//! This crate provides the domain models, error types, configuration, and the
//! request-scoped tenant context shared across all Stowage components.

pub mod audit;
pub mod config;
pub mod context;
pub mod directory;
pub mod error;
pub mod models;

// Re-export commonly used types
pub use audit::{AuditSink, MemoryAuditSink, NoOpAuditSink, TracingAuditSink};
pub use config::StowageConfig;
pub use context::{ContextGuard, ScopedContext, TenantContext};
pub use directory::AssetDirectory;
pub use error::{AppError, ErrorMetadata, LogLevel};

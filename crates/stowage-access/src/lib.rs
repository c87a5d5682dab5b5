//! Stowage Access Library
//!
//! Outbound services: the capability URL issuer, the archive ingestion
//! orchestrator, and the batch download service.

pub mod batch;
pub mod ingest;
pub mod issuer;
pub mod telemetry;

// Re-export commonly used types
pub use batch::{BatchDownload, BatchService};
pub use ingest::IngestService;
pub use issuer::{CapabilityUrlIssuer, IssuedUpload, IssuedUrl, UrlOperation};
pub use telemetry::init_telemetry;

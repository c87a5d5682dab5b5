//! Stowage Ingestion Library
//!
//! Everything that touches untrusted upload content: the validation
//! pipeline, magic-byte sniffing, the archive entry filter, the zip
//! extraction engine, and batch archive packaging.

pub mod extract;
pub mod filter;
pub mod package;
pub mod sniff;
pub mod validation;

// Re-export commonly used types
pub use extract::{ExtractedAsset, ExtractionResult, FailedEntry, SkippedEntry, ZipExtractor};
pub use filter::{sanitize_path, should_skip, SkipReason};
pub use package::{ArchivePackager, PackagedArchive};
pub use validation::{safe_filename, validate_file, MAX_FILENAME_LENGTH};

//! Archive extraction engine
//!
//! Single pass over an untrusted zip archive: every entry runs through the
//! filter and the validation pipeline before its bytes reach the object
//! store. Entry-level problems are recorded and iteration continues; a
//! compression-ratio violation aborts the whole extraction, because one
//! adversarial entry invalidates trust in the archive.
//!
//! Uploads happen before metadata persistence. If the caller's persistence
//! step fails afterwards, [`ZipExtractor::rollback`] deletes the uploaded
//! objects best-effort.

use std::io::{Cursor, Read};
use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;
use uuid::Uuid;
use zip::ZipArchive;

use stowage_core::models::TenantType;
use stowage_core::{AppError, StowageConfig};
use stowage_storage::{asset_object_key, Storage};

use crate::filter::{sanitize_path, should_skip, SkipReason};
use crate::sniff;
use crate::validation::{safe_filename, validate_file};

/// Leading bytes handed to signature/executable checks.
const SNIFF_PREFIX_LEN: usize = 512;

/// An entry accepted and uploaded. Carries everything the caller needs to
/// write the metadata row.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractedAsset {
    pub id: Uuid,
    pub object_key: String,
    pub relative_path: String,
    pub file_name: String,
    pub size_bytes: i64,
    pub content_type: String,
    pub checksum: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedEntry {
    pub name: String,
    pub reason: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedEntry {
    pub name: String,
    pub code: &'static str,
    pub message: String,
}

/// Outcome of one archive pass.
#[derive(Debug, Default, Serialize)]
pub struct ExtractionResult {
    pub extracted: Vec<ExtractedAsset>,
    pub skipped: Vec<SkippedEntry>,
    pub failed: Vec<FailedEntry>,
    pub total_bytes: u64,
}

impl ExtractionResult {
    pub fn extracted_count(&self) -> usize {
        self.extracted.len()
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }

    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }
}

/// Outcome of the synchronous per-entry stage, before any upload.
enum EntryStep {
    Prepared(PreparedEntry),
    Skipped(SkippedEntry),
    Failed(FailedEntry),
}

struct PreparedEntry {
    relative_path: String,
    file_name: String,
    content_type: String,
    data: Vec<u8>,
}

pub struct ZipExtractor {
    storage: Arc<dyn Storage>,
    config: StowageConfig,
}

impl ZipExtractor {
    pub fn new(storage: Arc<dyn Storage>, config: StowageConfig) -> Self {
        Self { storage, config }
    }

    /// Extract an archive on behalf of one owner. Accepted entries are
    /// uploaded under `{tenant_type}/{tenant_id}/{asset_id}/{relative_path}`.
    #[tracing::instrument(skip(self, archive), fields(tenant_id = %tenant_id, archive_bytes = archive.len()))]
    pub async fn extract(
        &self,
        tenant_type: TenantType,
        tenant_id: Uuid,
        archive: Bytes,
    ) -> Result<ExtractionResult, AppError> {
        let mut zip = ZipArchive::new(Cursor::new(archive.as_ref()))
            .map_err(|e| AppError::InvalidArchive(format!("unreadable zip container: {}", e)))?;

        let mut result = ExtractionResult::default();
        let mut files_so_far: usize = 0;
        let mut bytes_so_far: u64 = 0;

        for index in 0..zip.len() {
            if files_so_far >= self.config.archive_max_files {
                tracing::warn!(
                    max_files = self.config.archive_max_files,
                    remaining = zip.len() - index,
                    "Archive file cap reached, remaining entries not processed"
                );
                break;
            }
            files_so_far += 1;

            // The zip entry handle is not held across an await: the
            // synchronous stage reads everything it needs and drops it.
            let step = match self.prepare_entry(&mut zip, index, bytes_so_far) {
                Ok(step) => step,
                Err(e) => {
                    // Fatal: a bomb entry or corrupt container poisons the
                    // whole archive, including entries already uploaded.
                    self.rollback(&result).await;
                    return Err(e);
                }
            };
            let prepared = match step {
                EntryStep::Prepared(p) => p,
                EntryStep::Skipped(s) => {
                    result.skipped.push(s);
                    continue;
                }
                EntryStep::Failed(f) => {
                    result.failed.push(f);
                    continue;
                }
            };

            let size = prepared.data.len() as u64;
            let asset_id = Uuid::new_v4();
            let object_key =
                asset_object_key(tenant_type, tenant_id, asset_id, &prepared.relative_path);

            let checksum = match self
                .storage
                .put(&object_key, Bytes::from(prepared.data), &prepared.content_type)
                .await
            {
                Ok(checksum) => checksum,
                Err(e) => {
                    // Storage failures abort the unit of work; clean up what
                    // was already written.
                    tracing::error!(object_key = %object_key, error = %e, "Upload failed during extraction");
                    self.rollback(&result).await;
                    return Err(AppError::Storage(format!(
                        "upload failed for archive entry '{}': {}",
                        prepared.relative_path, e
                    )));
                }
            };

            bytes_so_far += size;
            result.total_bytes += size;
            result.extracted.push(ExtractedAsset {
                id: asset_id,
                object_key,
                relative_path: prepared.relative_path,
                file_name: prepared.file_name,
                size_bytes: size as i64,
                content_type: prepared.content_type,
                checksum,
            });
        }

        tracing::info!(
            extracted = result.extracted_count(),
            skipped = result.skipped_count(),
            failed = result.failed_count(),
            total_bytes = result.total_bytes,
            "Archive extraction finished"
        );
        Ok(result)
    }

    /// Synchronous per-entry stage: caps, filter, bomb check, read, MIME
    /// detection, sanitization, validation.
    fn prepare_entry(
        &self,
        zip: &mut ZipArchive<Cursor<&[u8]>>,
        index: usize,
        bytes_so_far: u64,
    ) -> Result<EntryStep, AppError> {
        let mut entry = zip
            .by_index(index)
            .map_err(|e| AppError::InvalidArchive(format!("unreadable zip entry: {}", e)))?;
        let raw_name = entry.name().to_string();
        let uncompressed = entry.size();
        let compressed = entry.compressed_size();

        if bytes_so_far.saturating_add(uncompressed) > self.config.archive_max_total_bytes {
            return Ok(EntryStep::Failed(FailedEntry {
                name: raw_name,
                code: "TOTAL_SIZE_EXCEEDED",
                message: format!(
                    "entry would push the archive past the {} byte total limit",
                    self.config.archive_max_total_bytes
                ),
            }));
        }

        if let Some(reason) = should_skip(&raw_name) {
            return Ok(EntryStep::Skipped(SkippedEntry {
                name: raw_name,
                reason: reason.as_str(),
            }));
        }

        let ratio = uncompressed as f64 / compressed.max(1) as f64;
        if ratio > self.config.archive_max_compression_ratio {
            tracing::warn!(
                entry = %raw_name,
                ratio,
                limit = self.config.archive_max_compression_ratio,
                "Zip bomb signature, aborting extraction"
            );
            return Err(AppError::ZipBomb {
                ratio,
                limit: self.config.archive_max_compression_ratio,
            });
        }

        // The header sizes checked above are attacker-controlled: allocate
        // nothing up front and never read past the declared size. An entry
        // whose actual bytes disagree with its header fails.
        let mut data = Vec::new();
        entry
            .take(uncompressed.saturating_add(1))
            .read_to_end(&mut data)
            .map_err(|e| AppError::InvalidArchive(format!("corrupt zip entry '{}': {}", raw_name, e)))?;

        if data.len() as u64 != uncompressed {
            return Ok(EntryStep::Failed(FailedEntry {
                name: raw_name,
                code: "CORRUPT_ENTRY",
                message: format!(
                    "entry declares {} bytes but contains {}",
                    uncompressed,
                    data.len()
                ),
            }));
        }

        if data.is_empty() {
            return Ok(EntryStep::Skipped(SkippedEntry {
                name: raw_name,
                reason: SkipReason::EmptyFile.as_str(),
            }));
        }

        let prefix = &data[..data.len().min(SNIFF_PREFIX_LEN)];
        let content_type = sniff::mime_from_extension(&raw_name)
            .or_else(|| sniff::sniff_mime(prefix))
            .unwrap_or("application/octet-stream")
            .to_string();

        let relative_path = match sanitize_path(&raw_name) {
            Ok(path) => path,
            Err(e) => {
                return Ok(EntryStep::Failed(FailedEntry {
                    name: raw_name,
                    code: "INVALID_FILENAME",
                    message: e.to_string(),
                }));
            }
        };
        let (dir_prefix, base) = match relative_path.rsplit_once('/') {
            Some((dir, base)) => (Some(dir.to_string()), base.to_string()),
            None => (None, relative_path.clone()),
        };
        let file_name = safe_filename(&base);
        let relative_path = match &dir_prefix {
            Some(dir) => format!("{}/{}", dir, file_name),
            None => file_name.clone(),
        };

        if let Err(e) = validate_file(
            &file_name,
            &content_type,
            data.len() as i64,
            Some(prefix),
            &self.config,
        ) {
            let (code, message) = match e {
                AppError::Validation { code, message } => (code, message),
                other => ("INVALID_INPUT", other.to_string()),
            };
            return Ok(EntryStep::Failed(FailedEntry {
                name: raw_name,
                code,
                message,
            }));
        }

        Ok(EntryStep::Prepared(PreparedEntry {
            relative_path,
            file_name,
            content_type,
            data,
        }))
    }

    /// Delete every object uploaded for `result`, best-effort. Called when
    /// metadata persistence fails after a successful extraction; individual
    /// delete failures are logged and do not stop the rest.
    pub async fn rollback(&self, result: &ExtractionResult) {
        for asset in &result.extracted {
            if let Err(e) = self.storage.delete(&asset.object_key).await {
                tracing::error!(
                    object_key = %asset.object_key,
                    error = %e,
                    "Rollback delete failed, object may be orphaned"
                );
            }
        }
        tracing::info!(
            objects = result.extracted_count(),
            "Extraction rollback completed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_counts() {
        let mut result = ExtractionResult::default();
        result.skipped.push(SkippedEntry {
            name: ".DS_Store".to_string(),
            reason: SkipReason::SystemFile.as_str(),
        });
        result.failed.push(FailedEntry {
            name: "evil.exe".to_string(),
            code: "DANGEROUS_FILENAME",
            message: "dangerous extension".to_string(),
        });
        assert_eq!(result.extracted_count(), 0);
        assert_eq!(result.skipped_count(), 1);
        assert_eq!(result.failed_count(), 1);
    }
}

//! Archive ingestion service
//!
//! Orchestrates the store-then-record write: extract and upload entries,
//! then persist metadata rows. A persistence failure triggers the
//! extraction engine's rollback so no orphaned objects remain.

use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;

use stowage_core::audit::{AuditAction, AuditEntry, AuditSink};
use stowage_core::models::{Asset, AssetState, TenantType};
use stowage_core::{AppError, AssetDirectory, StowageConfig, TenantContext};
use stowage_ingest::{ExtractionResult, ZipExtractor};
use stowage_storage::Storage;

pub struct IngestService {
    extractor: ZipExtractor,
    directory: Arc<dyn AssetDirectory>,
    audit: Arc<dyn AuditSink>,
    bucket: String,
}

impl IngestService {
    pub fn new(
        storage: Arc<dyn Storage>,
        directory: Arc<dyn AssetDirectory>,
        audit: Arc<dyn AuditSink>,
        config: StowageConfig,
    ) -> Self {
        let bucket = storage.bucket().to_string();
        Self {
            extractor: ZipExtractor::new(storage, config),
            directory,
            audit,
            bucket,
        }
    }

    /// Extract an uploaded archive and persist one asset row per accepted
    /// entry. Entry-level rejections are reported in the result; metadata
    /// persistence is all-or-nothing with object rollback on failure.
    #[tracing::instrument(skip(self, ctx, archive), fields(archive_bytes = archive.len()))]
    pub async fn ingest_archive(
        &self,
        ctx: &TenantContext,
        tenant_type: TenantType,
        archive: Bytes,
    ) -> Result<ExtractionResult, AppError> {
        let tenant_id = ctx
            .tenant_id
            .ok_or_else(|| AppError::Unauthorized("archive upload requires a tenant".to_string()))?;
        let user_id = ctx
            .user_id
            .ok_or_else(|| AppError::Unauthorized("archive upload requires a user".to_string()))?;

        let result = self.extractor.extract(tenant_type, tenant_id, archive).await?;

        for extracted in &result.extracted {
            let now = Utc::now();
            let asset = Asset {
                id: extracted.id,
                tenant_id,
                user_id,
                bucket: self.bucket.clone(),
                object_key: extracted.object_key.clone(),
                file_name: extracted.file_name.clone(),
                size_bytes: extracted.size_bytes,
                content_type: extracted.content_type.clone(),
                checksum: extracted.checksum.clone(),
                state: AssetState::Active,
                created_at: now,
                updated_at: now,
            };
            if let Err(e) = self.directory.create(ctx, asset).await {
                tracing::error!(
                    asset_id = %extracted.id,
                    error = %e,
                    "Metadata persistence failed, rolling back uploaded objects"
                );
                self.extractor.rollback(&result).await;
                return Err(e);
            }
        }

        self.audit
            .record_best_effort(
                AuditEntry::new(AuditAction::ZipUpload)
                    .with_user_id(ctx.user_id)
                    .with_tenant_id(ctx.tenant_id)
                    .with_metadata(serde_json::json!({
                        "extracted": result.extracted_count(),
                        "skipped": result.skipped_count(),
                        "failed": result.failed_count(),
                        "total_bytes": result.total_bytes,
                    })),
            )
            .await;

        Ok(result)
    }
}

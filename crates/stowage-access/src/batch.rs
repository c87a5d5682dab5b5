//! Batch download service
//!
//! Resolves and authorizes a bounded list of asset ids, packages their bytes
//! into one archive on scratch space, uploads it to the temporary batch
//! area, and issues a capability URL for it. Authorization is all-or-nothing
//! and happens before any packaging work, so a rejected request uploads
//! nothing.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use stowage_core::audit::{AuditAction, AuditEntry, AuditSink};
use stowage_core::models::Asset;
use stowage_core::{AppError, AssetDirectory, StowageConfig, TenantContext};
use stowage_ingest::ArchivePackager;
use stowage_storage::{batch_archive_key, Storage};

#[derive(Debug, Clone, Serialize)]
pub struct BatchDownload {
    pub batch_id: Uuid,
    pub url: String,
    pub expires_at: DateTime<Utc>,
    pub entry_count: usize,
    pub archive_bytes: u64,
}

pub struct BatchService {
    directory: Arc<dyn AssetDirectory>,
    storage: Arc<dyn Storage>,
    packager: ArchivePackager,
    audit: Arc<dyn AuditSink>,
    config: StowageConfig,
}

impl BatchService {
    pub fn new(
        directory: Arc<dyn AssetDirectory>,
        storage: Arc<dyn Storage>,
        audit: Arc<dyn AuditSink>,
        config: StowageConfig,
    ) -> Self {
        Self {
            directory,
            packager: ArchivePackager::new(storage.clone()),
            storage,
            audit,
            config,
        }
    }

    /// Package the given assets and issue a download URL for the archive.
    #[tracing::instrument(skip(self, ctx, ids), fields(id_count = ids.len()))]
    pub async fn batch_download(
        &self,
        ctx: &TenantContext,
        ids: &[Uuid],
    ) -> Result<BatchDownload, AppError> {
        if ids.is_empty() {
            return Err(AppError::InvalidInput(
                "batch request must name at least one asset".to_string(),
            ));
        }
        if ids.len() > self.config.batch_max_items {
            return Err(AppError::InvalidInput(format!(
                "batch request exceeds the {} asset limit",
                self.config.batch_max_items
            )));
        }
        let unique: HashSet<Uuid> = ids.iter().copied().collect();
        if unique.len() != ids.len() {
            return Err(AppError::InvalidInput(
                "batch request contains duplicate asset ids".to_string(),
            ));
        }

        let assets = self.resolve_and_authorize(ctx, ids).await?;

        let packaged = self.packager.pack(&assets).await?;
        let batch_id = Uuid::new_v4();
        let archive_key = batch_archive_key(&self.config.batch_tmp_prefix, batch_id);
        let archive_len = packaged.archive_len()?;

        let reader = tokio::fs::File::from_std(packaged.reopen()?);
        self.storage
            .put_stream(
                &archive_key,
                "application/zip",
                Some(archive_len),
                Box::pin(reader),
            )
            .await
            .map_err(|e| AppError::Storage(format!("failed to upload batch archive: {}", e)))?;

        let expires_in = Duration::from_secs(self.config.batch_url_expiry_secs);
        let url = self
            .storage
            .signed_get_url(&archive_key, expires_in)
            .await
            .map_err(|e| AppError::Storage(format!("failed to sign batch url: {}", e)))?;
        let expires_at = Utc::now() + chrono::Duration::from_std(expires_in).unwrap_or_default();

        self.audit
            .record_best_effort(
                AuditEntry::new(AuditAction::BatchDownload)
                    .with_user_id(ctx.user_id)
                    .with_tenant_id(ctx.tenant_id)
                    .with_metadata(serde_json::json!({
                        "batch_id": batch_id,
                        "asset_count": assets.len(),
                        "archive_bytes": archive_len,
                        "expires_in_secs": expires_in.as_secs(),
                    })),
            )
            .await;

        tracing::info!(
            batch_id = %batch_id,
            entries = assets.len(),
            archive_bytes = archive_len,
            "Batch archive issued"
        );
        Ok(BatchDownload {
            batch_id,
            url,
            expires_at,
            entry_count: packaged.entry_count,
            archive_bytes: packaged.total_bytes,
        })
    }

    /// Resolve every id and apply the read permission model to each. Missing
    /// and soft-deleted ids fail the whole request naming exactly those ids;
    /// so do inaccessible ones. Runs before any packaging work.
    async fn resolve_and_authorize(
        &self,
        ctx: &TenantContext,
        ids: &[Uuid],
    ) -> Result<Vec<Asset>, AppError> {
        // Unrestricted lookup: a cross-tenant id must land in the denied
        // list, not silently in the missing list.
        let found = self
            .directory
            .find_many(&TenantContext::system(), ids)
            .await?;

        let mut missing: Vec<Uuid> = Vec::new();
        let mut denied: Vec<Uuid> = Vec::new();
        let mut by_id = std::collections::HashMap::new();
        for asset in found {
            by_id.insert(asset.id, asset);
        }

        let mut assets = Vec::with_capacity(ids.len());
        for id in ids {
            match by_id.remove(id) {
                None => missing.push(*id),
                Some(asset) if !asset.is_active() => missing.push(*id),
                Some(asset) => {
                    let allowed = ctx.is_bypass()
                        || (ctx.tenant_id == Some(asset.tenant_id)
                            && ctx.user_id == Some(asset.user_id));
                    if allowed {
                        assets.push(asset);
                    } else {
                        denied.push(*id);
                    }
                }
            }
        }

        if !missing.is_empty() {
            return Err(AppError::BatchNotFound(missing));
        }
        if !denied.is_empty() {
            self.audit
                .record_best_effort(
                    AuditEntry::new(AuditAction::PermissionDenied)
                        .with_user_id(ctx.user_id)
                        .with_tenant_id(ctx.tenant_id)
                        .with_metadata(serde_json::json!({
                            "reason": "batch_access_denied",
                            "asset_ids": denied,
                        })),
                )
                .await;
            return Err(AppError::BatchAccessDenied(denied));
        }
        Ok(assets)
    }
}

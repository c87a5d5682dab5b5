//! Capability URL issuer
//!
//! Turns an authorized request into a short-lived presigned URL. Download
//! and stream requests run the full permission model; upload requests
//! pre-generate the asset id and object key so the caller can write the
//! metadata row consistently with the path the client will upload to.
//!
//! Denials never reveal cross-tenant existence: a foreign tenant's asset and
//! a missing asset produce the same not-found answer, while the audit trail
//! records the real reason.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use stowage_core::audit::{AuditAction, AuditEntry, AuditSink};
use stowage_core::models::{Asset, TenantType};
use stowage_core::{AppError, AssetDirectory, StowageConfig, TenantContext};
use stowage_storage::{asset_object_key, Storage};

use stowage_ingest::safe_filename;

/// Requested capability kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UrlOperation {
    Download,
    Stream,
    Upload,
}

impl UrlOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            UrlOperation::Download => "download",
            UrlOperation::Stream => "stream",
            UrlOperation::Upload => "upload",
        }
    }
}

/// A granted capability.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedUrl {
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

/// A granted upload capability, with the pre-generated identity of the
/// object the client will create.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedUpload {
    pub url: String,
    pub expires_at: DateTime<Utc>,
    pub asset_id: Uuid,
    pub object_key: String,
}

pub struct CapabilityUrlIssuer {
    directory: Arc<dyn AssetDirectory>,
    storage: Arc<dyn Storage>,
    audit: Arc<dyn AuditSink>,
    config: StowageConfig,
}

impl CapabilityUrlIssuer {
    pub fn new(
        directory: Arc<dyn AssetDirectory>,
        storage: Arc<dyn Storage>,
        audit: Arc<dyn AuditSink>,
        config: StowageConfig,
    ) -> Self {
        Self {
            directory,
            storage,
            audit,
            config,
        }
    }

    fn expiry_for(&self, operation: UrlOperation) -> Duration {
        let secs = match operation {
            UrlOperation::Upload => self.config.upload_url_expiry_secs,
            UrlOperation::Download => self.config.download_url_expiry_secs,
            UrlOperation::Stream => self.config.stream_url_expiry_secs,
        };
        Duration::from_secs(secs)
    }

    /// Issue a presigned PUT URL for a direct client upload.
    ///
    /// No existence check is needed: the object does not exist yet, and the
    /// generated key is collision-free through the fresh asset id.
    #[tracing::instrument(skip(self, ctx, file_name))]
    pub async fn issue_upload(
        &self,
        ctx: &TenantContext,
        tenant_type: TenantType,
        file_name: &str,
        content_type: &str,
    ) -> Result<IssuedUpload, AppError> {
        let tenant_id = ctx
            .tenant_id
            .ok_or_else(|| AppError::Unauthorized("upload requires a tenant".to_string()))?;

        let asset_id = Uuid::new_v4();
        let safe_name = safe_filename(file_name);
        let object_key = asset_object_key(tenant_type, tenant_id, asset_id, &safe_name);

        let expires_in = self.expiry_for(UrlOperation::Upload);
        let url = self
            .storage
            .signed_put_url(&object_key, content_type, expires_in)
            .await
            .map_err(|e| AppError::Storage(format!("failed to sign upload url: {}", e)))?;
        let expires_at = Utc::now() + chrono::Duration::from_std(expires_in).unwrap_or_default();

        self.audit
            .record_best_effort(
                AuditEntry::new(AuditAction::SignedUrlIssued)
                    .with_user_id(ctx.user_id)
                    .with_tenant_id(ctx.tenant_id)
                    .with_asset_id(asset_id)
                    .with_metadata(serde_json::json!({
                        "operation": UrlOperation::Upload.as_str(),
                        "expires_in_secs": expires_in.as_secs(),
                    })),
            )
            .await;

        tracing::info!(asset_id = %asset_id, object_key = %object_key, "Upload URL issued");
        Ok(IssuedUpload {
            url,
            expires_at,
            asset_id,
            object_key,
        })
    }

    /// Issue a presigned GET URL for download. The same URL honors range
    /// requests, which is what [`issue_stream`](Self::issue_stream) relies on.
    pub async fn issue_download(
        &self,
        ctx: &TenantContext,
        asset_id: Uuid,
    ) -> Result<IssuedUrl, AppError> {
        self.issue_read(ctx, asset_id, UrlOperation::Download).await
    }

    /// Issue a presigned GET URL with the longer streaming expiry.
    pub async fn issue_stream(
        &self,
        ctx: &TenantContext,
        asset_id: Uuid,
    ) -> Result<IssuedUrl, AppError> {
        self.issue_read(ctx, asset_id, UrlOperation::Stream).await
    }

    #[tracing::instrument(skip(self, ctx), fields(asset_id = %asset_id, operation = operation.as_str()))]
    async fn issue_read(
        &self,
        ctx: &TenantContext,
        asset_id: Uuid,
        operation: UrlOperation,
    ) -> Result<IssuedUrl, AppError> {
        let asset = self.authorize_read(ctx, asset_id).await?;

        let expires_in = self.expiry_for(operation);
        let url = self
            .storage
            .signed_get_url(&asset.object_key, expires_in)
            .await
            .map_err(|e| AppError::Storage(format!("failed to sign url: {}", e)))?;
        let expires_at = Utc::now() + chrono::Duration::from_std(expires_in).unwrap_or_default();

        self.audit
            .record_best_effort(
                AuditEntry::new(AuditAction::SignedUrlIssued)
                    .with_user_id(ctx.user_id)
                    .with_tenant_id(ctx.tenant_id)
                    .with_asset_id(asset.id)
                    .with_metadata(serde_json::json!({
                        "operation": operation.as_str(),
                        "expires_in_secs": expires_in.as_secs(),
                    })),
            )
            .await;

        tracing::info!(asset_id = %asset.id, operation = operation.as_str(), "Capability URL issued");
        Ok(IssuedUrl { url, expires_at })
    }

    /// Resolve an asset and apply the permission model, in order: elevated
    /// role allowed; same tenant and owning user allowed; same tenant
    /// non-owner denied; different tenant denied and externally
    /// indistinguishable from a miss. Every denial produces one audit entry.
    ///
    /// The lookup runs unrestricted so a cross-tenant request can be audited
    /// as such rather than disappearing into the tenant filter.
    async fn authorize_read(
        &self,
        ctx: &TenantContext,
        asset_id: Uuid,
    ) -> Result<Asset, AppError> {
        let asset = self
            .directory
            .find_active(&TenantContext::system(), asset_id)
            .await?
            .ok_or_else(|| AppError::AssetNotFound(asset_id.to_string()))?;

        if ctx.is_bypass() {
            return Ok(asset);
        }

        if ctx.tenant_id == Some(asset.tenant_id) {
            if ctx.user_id == Some(asset.user_id) {
                return Ok(asset);
            }
            self.audit_denial(ctx, asset_id, "not_owner").await;
            return Err(AppError::PermissionDenied(format!(
                "user {:?} does not own asset {}",
                ctx.user_id, asset_id
            )));
        }

        self.audit_denial(ctx, asset_id, "cross_tenant").await;
        tracing::warn!(
            asset_id = %asset_id,
            context_tenant = ?ctx.tenant_id,
            asset_tenant = %asset.tenant_id,
            "Cross-tenant capability request denied"
        );
        Err(AppError::AssetNotFound(asset_id.to_string()))
    }

    async fn audit_denial(&self, ctx: &TenantContext, asset_id: Uuid, reason: &str) {
        self.audit
            .record_best_effort(
                AuditEntry::new(AuditAction::PermissionDenied)
                    .with_user_id(ctx.user_id)
                    .with_tenant_id(ctx.tenant_id)
                    .with_asset_id(asset_id)
                    .with_metadata(serde_json::json!({ "reason": reason })),
            )
            .await;
    }
}

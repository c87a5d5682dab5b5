//! Audit logging
//!
//! Every access-granting or state-changing operation appends an audit entry.
//! Entries are append-only and best-effort: a failure to record one is logged
//! and never rolls back or fails the operation it describes.
//!
//! The [`AuditSink`] trait decouples services from the persistence mechanism;
//! stowage-db provides the database-backed sink, [`TracingAuditSink`] emits
//! structured events on the `audit` target for log aggregation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Mutex;
use uuid::Uuid;

use crate::error::AppError;

/// Audited operation kinds.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Upload,
    Download,
    Stream,
    Preview,
    SignedUrlIssued,
    BatchDownload,
    ZipUpload,
    PermissionDenied,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Upload => "upload",
            AuditAction::Download => "download",
            AuditAction::Stream => "stream",
            AuditAction::Preview => "preview",
            AuditAction::SignedUrlIssued => "signed_url_issued",
            AuditAction::BatchDownload => "batch_download",
            AuditAction::ZipUpload => "zip_upload",
            AuditAction::PermissionDenied => "permission_denied",
        }
    }
}

/// One append-only audit record.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub action: AuditAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    /// Free-form metadata (expiry, denial reason, entry counts, ...).
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(action: AuditAction) -> Self {
        Self {
            id: Uuid::new_v4(),
            action,
            user_id: None,
            tenant_id: None,
            asset_id: None,
            ip_address: None,
            metadata: serde_json::Value::Null,
            created_at: Utc::now(),
        }
    }

    pub fn with_user_id(mut self, user_id: Option<Uuid>) -> Self {
        self.user_id = user_id;
        self
    }

    pub fn with_tenant_id(mut self, tenant_id: Option<Uuid>) -> Self {
        self.tenant_id = tenant_id;
        self
    }

    pub fn with_asset_id(mut self, asset_id: Uuid) -> Self {
        self.asset_id = Some(asset_id);
        self
    }

    pub fn with_ip_address(mut self, ip: Option<String>) -> Self {
        self.ip_address = ip;
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Destination for audit entries.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, entry: AuditEntry) -> Result<(), AppError>;

    /// Record an entry, swallowing failures. Audit write failures must never
    /// block the operation they describe.
    async fn record_best_effort(&self, entry: AuditEntry) {
        let action = entry.action;
        if let Err(e) = self.record(entry).await {
            tracing::error!(
                target: "audit",
                action = action.as_str(),
                error = %e,
                "Failed to record audit entry"
            );
        }
    }
}

/// Sink that emits structured tracing events on the `audit` target.
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, entry: AuditEntry) -> Result<(), AppError> {
        let json = serde_json::to_string(&entry).unwrap_or_else(|_| "{}".to_string());
        tracing::event!(
            target: "audit",
            tracing::Level::INFO,
            audit_entry = %json,
            action = entry.action.as_str(),
            tenant_id = ?entry.tenant_id,
            user_id = ?entry.user_id,
            asset_id = ?entry.asset_id,
            "Audit log"
        );
        Ok(())
    }
}

/// No-op sink for embedders that handle auditing elsewhere.
pub struct NoOpAuditSink;

#[async_trait]
impl AuditSink for NoOpAuditSink {
    async fn record(&self, _entry: AuditEntry) -> Result<(), AppError> {
        Ok(())
    }
}

/// In-memory sink. Used by tests to assert on recorded entries.
#[derive(Default)]
pub struct MemoryAuditSink {
    entries: Mutex<Vec<AuditEntry>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().expect("audit entries poisoned").clone()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn record(&self, entry: AuditEntry) -> Result<(), AppError> {
        self.entries
            .lock()
            .expect("audit entries poisoned")
            .push(entry);
        Ok(())
    }
}

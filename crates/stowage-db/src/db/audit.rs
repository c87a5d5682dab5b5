//! Audit log repository
//!
//! The `audit_log` table is append-only: this repository exposes insert and
//! read, nothing else. [`DbAuditSink`] adapts it to the [`AuditSink`] trait so
//! services stay decoupled from the persistence choice.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use stowage_core::audit::{AuditEntry, AuditSink};
use stowage_core::AppError;

/// Raw audit row. The action column stores the snake_case action name;
/// reads keep it as a string rather than failing on names written by a
/// newer release.
#[derive(Debug, sqlx::FromRow)]
pub struct AuditLogRow {
    pub id: Uuid,
    pub action: String,
    pub user_id: Option<Uuid>,
    pub tenant_id: Option<Uuid>,
    pub asset_id: Option<Uuid>,
    pub ip_address: Option<String>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct AuditLogRepository {
    pool: PgPool,
}

impl AuditLogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[tracing::instrument(skip(self, entry), fields(db.table = "audit_log", db.operation = "insert", action = entry.action.as_str()))]
    pub async fn append(&self, entry: &AuditEntry) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO audit_log (id, action, user_id, tenant_id, asset_id, ip_address, metadata, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(entry.id)
        .bind(entry.action.as_str())
        .bind(entry.user_id)
        .bind(entry.tenant_id)
        .bind(entry.asset_id)
        .bind(entry.ip_address.as_deref())
        .bind(&entry.metadata)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Most recent entries for a tenant, newest first.
    #[tracing::instrument(skip(self), fields(db.table = "audit_log", db.operation = "select"))]
    pub async fn list_for_tenant(
        &self,
        tenant_id: Uuid,
        limit: i64,
    ) -> Result<Vec<AuditLogRow>, AppError> {
        let rows: Vec<AuditLogRow> = sqlx::query_as::<Postgres, AuditLogRow>(
            r#"
            SELECT id, action, user_id, tenant_id, asset_id, ip_address, metadata, created_at
            FROM audit_log
            WHERE tenant_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(tenant_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Full access history of one asset, oldest first.
    #[tracing::instrument(skip(self), fields(db.table = "audit_log", db.operation = "select"))]
    pub async fn list_for_asset(&self, asset_id: Uuid) -> Result<Vec<AuditLogRow>, AppError> {
        let rows: Vec<AuditLogRow> = sqlx::query_as::<Postgres, AuditLogRow>(
            r#"
            SELECT id, action, user_id, tenant_id, asset_id, ip_address, metadata, created_at
            FROM audit_log
            WHERE asset_id = $1
            ORDER BY created_at
            "#,
        )
        .bind(asset_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

/// Database-backed [`AuditSink`].
#[derive(Clone)]
pub struct DbAuditSink {
    repository: AuditLogRepository,
}

impl DbAuditSink {
    pub fn new(pool: PgPool) -> Self {
        Self {
            repository: AuditLogRepository::new(pool),
        }
    }
}

#[async_trait]
impl AuditSink for DbAuditSink {
    async fn record(&self, entry: AuditEntry) -> Result<(), AppError> {
        self.repository.append(&entry).await
    }
}

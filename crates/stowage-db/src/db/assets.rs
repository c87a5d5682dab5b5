//! Asset repository
//!
//! All reads and writes go through [`AssetRepository`], which applies the
//! tenant predicate from [`super::scope`] on every query. Every statement,
//! reads included, runs inside a transaction whose `stowage.tenant_id`
//! session parameter is set, so the row-security policy checks the same rule
//! a second time even if the query-side predicate is wrong.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgQueryResult;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use uuid::Uuid;

use stowage_core::models::{Asset, AssetState};
use stowage_core::{AppError, AssetDirectory, TenantContext};

use super::scope::{apply_tenant_filter, session_tenant_parameter};

const ASSET_COLUMNS: &str = "id, tenant_id, user_id, bucket, object_key, file_name, \
     size_bytes, content_type, checksum, deleted, deleted_at, created_at, updated_at";

/// Raw database row. Soft delete is stored as a boolean plus timestamp pair
/// (kept consistent by a CHECK constraint); the domain model folds both into
/// [`AssetState`].
#[derive(Debug, sqlx::FromRow)]
pub struct AssetRow {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    pub bucket: String,
    pub object_key: String,
    pub file_name: String,
    pub size_bytes: i64,
    pub content_type: String,
    pub checksum: String,
    pub deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AssetRow {
    pub fn into_asset(self) -> Asset {
        let state = match (self.deleted, self.deleted_at) {
            (true, Some(deleted_at)) => AssetState::Deleted { deleted_at },
            // CHECK constraint makes the half-set pairs unreachable; treat a
            // deleted row without a timestamp as deleted "now" rather than
            // resurrecting it.
            (true, None) => AssetState::Deleted {
                deleted_at: self.updated_at,
            },
            (false, _) => AssetState::Active,
        };
        Asset {
            id: self.id,
            tenant_id: self.tenant_id,
            user_id: self.user_id,
            bucket: self.bucket,
            object_key: self.object_key,
            file_name: self.file_name,
            size_bytes: self.size_bytes,
            content_type: self.content_type,
            checksum: self.checksum,
            state,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Postgres-backed asset metadata repository.
#[derive(Clone)]
pub struct AssetRepository {
    pool: PgPool,
}

impl AssetRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Begin a transaction with the row-security session parameter bound to
    /// the context's effective tenant. `set_config(..., true)` scopes the
    /// setting to this transaction only.
    async fn begin_scoped<'a>(
        &'a self,
        ctx: &TenantContext,
    ) -> Result<Transaction<'a, Postgres>, AppError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SELECT set_config('stowage.tenant_id', $1, TRUE)")
            .bind(session_tenant_parameter(ctx))
            .execute(&mut *tx)
            .await?;
        Ok(tx)
    }

    #[tracing::instrument(skip(self, ctx, asset), fields(db.table = "assets", db.operation = "insert", asset_id = %asset.id))]
    pub async fn create(&self, ctx: &TenantContext, asset: Asset) -> Result<Asset, AppError> {
        if ctx.effective_tenant().is_some_and(|t| t != asset.tenant_id) {
            return Err(AppError::PermissionDenied(format!(
                "context tenant {:?} may not create assets for tenant {}",
                ctx.tenant_id, asset.tenant_id
            )));
        }

        let mut tx = self.begin_scoped(ctx).await?;
        let row: AssetRow = sqlx::query_as::<Postgres, AssetRow>(&format!(
            r#"
            INSERT INTO assets (
                id, tenant_id, user_id, bucket, object_key, file_name,
                size_bytes, content_type, checksum, deleted, deleted_at,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, FALSE, NULL, $10, $11)
            RETURNING {ASSET_COLUMNS}
            "#
        ))
        .bind(asset.id)
        .bind(asset.tenant_id)
        .bind(asset.user_id)
        .bind(&asset.bucket)
        .bind(&asset.object_key)
        .bind(&asset.file_name)
        .bind(asset.size_bytes)
        .bind(&asset.content_type)
        .bind(&asset.checksum)
        .bind(asset.created_at)
        .bind(asset.updated_at)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;

        tracing::info!(
            asset_id = %row.id,
            tenant_id = %row.tenant_id,
            object_key = %row.object_key,
            size_bytes = row.size_bytes,
            "Asset created"
        );
        Ok(row.into_asset())
    }

    #[tracing::instrument(skip(self, ctx), fields(db.table = "assets", db.operation = "select"))]
    pub async fn find_active(
        &self,
        ctx: &TenantContext,
        id: Uuid,
    ) -> Result<Option<Asset>, AppError> {
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {ASSET_COLUMNS} FROM assets WHERE deleted = FALSE AND id = "
        ));
        qb.push_bind(id);
        apply_tenant_filter(&mut qb, ctx, "tenant_id");

        let mut tx = self.begin_scoped(ctx).await?;
        let row: Option<AssetRow> = qb
            .build_query_as::<AssetRow>()
            .fetch_optional(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(row.map(AssetRow::into_asset))
    }

    /// Fetch assets by id regardless of lifecycle state. Ids outside the
    /// context's tenant are absent from the result, not errors.
    #[tracing::instrument(skip(self, ctx, ids), fields(db.table = "assets", db.operation = "select", id_count = ids.len()))]
    pub async fn find_many(
        &self,
        ctx: &TenantContext,
        ids: &[Uuid],
    ) -> Result<Vec<Asset>, AppError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {ASSET_COLUMNS} FROM assets WHERE id = ANY("
        ));
        qb.push_bind(ids.to_vec());
        qb.push(")");
        apply_tenant_filter(&mut qb, ctx, "tenant_id");

        let mut tx = self.begin_scoped(ctx).await?;
        let rows: Vec<AssetRow> = qb.build_query_as::<AssetRow>().fetch_all(&mut *tx).await?;
        tx.commit().await?;
        Ok(rows.into_iter().map(AssetRow::into_asset).collect())
    }

    /// List active assets visible to the context, newest first.
    #[tracing::instrument(skip(self, ctx), fields(db.table = "assets", db.operation = "select"))]
    pub async fn list(
        &self,
        ctx: &TenantContext,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Asset>, AppError> {
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {ASSET_COLUMNS} FROM assets WHERE deleted = FALSE"
        ));
        apply_tenant_filter(&mut qb, ctx, "tenant_id");
        qb.push(" ORDER BY created_at DESC LIMIT ");
        qb.push_bind(limit);
        qb.push(" OFFSET ");
        qb.push_bind(offset);

        let mut tx = self.begin_scoped(ctx).await?;
        let rows: Vec<AssetRow> = qb.build_query_as::<AssetRow>().fetch_all(&mut *tx).await?;
        tx.commit().await?;
        Ok(rows.into_iter().map(AssetRow::into_asset).collect())
    }

    /// Soft-delete an active asset. A miss and a cross-tenant id are both
    /// reported as not found.
    #[tracing::instrument(skip(self, ctx), fields(db.table = "assets", db.operation = "update", asset_id = %id))]
    pub async fn soft_delete(&self, ctx: &TenantContext, id: Uuid) -> Result<(), AppError> {
        let mut tx = self.begin_scoped(ctx).await?;
        let result = self
            .lifecycle_update(&mut tx, ctx, id, true)
            .await?;
        tx.commit().await?;

        if result.rows_affected() == 0 {
            return Err(AppError::AssetNotFound(id.to_string()));
        }
        tracing::info!(asset_id = %id, "Asset soft-deleted");
        Ok(())
    }

    /// Reverse a soft delete.
    #[tracing::instrument(skip(self, ctx), fields(db.table = "assets", db.operation = "update", asset_id = %id))]
    pub async fn restore(&self, ctx: &TenantContext, id: Uuid) -> Result<(), AppError> {
        let mut tx = self.begin_scoped(ctx).await?;
        let result = self
            .lifecycle_update(&mut tx, ctx, id, false)
            .await?;
        tx.commit().await?;

        if result.rows_affected() == 0 {
            return Err(AppError::AssetNotFound(id.to_string()));
        }
        tracing::info!(asset_id = %id, "Asset restored");
        Ok(())
    }

    async fn lifecycle_update(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        ctx: &TenantContext,
        id: Uuid,
        delete: bool,
    ) -> Result<PgQueryResult, AppError> {
        let mut qb = QueryBuilder::<Postgres>::new(if delete {
            "UPDATE assets SET deleted = TRUE, deleted_at = now(), updated_at = now() \
             WHERE deleted = FALSE AND id = "
        } else {
            "UPDATE assets SET deleted = FALSE, deleted_at = NULL, updated_at = now() \
             WHERE deleted = TRUE AND id = "
        });
        qb.push_bind(id);
        apply_tenant_filter(&mut qb, ctx, "tenant_id");
        Ok(qb.build().execute(&mut **tx).await?)
    }

    /// Rename an active asset. Only the display name changes; the object key
    /// is immutable once written.
    #[tracing::instrument(skip(self, ctx, file_name), fields(db.table = "assets", db.operation = "update", asset_id = %id))]
    pub async fn update_name(
        &self,
        ctx: &TenantContext,
        id: Uuid,
        file_name: &str,
    ) -> Result<Asset, AppError> {
        let mut tx = self.begin_scoped(ctx).await?;
        let mut qb = QueryBuilder::<Postgres>::new(
            "UPDATE assets SET file_name = ",
        );
        qb.push_bind(file_name);
        qb.push(", updated_at = now() WHERE deleted = FALSE AND id = ");
        qb.push_bind(id);
        apply_tenant_filter(&mut qb, ctx, "tenant_id");
        qb.push(format!(" RETURNING {ASSET_COLUMNS}"));

        let row: Option<AssetRow> = qb
            .build_query_as::<AssetRow>()
            .fetch_optional(&mut *tx)
            .await?;
        tx.commit().await?;

        row.map(AssetRow::into_asset)
            .ok_or_else(|| AppError::AssetNotFound(id.to_string()))
    }
}

#[async_trait]
impl AssetDirectory for AssetRepository {
    async fn create(&self, ctx: &TenantContext, asset: Asset) -> Result<Asset, AppError> {
        AssetRepository::create(self, ctx, asset).await
    }

    async fn find_active(
        &self,
        ctx: &TenantContext,
        id: Uuid,
    ) -> Result<Option<Asset>, AppError> {
        AssetRepository::find_active(self, ctx, id).await
    }

    async fn find_many(
        &self,
        ctx: &TenantContext,
        ids: &[Uuid],
    ) -> Result<Vec<Asset>, AppError> {
        AssetRepository::find_many(self, ctx, ids).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_row(deleted: bool) -> AssetRow {
        let now = Utc::now();
        AssetRow {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            bucket: "stowage".to_string(),
            object_key: "school/t/a/notes.pdf".to_string(),
            file_name: "notes.pdf".to_string(),
            size_bytes: 2048,
            content_type: "application/pdf".to_string(),
            checksum: "deadbeef".to_string(),
            deleted,
            deleted_at: deleted.then(|| now),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_row_to_active_asset() {
        let asset = sample_row(false).into_asset();
        assert!(asset.is_active());
        assert_eq!(asset.deleted_at(), None);
    }

    #[test]
    fn test_row_to_deleted_asset() {
        let row = sample_row(true);
        let deleted_at = row.deleted_at;
        let asset = row.into_asset();
        assert!(!asset.is_active());
        assert_eq!(asset.deleted_at(), deleted_at);
    }

    #[test]
    fn test_inconsistent_row_stays_deleted() {
        let mut row = sample_row(true);
        row.deleted_at = None;
        let asset = row.into_asset();
        assert!(!asset.is_active());
        assert!(asset.deleted_at().is_some());
    }
}

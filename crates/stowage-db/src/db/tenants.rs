//! Tenant repository
//!
//! Tenants are created administratively and never deleted. Lookups are not
//! tenant-filtered: a tenant row is not itself tenant-scoped data, and the
//! key builder needs the tenant type before any asset row exists.

use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use stowage_core::models::{Tenant, TenantType};
use stowage_core::AppError;

#[derive(Clone)]
pub struct TenantRepository {
    pool: PgPool,
}

impl TenantRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[tracing::instrument(skip(self), fields(db.table = "tenants", db.operation = "insert"))]
    pub async fn create(
        &self,
        name: &str,
        tenant_type: TenantType,
    ) -> Result<Tenant, AppError> {
        if name.trim().is_empty() {
            return Err(AppError::InvalidInput(
                "tenant name must not be empty".to_string(),
            ));
        }

        let tenant: Tenant = sqlx::query_as::<Postgres, Tenant>(
            r#"
            INSERT INTO tenants (name, tenant_type)
            VALUES ($1, $2)
            RETURNING id, name, tenant_type, created_at, updated_at
            "#,
        )
        .bind(name)
        .bind(tenant_type)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(tenant_id = %tenant.id, tenant_type = tenant_type.as_str(), "Tenant created");
        Ok(tenant)
    }

    #[tracing::instrument(skip(self), fields(db.table = "tenants", db.operation = "select"))]
    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<Tenant>, AppError> {
        let tenant: Option<Tenant> = sqlx::query_as::<Postgres, Tenant>(
            "SELECT id, name, tenant_type, created_at, updated_at FROM tenants WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(tenant)
    }

    /// Like [`get_by_id`](Self::get_by_id) but a miss is an error. Callers
    /// building object keys need the tenant to exist.
    pub async fn require(&self, id: Uuid) -> Result<Tenant, AppError> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("tenant {}", id)))
    }

    #[tracing::instrument(skip(self), fields(db.table = "tenants", db.operation = "select"))]
    pub async fn list(&self) -> Result<Vec<Tenant>, AppError> {
        let tenants: Vec<Tenant> = sqlx::query_as::<Postgres, Tenant>(
            "SELECT id, name, tenant_type, created_at, updated_at FROM tenants ORDER BY created_at",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(tenants)
    }
}

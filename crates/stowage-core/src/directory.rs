//! Asset directory trait
//!
//! Trait seam between the access services and the data layer. The stowage-db
//! crate provides the Postgres-backed implementation; tests use in-memory
//! doubles. Every method takes the request's [`TenantContext`] so tenant
//! filtering is applied on each call.

use async_trait::async_trait;
use uuid::Uuid;

use crate::context::TenantContext;
use crate::error::AppError;
use crate::models::Asset;

#[async_trait]
pub trait AssetDirectory: Send + Sync {
    /// Persist a new asset row. The caller owns id/key generation.
    async fn create(&self, ctx: &TenantContext, asset: Asset) -> Result<Asset, AppError>;

    /// Fetch an active (not soft-deleted) asset visible to the context.
    async fn find_active(
        &self,
        ctx: &TenantContext,
        id: Uuid,
    ) -> Result<Option<Asset>, AppError>;

    /// Fetch assets by id regardless of lifecycle state, tenant-filtered.
    /// Missing ids are simply absent from the result.
    async fn find_many(
        &self,
        ctx: &TenantContext,
        ids: &[Uuid],
    ) -> Result<Vec<Asset>, AppError>;
}

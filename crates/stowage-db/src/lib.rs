//! Stowage Database Library
//!
//! Postgres-backed repositories for asset metadata, tenants, and the audit
//! log, plus pool setup and migrations.

pub mod db;

pub use db::{
    AssetRepository, AssetRow, AuditLogRepository, AuditLogRow, DbAuditSink, TenantRepository,
};

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;

use stowage_core::StowageConfig;

/// Connect the pool and run pending migrations.
pub async fn setup_database(config: &StowageConfig) -> Result<PgPool> {
    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_secs(config.db_timeout_seconds))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;

    tracing::info!(
        max_connections = config.db_max_connections,
        "Database connected successfully"
    );

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Database migrations applied");

    Ok(pool)
}

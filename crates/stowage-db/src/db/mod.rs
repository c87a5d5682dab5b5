//! Database repositories for the data access layer
//!
//! Each repository owns one table. Asset queries are tenant-filtered through
//! [`scope`]; the row-security policy in the migrations enforces the same
//! predicate below the application.

pub mod assets;
pub mod audit;
pub mod scope;
pub mod tenants;

pub use assets::{AssetRepository, AssetRow};
pub use audit::{AuditLogRepository, AuditLogRow, DbAuditSink};
pub use scope::{apply_tenant_filter, session_tenant_parameter, tenant_visible, validate_tenant_ownership};
pub use tenants::TenantRepository;

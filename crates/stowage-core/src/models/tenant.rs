use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Tenant type. Immutable after creation; part of every object key.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "tenant_type", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum TenantType {
    Publisher,
    School,
    Library,
}

impl TenantType {
    /// Lowercase form used as the leading object-key segment.
    pub fn as_str(&self) -> &'static str {
        match self {
            TenantType::Publisher => "publisher",
            TenantType::School => "school",
            TenantType::Library => "library",
        }
    }
}

/// Tenant (organization) entity. The isolation boundary: rows owned by one
/// tenant must not be visible to another except for elevated roles.
///
/// Created administratively and never physically deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Tenant {
    pub id: Uuid,
    pub name: String,
    pub tenant_type: TenantType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

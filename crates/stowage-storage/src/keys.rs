//! Shared key generation for storage backends.
//!
//! Asset keys encode ownership: `{tenant_type}/{tenant_id}/{asset_id}/{relative_path}`.
//! Temporary batch archives live under a dedicated prefix with a short lifetime.

use stowage_core::models::TenantType;
use uuid::Uuid;

/// Generate the object key for an asset.
///
/// `relative_path` must already be sanitized (no `..` segments, no leading
/// separator); the ingestion pipeline guarantees this before keys are built.
pub fn asset_object_key(
    tenant_type: TenantType,
    tenant_id: Uuid,
    asset_id: Uuid,
    relative_path: &str,
) -> String {
    format!(
        "{}/{}/{}/{}",
        tenant_type.as_str(),
        tenant_id,
        asset_id,
        relative_path.trim_start_matches('/')
    )
}

/// Generate the object key for a temporary batch archive.
pub fn batch_archive_key(prefix: &str, batch_id: Uuid) -> String {
    format!("{}/{}.zip", prefix.trim_end_matches('/'), batch_id)
}

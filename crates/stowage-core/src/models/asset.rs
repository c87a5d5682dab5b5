use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

/// Asset lifecycle state. Soft delete is a state transition, not a scattered
/// boolean: `Active -> Deleted` via [`Asset::mark_deleted`], `Deleted ->
/// Active` via [`Asset::restore`]. Assets are never hard-deleted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum AssetState {
    Active,
    Deleted { deleted_at: DateTime<Utc> },
}

/// Metadata row for one binary object held in the external object store.
///
/// `object_key` is unique within `bucket` and encodes
/// `{tenant_type}/{tenant_id}/{asset_id}/{relative_path}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Asset {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    pub bucket: String,
    pub object_key: String,
    pub file_name: String,
    pub size_bytes: i64,
    pub content_type: String,
    pub checksum: String,
    pub state: AssetState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Asset {
    pub fn is_active(&self) -> bool {
        matches!(self.state, AssetState::Active)
    }

    pub fn deleted_at(&self) -> Option<DateTime<Utc>> {
        match self.state {
            AssetState::Active => None,
            AssetState::Deleted { deleted_at } => Some(deleted_at),
        }
    }

    /// Transition `Active -> Deleted`. Deleting an already-deleted asset is
    /// rejected so callers cannot silently lose the original deletion time.
    pub fn mark_deleted(&mut self, at: DateTime<Utc>) -> Result<(), AppError> {
        match self.state {
            AssetState::Active => {
                self.state = AssetState::Deleted { deleted_at: at };
                self.updated_at = at;
                Ok(())
            }
            AssetState::Deleted { .. } => Err(AppError::InvalidInput(format!(
                "asset {} is already deleted",
                self.id
            ))),
        }
    }

    /// Transition `Deleted -> Active`.
    pub fn restore(&mut self, at: DateTime<Utc>) -> Result<(), AppError> {
        match self.state {
            AssetState::Deleted { .. } => {
                self.state = AssetState::Active;
                self.updated_at = at;
                Ok(())
            }
            AssetState::Active => Err(AppError::InvalidInput(format!(
                "asset {} is not deleted",
                self.id
            ))),
        }
    }

    pub fn owned_by(&self, user_id: Uuid) -> bool {
        self.user_id == user_id
    }
}

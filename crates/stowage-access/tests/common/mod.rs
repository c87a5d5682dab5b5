//! Shared test doubles and fixtures.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use stowage_core::models::{Asset, AssetState};
use stowage_core::{AppError, AssetDirectory, TenantContext};

/// In-memory asset directory applying the same tenant-visibility rule as the
/// database repository. `fail_create_after` makes the Nth create fail, for
/// rollback tests.
#[derive(Default)]
pub struct MemoryDirectory {
    assets: Mutex<HashMap<Uuid, Asset>>,
    creates: AtomicUsize,
    pub fail_create_after: Option<usize>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_after(n: usize) -> Self {
        Self {
            fail_create_after: Some(n),
            ..Self::default()
        }
    }

    pub fn insert(&self, asset: Asset) {
        self.assets.lock().unwrap().insert(asset.id, asset);
    }

    pub fn get(&self, id: Uuid) -> Option<Asset> {
        self.assets.lock().unwrap().get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.assets.lock().unwrap().len()
    }

    fn visible(ctx: &TenantContext, asset: &Asset) -> bool {
        ctx.effective_tenant()
            .map_or(true, |tenant| tenant == asset.tenant_id)
    }
}

#[async_trait]
impl AssetDirectory for MemoryDirectory {
    async fn create(&self, _ctx: &TenantContext, asset: Asset) -> Result<Asset, AppError> {
        let n = self.creates.fetch_add(1, Ordering::SeqCst);
        if let Some(limit) = self.fail_create_after {
            if n >= limit {
                return Err(AppError::Internal("simulated persistence failure".to_string()));
            }
        }
        self.insert(asset.clone());
        Ok(asset)
    }

    async fn find_active(
        &self,
        ctx: &TenantContext,
        id: Uuid,
    ) -> Result<Option<Asset>, AppError> {
        Ok(self
            .assets
            .lock()
            .unwrap()
            .get(&id)
            .filter(|a| a.is_active() && Self::visible(ctx, a))
            .cloned())
    }

    async fn find_many(
        &self,
        ctx: &TenantContext,
        ids: &[Uuid],
    ) -> Result<Vec<Asset>, AppError> {
        let assets = self.assets.lock().unwrap();
        Ok(ids
            .iter()
            .filter_map(|id| assets.get(id))
            .filter(|a| Self::visible(ctx, a))
            .cloned()
            .collect())
    }
}

pub fn sample_asset(tenant_id: Uuid, user_id: Uuid, file_name: &str) -> Asset {
    let id = Uuid::new_v4();
    let now = Utc::now();
    Asset {
        id,
        tenant_id,
        user_id,
        bucket: "stowage-test".to_string(),
        object_key: format!("school/{}/{}/{}", tenant_id, id, file_name),
        file_name: file_name.to_string(),
        size_bytes: 64,
        content_type: "application/pdf".to_string(),
        checksum: "0".repeat(64),
        state: AssetState::Active,
        created_at: now,
        updated_at: now,
    }
}

//! Domain models

pub mod asset;
pub mod tenant;

pub use asset::{Asset, AssetState};
pub use tenant::{Tenant, TenantType};

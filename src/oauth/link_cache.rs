//! Short-lived storage for vendor identities awaiting linking
//!
//! After a successful vendor callback the vendor identity is parked
//! here under a one-time token. The register/link call redeems the
//! token within the TTL; afterwards the entry simply expires.

use std::sync::Arc;
use std::time::Duration;

use crate::data::{random_token, Cacher};
use crate::error::AppError;

use super::VendorIdentity;

const KEY_PREFIX: &str = "vendor-link:";

#[derive(Clone)]
pub struct VendorLinkCache {
    cache: Arc<dyn Cacher>,
    ttl: Duration,
}

impl VendorLinkCache {
    pub fn new(cache: Arc<dyn Cacher>, ttl: Duration) -> Self {
        Self { cache, ttl }
    }

    /// Park a vendor identity and return the token that redeems it.
    pub async fn save(&self, identity: &VendorIdentity) -> Result<String, AppError> {
        let token = random_token()?;
        let value = serde_json::to_vec(identity)
            .map_err(|e| AppError::Cache(format!("encode vendor identity: {e}")))?;

        self.cache
            .put(&format!("{KEY_PREFIX}{token}"), value, self.ttl)
            .await?;

        Ok(token)
    }

    /// Redeem a token. Unknown or expired tokens are indistinguishable.
    pub async fn retrieve(&self, token: &str) -> Result<VendorIdentity, AppError> {
        let value = self
            .cache
            .get(&format!("{KEY_PREFIX}{token}"))
            .await?
            .ok_or(AppError::InvalidVendorToken)?;

        serde_json::from_slice(&value)
            .map_err(|e| AppError::Cache(format!("decode vendor identity: {e}")))
    }
}

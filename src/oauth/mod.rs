//! Third-party (OAuth) identity vendors
//!
//! A vendor client is an opaque capability: given an authorization code
//! it returns the vendor's user reference. Everything else about the
//! provider protocol stays behind the trait.

mod facebook;
mod link_cache;

pub use facebook::Facebook;
pub use link_cache::VendorLinkCache;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::VendorOauthConfig;
use crate::error::AppError;

/// A vendor's user reference, scoped to that vendor
///
/// Transient: cached briefly to bridge the OAuth callback to the
/// bind/register call, never persisted long-term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorIdentity {
    pub vendor: String,
    #[serde(rename = "id")]
    pub vendor_user_id: String,
    pub access_token: String,
}

/// OAuth provider client
#[async_trait]
pub trait VendorClient: Send + Sync {
    /// Vendor name, e.g. "facebook"
    fn vendor(&self) -> &str;

    /// URL the end user is sent to for authorization
    fn authorize_url(&self, redirect_uri: &str) -> Result<Url, AppError>;

    /// Exchange an authorization code for the vendor's user reference
    async fn authorize(&self, code: &str, redirect_uri: &str)
    -> Result<VendorIdentity, AppError>;
}

/// Build clients for every configured vendor.
pub fn build_vendor_clients(
    oauth: &HashMap<String, VendorOauthConfig>,
    http_client: reqwest::Client,
) -> Result<HashMap<String, Arc<dyn VendorClient>>, AppError> {
    let mut clients: HashMap<String, Arc<dyn VendorClient>> = HashMap::new();

    for (name, options) in oauth {
        match name.as_str() {
            "facebook" => {
                clients.insert(
                    name.clone(),
                    Arc::new(Facebook::new(options.clone(), http_client.clone())),
                );
            }
            other => {
                return Err(AppError::Config(format!(
                    "oauth vendor {:?} is not implemented",
                    other
                )));
            }
        }
    }

    Ok(clients)
}

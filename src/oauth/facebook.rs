//! Facebook OAuth client
//!
//! Manual authorization-code flow:
//! https://developers.facebook.com/docs/facebook-login/guides/advanced/manual-flow

use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use super::{VendorClient, VendorIdentity};
use crate::config::VendorOauthConfig;
use crate::error::AppError;

const AUTH_URL: &str = "https://www.facebook.com/v14.0/dialog/oauth";
const TOKEN_URL: &str = "https://graph.facebook.com/v14.0/oauth/access_token";
const ME_URL: &str = "https://graph.facebook.com/me";

pub struct Facebook {
    options: VendorOauthConfig,
    http_client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct MeResponse {
    id: String,
}

impl Facebook {
    pub fn new(options: VendorOauthConfig, http_client: reqwest::Client) -> Self {
        Self {
            options,
            http_client,
        }
    }

    async fn request_access_token(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<String, AppError> {
        let response: TokenResponse = self
            .http_client
            .get(TOKEN_URL)
            .query(&[
                ("client_id", self.options.client_id.as_str()),
                ("client_secret", self.options.client_secret.as_str()),
                ("redirect_uri", redirect_uri),
                ("code", code),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(response.access_token)
    }

    async fn request_user_id(&self, access_token: &str) -> Result<String, AppError> {
        let response: MeResponse = self
            .http_client
            .get(ME_URL)
            .query(&[("fields", "id"), ("access_token", access_token)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(response.id)
    }
}

#[async_trait]
impl VendorClient for Facebook {
    fn vendor(&self) -> &str {
        "facebook"
    }

    fn authorize_url(&self, redirect_uri: &str) -> Result<Url, AppError> {
        Url::parse_with_params(
            AUTH_URL,
            &[
                ("client_id", self.options.client_id.as_str()),
                ("response_type", "code"),
                ("redirect_uri", redirect_uri),
            ],
        )
        .map_err(|e| AppError::Internal(anyhow::anyhow!("build authorize url: {e}")))
    }

    async fn authorize(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<VendorIdentity, AppError> {
        let access_token = self.request_access_token(code, redirect_uri).await?;
        let vendor_user_id = self.request_user_id(&access_token).await?;

        Ok(VendorIdentity {
            vendor: self.vendor().to_string(),
            vendor_user_id,
            access_token,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authorize_url_carries_client_id_and_redirect() {
        let facebook = Facebook::new(
            VendorOauthConfig {
                client_id: "client-1".to_string(),
                client_secret: "hush".to_string(),
            },
            reqwest::Client::new(),
        );

        let url = facebook.authorize_url("https://app.example.com/callback").unwrap();
        assert_eq!(url.host_str(), Some("www.facebook.com"));

        let query: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert!(query.contains(&("client_id".to_string(), "client-1".to_string())));
        assert!(query.contains(&("response_type".to_string(), "code".to_string())));
        assert!(query.contains(&(
            "redirect_uri".to_string(),
            "https://app.example.com/callback".to_string()
        )));
        // the client secret never appears in the user-facing URL
        assert!(!url.as_str().contains("hush"));
    }
}

//! Vendor identity linking
//!
//! Two halves of the OAuth dance. `verify` turns an authorization code
//! into either an immediate session (the vendor user is already
//! linked) or a one-time vendor token. `link` redeems that token and
//! binds the vendor user to a local identity, creating one if needed.

use std::sync::Arc;

use rand::RngCore;
use rand::rngs::OsRng;
use tracing::info;

use crate::auth::SessionAuthority;
use crate::data::{normalize_email, Database, Identity};
use crate::error::AppError;
use crate::events::{AccountEvent, EventPublisher};
use crate::metrics::SESSIONS_ISSUED_TOTAL;
use crate::oauth::{VendorClient, VendorLinkCache};
use crate::service::AccountService;

/// Result of verifying a vendor authorization code
pub enum VerifyOutcome {
    /// The vendor user is already linked; a session was issued.
    SignedIn {
        identity: Identity,
        session_token: String,
    },
    /// Unknown vendor user; the caller must follow up with a link call.
    NeedsLink { vendor_token: String },
}

pub struct LinkOrchestrator {
    db: Arc<Database>,
    vendor_tokens: VendorLinkCache,
    sessions: Arc<SessionAuthority>,
    publisher: Arc<dyn EventPublisher>,
}

impl LinkOrchestrator {
    pub fn new(
        db: Arc<Database>,
        vendor_tokens: VendorLinkCache,
        sessions: Arc<SessionAuthority>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            db,
            vendor_tokens,
            sessions,
            publisher,
        }
    }

    /// Exchange an authorization code and route by link state.
    pub async fn verify(
        &self,
        client: &dyn VendorClient,
        code: &str,
        redirect_uri: &str,
    ) -> Result<VerifyOutcome, AppError> {
        let vendor_identity = client.authorize(code, redirect_uri).await?;

        let linked_id = self
            .db
            .find_identity_id_by_vendor(&vendor_identity.vendor, &vendor_identity.vendor_user_id)
            .await?;

        match linked_id {
            Some(identity_id) => {
                let mut identity = self
                    .db
                    .find_identity(&identity_id)
                    .await?
                    .ok_or(AppError::IdentityNotFound)?;

                let session_token = self.sessions.generate(&mut identity).await?;
                SESSIONS_ISSUED_TOTAL.with_label_values(&["oauth"]).inc();
                self.publisher.publish(AccountEvent::LoggedIn {
                    identity_id: identity.id.clone(),
                });

                Ok(VerifyOutcome::SignedIn {
                    identity,
                    session_token,
                })
            }
            None => {
                let vendor_token = self.vendor_tokens.save(&vendor_identity).await?;
                Ok(VerifyOutcome::NeedsLink { vendor_token })
            }
        }
    }

    /// Redeem a vendor token and bind its vendor user to an identity.
    ///
    /// With `verify_password` set this binds to the existing account
    /// for `email`; without it a new account is registered under a
    /// random password. Account mutation and link binding commit in one
    /// transaction, so a bind failure never strands a fresh identity.
    pub async fn link(
        &self,
        vendor_token: &str,
        email: &str,
        verify_password: Option<&str>,
    ) -> Result<(Identity, String), AppError> {
        let vendor_identity = self.vendor_tokens.retrieve(vendor_token).await?;

        let mut tx = self.db.begin().await?;

        let (mut identity, registered) = match verify_password {
            Some(password) => {
                let identity = AccountService::authorize_in(&mut *tx, email, password).await?;
                (identity, false)
            }
            None => {
                let email = normalize_email(email);
                if Database::find_identity_by_email_in(&mut *tx, &email)
                    .await?
                    .is_some()
                {
                    return Err(AppError::EmailRegistered);
                }
                let identity =
                    AccountService::create_in(&mut *tx, &email, &throwaway_password()?).await?;
                (identity, true)
            }
        };

        Database::bind_vendor_in(
            &mut *tx,
            &identity.id,
            &vendor_identity.vendor,
            &vendor_identity.vendor_user_id,
        )
        .await?;

        tx.commit().await?;
        info!(
            identity_id = %identity.id,
            vendor = %vendor_identity.vendor,
            registered,
            "vendor identity linked"
        );

        if registered {
            self.publisher.publish(AccountEvent::Registered {
                identity_id: identity.id.clone(),
                email: identity.email.clone(),
            });
        }

        let session_token = self.sessions.generate(&mut identity).await?;
        SESSIONS_ISSUED_TOTAL.with_label_values(&["oauth"]).inc();
        self.publisher.publish(AccountEvent::LoggedIn {
            identity_id: identity.id.clone(),
        });

        Ok((identity, session_token))
    }
}

/// Random password for vendor-only accounts. Never surfaced; the owner
/// can only set a real one through the password-change flow.
fn throwaway_password() -> Result<String, AppError> {
    let mut bytes = [0u8; 24];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| AppError::Randomness(e.to_string()))?;
    Ok(hex::encode(bytes))
}

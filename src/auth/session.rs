//! Session authority
//!
//! Orchestrates the credential store and the token codec: issues,
//! renews, suspends, and validates session tokens. Revocation works by
//! rotating the identity's session salt; the stored salt is the sole
//! source of truth for which tokens are still live.

use std::sync::Arc;

use chrono::Duration;

use super::token::{SessionToken, SessionTokenCodec};
use crate::data::{Database, Identity};
use crate::error::AppError;

pub struct SessionAuthority {
    db: Arc<Database>,
    codec: SessionTokenCodec,
    lifetime: Duration,
    renew_window: Duration,
}

impl SessionAuthority {
    pub fn new(
        db: Arc<Database>,
        codec: SessionTokenCodec,
        lifetime: Duration,
        renew_window: Duration,
    ) -> Self {
        Self {
            db,
            codec,
            lifetime,
            renew_window,
        }
    }

    pub fn renew_window(&self) -> Duration {
        self.renew_window
    }

    /// Issue a fresh session token for an identity.
    ///
    /// Suspends first: every fresh login rotates the session salt and
    /// so invalidates all of the identity's other outstanding sessions.
    pub async fn generate(&self, identity: &mut Identity) -> Result<String, AppError> {
        self.suspend(identity).await?;
        self.renew(identity)
    }

    /// Build a token against the current session salt.
    ///
    /// Touches no persisted state, so renewing one session never
    /// invalidates the identity's other concurrent sessions.
    pub fn renew(&self, identity: &Identity) -> Result<String, AppError> {
        let token = SessionToken::new(identity.id.clone(), self.lifetime);
        self.codec.encode(&token, &identity.session_salt)
    }

    /// Invalidate all outstanding sessions for an identity.
    pub async fn suspend(&self, identity: &mut Identity) -> Result<(), AppError> {
        identity.refresh_session_salt()?;
        self.db.update_identity(identity).await?;
        Ok(())
    }

    /// Resolve a token payload back to its identity.
    ///
    /// Verifies the signature by re-encoding with the salt on record; a
    /// mismatch (suspended session or tampered payload) is
    /// `InvalidSignature`, distinct from a structurally broken payload.
    /// Expiry is NOT checked here; that is the caller's step.
    pub async fn retrieve(&self, payload: &str) -> Result<(Identity, SessionToken), AppError> {
        let token = self.codec.decode(payload)?;

        let identity = self
            .db
            .find_identity(&token.identity_id)
            .await?
            .ok_or(AppError::IdentityNotFound)?;

        if self.codec.encode(&token, &identity.session_salt)? != payload {
            return Err(AppError::InvalidSignature);
        }
        Ok((identity, token))
    }
}

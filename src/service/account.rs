//! Password-based account flows
//!
//! Registration, login, password change, logout. Each flow here maps
//! one-to-one onto an HTTP operation.

use std::sync::Arc;

use sqlx::SqliteExecutor;
use tracing::info;

use crate::auth::SessionAuthority;
use crate::data::{normalize_email, Database, Identity};
use crate::error::AppError;
use crate::events::{AccountEvent, EventPublisher};
use crate::metrics::SESSIONS_ISSUED_TOTAL;

pub struct AccountService {
    db: Arc<Database>,
    sessions: Arc<SessionAuthority>,
    publisher: Arc<dyn EventPublisher>,
}

impl AccountService {
    pub fn new(
        db: Arc<Database>,
        sessions: Arc<SessionAuthority>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            db,
            sessions,
            publisher,
        }
    }

    /// Check an email/password pair against the store.
    ///
    /// Unknown email and wrong password stay distinct kinds here; the
    /// HTTP boundary collapses both into one unauthorized response.
    pub async fn authorize(&self, email: &str, password: &str) -> Result<Identity, AppError> {
        Self::authorize_in(self.db.pool(), email, password).await
    }

    pub(crate) async fn authorize_in<'e>(
        executor: impl SqliteExecutor<'e>,
        email: &str,
        password: &str,
    ) -> Result<Identity, AppError> {
        let email = normalize_email(email);
        let identity = Database::find_identity_by_email_in(executor, &email)
            .await?
            .ok_or(AppError::IdentityNotFound)?;

        if !identity.compare_password(password) {
            return Err(AppError::WrongPassword);
        }
        Ok(identity)
    }

    /// Validate and persist a brand-new identity.
    pub(crate) async fn create_in<'e>(
        executor: impl SqliteExecutor<'e>,
        email: &str,
        password: &str,
    ) -> Result<Identity, AppError> {
        let identity = Identity::create(email, password)?;
        Database::create_identity_in(executor, &identity).await?;
        Ok(identity)
    }

    /// Register a new identity and sign it in.
    pub async fn register(&self, email: &str, password: &str) -> Result<(Identity, String), AppError> {
        let mut identity = Self::create_in(self.db.pool(), email, password).await?;
        info!(identity_id = %identity.id, "identity registered");

        self.publisher.publish(AccountEvent::Registered {
            identity_id: identity.id.clone(),
            email: identity.email.clone(),
        });

        let token = self.sessions.generate(&mut identity).await?;
        SESSIONS_ISSUED_TOTAL.with_label_values(&["register"]).inc();
        self.publisher.publish(AccountEvent::LoggedIn {
            identity_id: identity.id.clone(),
        });

        Ok((identity, token))
    }

    /// Sign in with email and password.
    ///
    /// Issuing goes through `generate`, so a successful login revokes
    /// the identity's other outstanding sessions.
    pub async fn login(&self, email: &str, password: &str) -> Result<(Identity, String), AppError> {
        let mut identity = self.authorize(email, password).await?;

        let token = self.sessions.generate(&mut identity).await?;
        SESSIONS_ISSUED_TOTAL.with_label_values(&["password"]).inc();
        self.publisher.publish(AccountEvent::LoggedIn {
            identity_id: identity.id.clone(),
        });

        Ok((identity, token))
    }

    /// Change the password after verifying the current one.
    ///
    /// Sessions stay valid: only the password salt rotates, the session
    /// salt is untouched.
    pub async fn change_password(
        &self,
        identity: &mut Identity,
        current: &str,
        new: &str,
    ) -> Result<(), AppError> {
        if !identity.compare_password(current) {
            return Err(AppError::WrongPassword);
        }
        identity.set_password(new)?;
        self.db.update_identity(identity).await?;
        Ok(())
    }

    /// Revoke every outstanding session for the identity.
    pub async fn logout(&self, identity: &mut Identity) -> Result<(), AppError> {
        self.sessions.suspend(identity).await
    }
}

//! Data models
//!
//! The Identity domain object plus the rows it persists to.
//! All models use ULID for IDs and chrono for timestamps.

use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use rand::RngCore;
use rand::rngs::OsRng;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::AppError;

// =============================================================================
// ID Types
// =============================================================================

/// Entity ID wrapper (ULID format, 26 characters)
///
/// Example: "01ARZ3NDEKTSV4RRFFQ69G5FAV"
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub String);

impl EntityId {
    /// Generate a new ULID
    pub fn new() -> Self {
        Self(ulid::Ulid::new().to_string())
    }

    /// Create from existing string
    pub fn from_string(s: String) -> Self {
        Self(s)
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Identity
// =============================================================================

lazy_static! {
    /// RFC-5322-ish shape check; uniqueness is a store concern.
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)+$"
    )
    .expect("email regex compiles");
}

/// Normalize a raw email input: trim and lowercase.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// A local account
///
/// Carries two independent random salts: `password_salt` feeds the
/// password hash so equal passwords never collide across accounts,
/// `session_salt` signs session tokens and rotating it is the sole
/// revocation mechanism for outstanding sessions.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Identity {
    pub id: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    #[serde(skip_serializing, default)]
    pub password_salt: String,
    #[serde(skip_serializing, default)]
    pub session_salt: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Identity {
    /// Construct a new identity with a validated email and password.
    ///
    /// The session salt is seeded here; every login rotates it again.
    pub fn create(email: &str, password: &str) -> Result<Self, AppError> {
        let now = Utc::now();
        let mut identity = Self {
            id: EntityId::new().0,
            email: String::new(),
            password_hash: String::new(),
            password_salt: String::new(),
            session_salt: String::new(),
            created_at: now,
            updated_at: now,
        };
        identity.set_email(email)?;
        identity.set_password(password)?;
        identity.refresh_session_salt()?;
        Ok(identity)
    }

    /// Normalize and validate the email, then store it.
    pub fn set_email(&mut self, email: &str) -> Result<(), AppError> {
        let email = normalize_email(email);
        if !EMAIL_REGEX.is_match(&email) {
            return Err(AppError::InvalidEmail);
        }
        self.email = email;
        Ok(())
    }

    /// Set a new password.
    ///
    /// A fresh password salt is generated first; hash and salt are only
    /// written together, so a salt-generation failure leaves the old
    /// credential intact.
    pub fn set_password(&mut self, password: &str) -> Result<(), AppError> {
        let password = password.trim();
        if password.is_empty() {
            return Err(AppError::EmptyPassword);
        }

        let salt = new_salt(SALT_BYTES)?;
        self.password_hash = hash_password(password, &salt);
        self.password_salt = salt;
        Ok(())
    }

    /// Verify a candidate password against the stored hash.
    ///
    /// An empty candidate is rejected without hashing. The comparison is
    /// between two fixed-width hex digests.
    pub fn compare_password(&self, password: &str) -> bool {
        !password.is_empty() && self.password_hash == hash_password(password, &self.password_salt)
    }

    /// Replace the session salt, invalidating every outstanding session
    /// token signed with the previous one.
    pub fn refresh_session_salt(&mut self) -> Result<(), AppError> {
        self.session_salt = new_salt(SALT_BYTES)?;
        Ok(())
    }
}

const SALT_BYTES: usize = 8;

/// Fixed-width random bytes, hex-encoded.
fn new_salt(length: usize) -> Result<String, AppError> {
    let mut data = vec![0u8; length];
    OsRng
        .try_fill_bytes(&mut data)
        .map_err(|e| AppError::Randomness(e.to_string()))?;
    Ok(hex::encode(data))
}

fn hash_password(password: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hasher.update(salt.as_bytes());
    hex::encode(hasher.finalize())
}

/// Opaque random token for short-lived cache keys.
///
/// Not derived from any identity so the token leaks nothing about the
/// vendor user it maps to.
pub fn random_token() -> Result<String, AppError> {
    new_salt(16)
}

// =============================================================================
// Vendor Link
// =============================================================================

/// Persisted association between a local identity and a vendor user
///
/// Composite key `(identity_id, vendor)`; rebinding upserts in place.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct VendorLink {
    pub identity_id: String,
    pub vendor: String,
    pub vendor_user_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

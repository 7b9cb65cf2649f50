//! Session token codec
//!
//! Token format: base64url("<identity_id>,<expire_unix>:<hex_signature>")
//! where the signature is HMAC-SHA256 over the payload, keyed with the
//! server secret concatenated with the identity's session salt.
//!
//! The codec is a pure encode/decode pair. Decoding alone does NOT
//! verify the signature (the salt lives in the credential store); the
//! session authority verifies by re-encoding with the salt on record
//! and comparing the strings.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::AppError;

type HmacSha256 = Hmac<Sha256>;

/// Decoded session token
///
/// A transient value, never persisted. Only valid while the session
/// salt it was signed with is still the one stored for `identity_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionToken {
    pub identity_id: String,
    /// Absolute expiry, unix seconds
    pub expire: i64,
}

impl SessionToken {
    /// Build a token for an identity expiring `lifetime` from now.
    pub fn new(identity_id: String, lifetime: Duration) -> Self {
        Self {
            identity_id,
            expire: (Utc::now() + lifetime).timestamp(),
        }
    }

    fn expire_time(&self) -> Option<DateTime<Utc>> {
        if self.expire > 0 {
            DateTime::from_timestamp(self.expire, 0)
        } else {
            None
        }
    }

    /// Check if the token is past its expiry
    ///
    /// A missing or non-positive expiry counts as expired.
    pub fn is_expired(&self) -> bool {
        match self.expire_time() {
            Some(t) => t < Utc::now(),
            None => true,
        }
    }

    /// Whether the expiry falls inside the renewal window, signalling
    /// the caller to mint a replacement without re-authentication.
    pub fn need_renew(&self, window: Duration) -> bool {
        match self.expire_time() {
            Some(t) => t < Utc::now() + window,
            None => false,
        }
    }
}

/// Signs and parses session token strings
///
/// Holds the per-deployment secret; the per-identity session salt is
/// supplied per call.
#[derive(Clone)]
pub struct SessionTokenCodec {
    secret: String,
}

impl SessionTokenCodec {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Serialize and sign a token.
    ///
    /// The result is opaque to callers; nothing outside this module
    /// should parse it.
    pub fn encode(&self, token: &SessionToken, salt: &str) -> Result<String, AppError> {
        let payload = format!("{},{}", token.identity_id, token.expire);
        let signature = self.sign(&payload, salt)?;

        Ok(URL_SAFE_NO_PAD.encode(format!("{}:{}", payload, signature)))
    }

    /// Parse a token string without verifying its signature.
    ///
    /// Any structural defect surfaces as `InvalidSessionToken`.
    pub fn decode(&self, payload: &str) -> Result<SessionToken, AppError> {
        let raw = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| AppError::InvalidSessionToken)?;
        let raw = String::from_utf8(raw).map_err(|_| AppError::InvalidSessionToken)?;

        let (payload, _signature) = raw.split_once(':').ok_or(AppError::InvalidSessionToken)?;
        let (id, expire) = payload.split_once(',').ok_or(AppError::InvalidSessionToken)?;

        let identity_id = ulid::Ulid::from_string(id)
            .map_err(|_| AppError::InvalidSessionToken)?
            .to_string();
        let expire: i64 = expire.parse().map_err(|_| AppError::InvalidSessionToken)?;

        Ok(SessionToken {
            identity_id,
            expire,
        })
    }

    fn sign(&self, payload: &str, salt: &str) -> Result<String, AppError> {
        let key = format!("{}{}", self.secret, salt);
        let mut mac = HmacSha256::new_from_slice(key.as_bytes())
            .map_err(|e| AppError::Internal(anyhow::anyhow!("build token mac: {e}")))?;
        mac.update(payload.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::EntityId;

    fn codec() -> SessionTokenCodec {
        SessionTokenCodec::new("test-secret-key-32-bytes-long!!!")
    }

    #[test]
    fn encode_decode_round_trip() {
        let token = SessionToken::new(EntityId::new().0, Duration::days(30));
        let payload = codec().encode(&token, "0011223344556677").unwrap();
        assert!(!payload.is_empty());

        let decoded = codec().decode(&payload).unwrap();
        assert_eq!(decoded, token);

        // Re-encoding with the same salt reproduces the payload exactly.
        let again = codec().encode(&decoded, "0011223344556677").unwrap();
        assert_eq!(again, payload);
    }

    #[test]
    fn round_trip_with_zero_expiry() {
        let token = SessionToken {
            identity_id: EntityId::new().0,
            expire: 0,
        };
        let payload = codec().encode(&token, "0011223344556677").unwrap();
        let decoded = codec().decode(&payload).unwrap();
        assert_eq!(decoded, token);
    }

    #[test]
    fn different_salts_sign_differently() {
        let token = SessionToken::new(EntityId::new().0, Duration::days(30));
        let a = codec().encode(&token, "aaaaaaaaaaaaaaaa").unwrap();
        let b = codec().encode(&token, "bbbbbbbbbbbbbbbb").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn different_secrets_sign_differently() {
        let token = SessionToken::new(EntityId::new().0, Duration::days(30));
        let a = codec().encode(&token, "0011223344556677").unwrap();
        let b = SessionTokenCodec::new("another-secret-key-32-bytes-long")
            .encode(&token, "0011223344556677")
            .unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn decode_rejects_malformed_payloads() {
        let c = codec();

        // not base64
        assert!(matches!(
            c.decode("%%%"),
            Err(AppError::InvalidSessionToken)
        ));
        // missing signature separator
        let no_sig = URL_SAFE_NO_PAD.encode("abc,123");
        assert!(matches!(
            c.decode(&no_sig),
            Err(AppError::InvalidSessionToken)
        ));
        // missing expiry separator
        let no_expire = URL_SAFE_NO_PAD.encode("abc:deadbeef");
        assert!(matches!(
            c.decode(&no_expire),
            Err(AppError::InvalidSessionToken)
        ));
        // bad identity id
        let bad_id = URL_SAFE_NO_PAD.encode("not-a-ulid,123:deadbeef");
        assert!(matches!(
            c.decode(&bad_id),
            Err(AppError::InvalidSessionToken)
        ));
        // bad expiry integer
        let bad_expire = URL_SAFE_NO_PAD.encode(format!("{},soon:deadbeef", EntityId::new().0));
        assert!(matches!(
            c.decode(&bad_expire),
            Err(AppError::InvalidSessionToken)
        ));
    }

    #[test]
    fn expiry_boundaries() {
        let now = Utc::now().timestamp();

        let past = SessionToken {
            identity_id: EntityId::new().0,
            expire: now - 1,
        };
        assert!(past.is_expired());

        let future = SessionToken {
            identity_id: EntityId::new().0,
            expire: now + 1,
        };
        assert!(!future.is_expired());

        let zero = SessionToken {
            identity_id: EntityId::new().0,
            expire: 0,
        };
        assert!(zero.is_expired());
        assert!(!zero.need_renew(Duration::days(7)));
    }

    #[test]
    fn renewal_window_boundaries() {
        let window = Duration::days(7);
        let now = Utc::now().timestamp();

        let inside = SessionToken {
            identity_id: EntityId::new().0,
            expire: now + window.num_seconds() - 60,
        };
        assert!(inside.need_renew(window));
        assert!(!inside.is_expired());

        let outside = SessionToken {
            identity_id: EntityId::new().0,
            expire: now + window.num_seconds() + 60,
        };
        assert!(!outside.need_renew(window));
    }
}

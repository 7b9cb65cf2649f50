//! Error types for Doorman
//!
//! All errors in the application are converted to `AppError`,
//! which implements `IntoResponse` for proper HTTP error responses.
//!
//! Authentication failures are deliberately collapsed at the HTTP
//! boundary: a missing identity and a wrong password both surface as a
//! generic 401 so callers cannot probe which emails are registered.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Application-wide error type
#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed email address (400)
    #[error("invalid email")]
    InvalidEmail,

    /// Empty or whitespace-only password (400)
    #[error("empty password")]
    EmptyPassword,

    /// Generic request validation error (400)
    #[error("validation error: {0}")]
    Validation(String),

    /// No identity for the given id/email (401 at the boundary)
    #[error("identity not found")]
    IdentityNotFound,

    /// Password verification failed (401 at the boundary)
    #[error("wrong password")]
    WrongPassword,

    /// Email is already bound to an identity (409)
    #[error("email has been registered")]
    EmailRegistered,

    /// Structurally invalid session token payload (401)
    #[error("invalid session token")]
    InvalidSessionToken,

    /// Session token signature does not match the salt on record (401)
    #[error("invalid token signature")]
    InvalidSignature,

    /// Session token past its expiry (401)
    #[error("session token expired")]
    SessionTokenExpired,

    /// Unknown or expired vendor link token (401)
    #[error("invalid vendor token")]
    InvalidVendorToken,

    /// Requested OAuth vendor is not configured (404)
    #[error("unsupported oauth vendor: {0}")]
    UnsupportedVendor(String),

    /// Entropy source failure while generating a salt (500)
    ///
    /// Fatal to the single operation, never to the process.
    #[error("randomness unavailable: {0}")]
    Randomness(String),

    /// Database error (500)
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Cache transport error (500)
    #[error("cache error: {0}")]
    Cache(String),

    /// Vendor HTTP endpoint error (502)
    #[error("vendor request error: {0}")]
    Vendor(#[from] reqwest::Error),

    /// Configuration error (500)
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal server error (500)
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl AppError {
    /// Whether this error is an authentication failure that must be
    /// indistinguishable from the others of its kind at the boundary.
    fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            AppError::IdentityNotFound
                | AppError::WrongPassword
                | AppError::InvalidSessionToken
                | AppError::InvalidSignature
                | AppError::SessionTokenExpired
                | AppError::InvalidVendorToken
        )
    }
}

impl IntoResponse for AppError {
    /// Convert error to HTTP response
    ///
    /// Maps each error variant to appropriate HTTP status code
    /// and JSON error body.
    fn into_response(self) -> Response {
        use axum::Json;

        let (status, error_message, error_type) = if self.is_auth_failure() {
            // Collapsed: internal kinds stay distinct, callers see one shape.
            (
                StatusCode::UNAUTHORIZED,
                "authentication failed".to_string(),
                "unauthorized",
            )
        } else {
            match &self {
                AppError::InvalidEmail => (StatusCode::BAD_REQUEST, self.to_string(), "validation"),
                AppError::EmptyPassword => {
                    (StatusCode::BAD_REQUEST, self.to_string(), "validation")
                }
                AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone(), "validation"),
                AppError::EmailRegistered => (StatusCode::CONFLICT, self.to_string(), "conflict"),
                AppError::UnsupportedVendor(_) => {
                    (StatusCode::NOT_FOUND, self.to_string(), "not_found")
                }
                AppError::Vendor(_) => (StatusCode::BAD_GATEWAY, self.to_string(), "vendor"),
                AppError::Database(_) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "database error".to_string(),
                    "database",
                ),
                AppError::Cache(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone(), "cache"),
                AppError::Randomness(_) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                    "randomness",
                ),
                AppError::Config(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone(), "config"),
                AppError::Internal(_) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                    "internal",
                ),
                _ => unreachable!("auth failures handled above"),
            }
        };

        // Record error metric
        use crate::metrics::ERRORS_TOTAL;
        ERRORS_TOTAL.with_label_values(&[error_type]).inc();

        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let body = Json(serde_json::json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_failures_collapse_to_one_response_shape() {
        let kinds = [
            AppError::IdentityNotFound,
            AppError::WrongPassword,
            AppError::InvalidSessionToken,
            AppError::InvalidSignature,
            AppError::SessionTokenExpired,
        ];

        for error in kinds {
            let response = error.into_response();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        }
    }

    #[test]
    fn conflict_and_validation_stay_distinct() {
        assert_eq!(
            AppError::EmailRegistered.into_response().status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::InvalidEmail.into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::EmptyPassword.into_response().status(),
            StatusCode::BAD_REQUEST
        );
    }
}

//! Authentication and session credentials
//!
//! Handles:
//! - Session token encode/decode/sign
//! - Session issue/renew/suspend/validate
//! - Authentication middleware

mod middleware;
mod session;
mod token;

pub use middleware::{CurrentIdentity, MaybeIdentity, SESSION_COOKIE, require_auth};
pub use session::SessionAuthority;
pub use token::{SessionToken, SessionTokenCodec};

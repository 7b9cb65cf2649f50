//! Authentication middleware
//!
//! Protects routes that require a valid session token, and transparently
//! renews tokens that are close to their expiry.

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts, State},
    http::{HeaderMap, HeaderValue, Request, header::SET_COOKIE, request::Parts},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::CookieJar;

use crate::AppState;
use crate::data::Identity;
use crate::error::AppError;

/// Session cookie name
pub const SESSION_COOKIE: &str = "session";

fn extract_token_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(ToOwned::to_owned)
        .or_else(|| {
            let jar = CookieJar::from_headers(headers);
            jar.get(SESSION_COOKIE)
                .map(|cookie| cookie.value().to_owned())
        })
}

/// Resolve a token payload to its identity.
///
/// Returns the identity and, when the token sits inside the renewal
/// window, a replacement payload to hand back to the client. Renewal
/// never rotates the signing salt, so the identity's other concurrent
/// sessions stay valid.
async fn authenticate_token(
    token: &str,
    state: &AppState,
) -> Result<(Identity, Option<String>), AppError> {
    let (identity, session_token) = state.sessions.retrieve(token).await?;

    if session_token.is_expired() {
        return Err(AppError::SessionTokenExpired);
    }

    let renewed = if session_token.need_renew(state.sessions.renew_window()) {
        crate::metrics::SESSIONS_RENEWED_TOTAL
            .with_label_values(&["middleware"])
            .inc();
        Some(state.sessions.renew(&identity)?)
    } else {
        None
    };

    Ok((identity, renewed))
}

/// Middleware to require authentication
///
/// Extracts and verifies the session token from cookie or Authorization
/// header, adds [`CurrentIdentity`] to request extensions, and writes a
/// refreshed session cookie when the token was due for renewal.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_token_from_headers(request.headers()).ok_or(AppError::IdentityNotFound)?;

    let (identity, renewed) = authenticate_token(&token, &state).await?;
    request
        .extensions_mut()
        .insert(CurrentIdentity(identity));

    let mut response = next.run(request).await;

    if let Some(new_token) = renewed {
        let cookie = crate::api::session_cookie_header(&new_token, state.config.auth.session_lifetime);
        if let Ok(value) = HeaderValue::from_str(&cookie) {
            response.headers_mut().append(SET_COOKIE, value);
        }
    }

    Ok(response)
}

/// Extractor for the current authenticated identity
///
/// # Usage
/// ```ignore
/// async fn handler(CurrentIdentity(identity): CurrentIdentity) -> impl IntoResponse {
///     Json(identity)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CurrentIdentity(pub Identity);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentIdentity
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(current) = parts.extensions.get::<CurrentIdentity>().cloned() {
            return Ok(current);
        }

        let state = AppState::from_ref(state);
        let token =
            extract_token_from_headers(&parts.headers).ok_or(AppError::IdentityNotFound)?;
        let (identity, _renewed) = authenticate_token(&token, &state).await?;
        let current = CurrentIdentity(identity);
        parts.extensions.insert(current.clone());

        Ok(current)
    }
}

/// Optional identity extractor
///
/// Returns None if not authenticated, instead of an error.
#[derive(Debug, Clone)]
pub struct MaybeIdentity(pub Option<Identity>);

#[async_trait]
impl<S> FromRequestParts<S> for MaybeIdentity
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(CurrentIdentity(identity)) = parts.extensions.get::<CurrentIdentity>().cloned()
        {
            return Ok(MaybeIdentity(Some(identity)));
        }

        let app_state = AppState::from_ref(state);
        let identity = match extract_token_from_headers(&parts.headers) {
            Some(token) => authenticate_token(&token, &app_state)
                .await
                .ok()
                .map(|(identity, _)| identity),
            None => None,
        };

        if let Some(identity) = &identity {
            parts.extensions.insert(CurrentIdentity(identity.clone()));
        }

        Ok(MaybeIdentity(identity))
    }
}

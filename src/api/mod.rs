//! HTTP API handlers
//!
//! Thin translation layer: decode the request, call a service, shape
//! the response. Session tokens travel as an HttpOnly cookie (set
//! here) or a bearer header (read by the auth middleware).

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{StatusCode, header::SET_COOKIE},
    response::{AppendHeaders, IntoResponse},
    routing::{get, post, put},
};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::auth::{CurrentIdentity, MaybeIdentity, SESSION_COOKIE};
use crate::data::Identity;
use crate::error::AppError;
use crate::oauth::VendorClient;
use crate::service::VerifyOutcome;

/// Routes that need no session
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/session", post(login).delete(logout))
        .route("/register", post(register))
        .route("/login/oauth/:vendor", get(oauth_authorize_url).post(oauth_verify))
        .route("/register/oauth", post(oauth_register))
}

/// Routes behind the auth middleware
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/session", get(current_session))
        .route("/my/password", put(change_password))
}

/// Set-Cookie value carrying a session token.
pub(crate) fn session_cookie_header(token: &str, max_age: i64) -> String {
    format!("{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}")
}

fn clear_session_cookie() -> String {
    format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

fn session_response(
    state: &AppState,
    status: StatusCode,
    identity: Identity,
    token: &str,
) -> axum::response::Response {
    (
        status,
        AppendHeaders([(
            SET_COOKIE,
            session_cookie_header(token, state.config.auth.session_lifetime),
        )]),
        Json(identity),
    )
        .into_response()
}

// =============================================================================
// Password flows
// =============================================================================

#[derive(Debug, Deserialize)]
struct CredentialsBody {
    email: String,
    password: String,
}

async fn register(
    State(state): State<AppState>,
    Json(body): Json<CredentialsBody>,
) -> Result<impl IntoResponse, AppError> {
    let (identity, token) = state.accounts.register(&body.email, &body.password).await?;
    Ok(session_response(&state, StatusCode::CREATED, identity, &token))
}

async fn login(
    State(state): State<AppState>,
    Json(body): Json<CredentialsBody>,
) -> Result<impl IntoResponse, AppError> {
    let (identity, token) = state.accounts.login(&body.email, &body.password).await?;
    Ok(session_response(&state, StatusCode::CREATED, identity, &token))
}

/// Logout tolerates a missing or stale session: the cookie is cleared
/// either way.
async fn logout(
    State(state): State<AppState>,
    MaybeIdentity(identity): MaybeIdentity,
) -> Result<impl IntoResponse, AppError> {
    if let Some(mut identity) = identity {
        state.accounts.logout(&mut identity).await?;
    }
    Ok((
        StatusCode::NO_CONTENT,
        AppendHeaders([(SET_COOKIE, clear_session_cookie())]),
    ))
}

async fn current_session(
    CurrentIdentity(identity): CurrentIdentity,
) -> Json<Identity> {
    Json(identity)
}

#[derive(Debug, Deserialize)]
struct ChangePasswordBody {
    current_password: String,
    new_password: String,
}

async fn change_password(
    State(state): State<AppState>,
    CurrentIdentity(mut identity): CurrentIdentity,
    Json(body): Json<ChangePasswordBody>,
) -> Result<StatusCode, AppError> {
    state
        .accounts
        .change_password(&mut identity, &body.current_password, &body.new_password)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// OAuth flows
// =============================================================================

fn vendor_client<'a>(
    state: &'a AppState,
    vendor: &str,
) -> Result<&'a dyn VendorClient, AppError> {
    state
        .vendors
        .get(vendor)
        .map(|client| client.as_ref())
        .ok_or_else(|| AppError::UnsupportedVendor(vendor.to_string()))
}

#[derive(Debug, Deserialize)]
struct AuthorizeUrlQuery {
    redirect_uri: String,
}

#[derive(Debug, Serialize)]
struct AuthorizeUrlResponse {
    next_url: String,
}

/// Where to send the end user for vendor authorization.
async fn oauth_authorize_url(
    State(state): State<AppState>,
    Path(vendor): Path<String>,
    Query(query): Query<AuthorizeUrlQuery>,
) -> Result<Json<AuthorizeUrlResponse>, AppError> {
    let client = vendor_client(&state, &vendor)?;
    let next_url = client.authorize_url(&query.redirect_uri)?;
    Ok(Json(AuthorizeUrlResponse {
        next_url: next_url.into(),
    }))
}

#[derive(Debug, Deserialize)]
struct OauthVerifyBody {
    code: String,
    redirect_uri: String,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum OauthVerifyResponse {
    SignedIn { identity: Identity },
    NeedsLink { vendor_token: String },
}

/// Exchange the vendor callback code.
///
/// A vendor user already linked to a local identity gets a session
/// straight away; an unknown one gets a short-lived vendor token to
/// redeem at `/register/oauth`.
async fn oauth_verify(
    State(state): State<AppState>,
    Path(vendor): Path<String>,
    Json(body): Json<OauthVerifyBody>,
) -> Result<axum::response::Response, AppError> {
    let client = vendor_client(&state, &vendor)?;

    match state.links.verify(client, &body.code, &body.redirect_uri).await? {
        VerifyOutcome::SignedIn {
            identity,
            session_token,
        } => Ok((
            AppendHeaders([(
                SET_COOKIE,
                session_cookie_header(&session_token, state.config.auth.session_lifetime),
            )]),
            Json(OauthVerifyResponse::SignedIn { identity }),
        )
            .into_response()),
        VerifyOutcome::NeedsLink { vendor_token } => {
            Ok(Json(OauthVerifyResponse::NeedsLink { vendor_token }).into_response())
        }
    }
}

#[derive(Debug, Deserialize)]
struct OauthRegisterBody {
    vendor_token: String,
    email: String,
    verify_password: Option<String>,
}

/// Redeem a vendor token: bind to the existing account for `email`
/// when `verify_password` is non-empty, otherwise register a new one.
async fn oauth_register(
    State(state): State<AppState>,
    Json(body): Json<OauthRegisterBody>,
) -> Result<impl IntoResponse, AppError> {
    // An empty password means "register", same as omitting the field.
    let verify_password = body
        .verify_password
        .as_deref()
        .filter(|password| !password.is_empty());
    let (identity, token) = state
        .links
        .link(&body.vendor_token, &body.email, verify_password)
        .await?;
    Ok(session_response(&state, StatusCode::CREATED, identity, &token))
}

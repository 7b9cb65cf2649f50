//! Doorman - identity and session-credential service
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      API Layer (Axum)                        │
//! │  - Registration / login / logout / password change          │
//! │  - OAuth vendor login and account linking                   │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Service Layer                            │
//! │  - Account flows, linking orchestrator                      │
//! │  - Session authority (issue / renew / suspend / validate)   │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Data Layer                              │
//! │  - SQLite (sqlx) credential store                           │
//! │  - In-memory vendor link cache (moka)                       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `api`: HTTP handlers
//! - `auth`: session token codec, session authority, middleware
//! - `service`: account flows and the linking orchestrator
//! - `oauth`: vendor clients and the vendor link cache
//! - `data`: database and cache layer
//! - `events`: account lifecycle events
//! - `config`: configuration management
//! - `error`: error types

pub mod api;
pub mod auth;
pub mod config;
pub mod data;
pub mod error;
pub mod events;
pub mod metrics;
pub mod oauth;
pub mod service;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use tokio::sync::mpsc;

/// Application state shared across all handlers
///
/// Cloned per request; every field is a cheap Arc.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<config::AppConfig>,

    /// Credential store
    pub db: Arc<data::Database>,

    /// Session issue/renew/suspend/validate
    pub sessions: Arc<auth::SessionAuthority>,

    /// Password-based account flows
    pub accounts: Arc<service::AccountService>,

    /// OAuth identity linking
    pub links: Arc<service::LinkOrchestrator>,

    /// Vendor clients, keyed by vendor name
    pub vendors: Arc<HashMap<String, Arc<dyn oauth::VendorClient>>>,

    /// Short-lived bridge from OAuth callback to the link call
    pub vendor_tokens: oauth::VendorLinkCache,

    /// Account event sink
    pub publisher: Arc<dyn events::EventPublisher>,
}

impl AppState {
    /// Initialize application state
    ///
    /// Connects the SQLite store (migrating if needed), builds the
    /// vendor clients from config, and wires the services together.
    /// Returns the state and the receiver end of the account event
    /// channel for the caller to drain.
    pub async fn new(
        config: config::AppConfig,
    ) -> Result<(Self, mpsc::Receiver<events::AccountEvent>), error::AppError> {
        tracing::info!("Initializing application state...");

        let db = Arc::new(data::Database::connect(&config.database.path).await?);

        let (publisher, event_receiver) = events::ChannelPublisher::new(config.events.buffer);
        let publisher: Arc<dyn events::EventPublisher> = Arc::new(publisher);

        let codec = auth::SessionTokenCodec::new(config.auth.session_secret.as_str());
        let sessions = Arc::new(auth::SessionAuthority::new(
            db.clone(),
            codec,
            chrono::Duration::seconds(config.auth.session_lifetime),
            chrono::Duration::seconds(config.auth.session_renew_window),
        ));

        let accounts = Arc::new(service::AccountService::new(
            db.clone(),
            sessions.clone(),
            publisher.clone(),
        ));

        let cache: Arc<dyn data::Cacher> = Arc::new(data::MemoryCache::new(10_000));
        let vendor_tokens = oauth::VendorLinkCache::new(
            cache,
            StdDuration::from_secs(config.auth.vendor_token_ttl),
        );
        let links = Arc::new(service::LinkOrchestrator::new(
            db.clone(),
            vendor_tokens.clone(),
            sessions.clone(),
            publisher.clone(),
        ));

        let http_client = reqwest::Client::builder()
            .timeout(StdDuration::from_secs(10))
            .build()?;
        let vendors = Arc::new(oauth::build_vendor_clients(&config.oauth, http_client)?);

        tracing::info!(
            vendors = vendors.len(),
            "Application state initialized"
        );

        let state = Self {
            config: Arc::new(config),
            db,
            sessions,
            accounts,
            links,
            vendors,
            vendor_tokens,
            publisher,
        };
        Ok((state, event_receiver))
    }
}

/// Build the application router
pub fn build_router(state: AppState) -> axum::Router {
    use axum::Router;
    use tower_http::cors::CorsLayer;
    use tower_http::trace::TraceLayer;

    let protected = api::protected_router().route_layer(axum::middleware::from_fn_with_state(
        state.clone(),
        auth::require_auth,
    ));

    Router::new()
        .route("/health", axum::routing::get(health_check))
        .merge(api::public_router())
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
        .merge(metrics::metrics_router())
}

async fn health_check() -> &'static str {
    "OK"
}

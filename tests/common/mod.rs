//! Common test utilities for E2E tests

use std::collections::HashMap;

use doorman::{AppState, config};
use tempfile::TempDir;
use tokio::net::TcpListener;

/// Test server instance
pub struct TestServer {
    pub addr: String,
    pub state: AppState,
    pub _temp_dir: TempDir,
    pub client: reqwest::Client,
}

impl TestServer {
    /// Create a new test server instance
    pub async fn new() -> Self {
        // Create temporary directory for test database
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");

        let mut oauth = HashMap::new();
        oauth.insert(
            "facebook".to_string(),
            config::VendorOauthConfig {
                client_id: "test-client-id".to_string(),
                client_secret: "test-client-secret".to_string(),
            },
        );

        // Create test configuration
        let config = config::AppConfig {
            server: config::ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0, // Let OS assign port
            },
            database: config::DatabaseConfig { path: db_path },
            auth: config::AuthConfig {
                session_secret: "test-secret-key-32-bytes-long!!!".to_string(),
                session_lifetime: 30 * 24 * 3600,
                session_renew_window: 7 * 24 * 3600,
                vendor_token_ttl: 600,
            },
            oauth,
            events: config::EventsConfig { buffer: 64 },
            logging: config::LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        };

        // Initialize app state and drain events in the background
        let (state, event_receiver) = AppState::new(config).await.unwrap();
        tokio::spawn(doorman::events::run_observer(event_receiver));

        // Create HTTP client that keeps cookies across requests
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap();

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let addr_str = format!("http://{}", addr);

        // Build router
        let app = doorman::build_router(state.clone());

        // Spawn server in background
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Wait a bit for server to start
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        Self {
            addr: addr_str,
            state,
            _temp_dir: temp_dir,
            client,
        }
    }

    /// Get base URL for API requests
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    /// Register an account through the API and return its id.
    pub async fn register(&self, email: &str, password: &str) -> String {
        let response = self
            .client
            .post(self.url("/register"))
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await
            .expect("register request succeeds");
        assert_eq!(response.status(), 201, "registration failed");

        let body: serde_json::Value = response.json().await.expect("register response body");
        body["id"].as_str().expect("identity id").to_string()
    }
}

//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration file (config/local.toml)
//! 3. Environment variables (override)

use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub oauth: HashMap<String, VendorOauthConfig>,
    pub events: EventsConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Port number (e.g., 8080)
    pub port: u16,
}

/// Database configuration (SQLite only)
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file
    pub path: PathBuf,
}

/// Authentication and session-credential configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Per-deployment secret mixed into the token MAC key
    pub session_secret: String,
    /// Session token lifetime in seconds (default 30 days)
    pub session_lifetime: i64,
    /// Renewal window in seconds (default 7 days); a token inside this
    /// window of its expiry is re-issued without re-authentication
    pub session_renew_window: i64,
    /// Vendor link cache TTL in seconds (default 10 minutes)
    pub vendor_token_ttl: u64,
}

/// Per-vendor OAuth client credentials
///
/// Keyed by vendor name in the `[oauth.<vendor>]` config table.
#[derive(Debug, Clone, Deserialize)]
pub struct VendorOauthConfig {
    pub client_id: String,
    pub client_secret: String,
}

/// Domain event delivery configuration
#[derive(Debug, Clone, Deserialize)]
pub struct EventsConfig {
    /// Bounded channel capacity; events beyond it are dropped
    pub buffer: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format ("pretty" or "json")
    pub format: String,
}

impl AppConfig {
    /// Load configuration from files and environment
    ///
    /// # Priority (low to high)
    /// 1. Built-in defaults
    /// 2. config/default.toml
    /// 3. config/local.toml
    /// 4. DOORMAN__* environment variables
    pub fn load() -> Result<Self, crate::error::AppError> {
        use config::{Config, Environment, File};

        let config = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("database.path", "data/doorman.db")?
            .set_default("auth.session_lifetime", 30 * 24 * 3600)?
            .set_default("auth.session_renew_window", 7 * 24 * 3600)?
            .set_default("auth.vendor_token_ttl", 600)?
            .set_default("events.buffer", 64)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::with_prefix("DOORMAN")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;
        app_config.validate()?;
        Ok(app_config)
    }

    fn validate(&self) -> Result<(), crate::error::AppError> {
        const MIN_SESSION_SECRET_BYTES: usize = 32;

        if self.auth.session_secret.as_bytes().len() < MIN_SESSION_SECRET_BYTES {
            return Err(crate::error::AppError::Config(format!(
                "auth.session_secret must be at least {} bytes",
                MIN_SESSION_SECRET_BYTES
            )));
        }

        if self.auth.session_lifetime <= 0 {
            return Err(crate::error::AppError::Config(
                "auth.session_lifetime must be greater than 0".to_string(),
            ));
        }

        if self.auth.session_renew_window <= 0
            || self.auth.session_renew_window >= self.auth.session_lifetime
        {
            return Err(crate::error::AppError::Config(
                "auth.session_renew_window must be greater than 0 and shorter than auth.session_lifetime"
                    .to_string(),
            ));
        }

        // A zero-capacity channel cannot be constructed.
        if self.events.buffer == 0 {
            return Err(crate::error::AppError::Config(
                "events.buffer must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> AppConfig {
        AppConfig {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
            },
            database: DatabaseConfig {
                path: PathBuf::from("test.db"),
            },
            auth: AuthConfig {
                session_secret: "test-secret-key-32-bytes-long!!!".to_string(),
                session_lifetime: 30 * 24 * 3600,
                session_renew_window: 7 * 24 * 3600,
                vendor_token_ttl: 600,
            },
            oauth: HashMap::new(),
            events: EventsConfig { buffer: 8 },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        }
    }

    #[test]
    fn validate_accepts_sane_config() {
        assert!(test_config().validate().is_ok());
    }

    #[test]
    fn validate_rejects_short_secret() {
        let mut config = test_config();
        config.auth.session_secret = "short".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_renew_window_longer_than_lifetime() {
        let mut config = test_config();
        config.auth.session_renew_window = config.auth.session_lifetime;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_event_buffer() {
        let mut config = test_config();
        config.events.buffer = 0;
        assert!(config.validate().is_err());
    }
}

//! Configuration module
//!
//! Loads configuration from environment variables.

use std::env;
use std::time::Duration;

use crate::dispatch::DispatchMode;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Database connection URL
    pub database_url: String,

    /// Maximum database connections in pool
    pub database_max_connections: u32,

    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Environment (development, production)
    pub environment: String,

    /// Signing key for issued access tokens. Verification itself is out
    /// of scope for this crate; the value is carried through config so
    /// an upstream auth layer can be wired to the same secret.
    pub secret_key: String,

    /// Access token lifetime, for the same upstream auth layer.
    pub access_token_ttl: Duration,

    /// Sync vs. async projection dispatch. `true` applies projections
    /// and sends notifications inline in the command's transaction;
    /// `false` enqueues to `projection_tasks` for `ProjectionWorker`.
    pub sync_event_handler: bool,

    /// Allowed CORS origins, comma-separated in the environment.
    pub cors_allowed_origins: Vec<String>,

    /// Allowed `Host` header values, comma-separated in the environment.
    pub allowed_hosts: Vec<String>,

    /// `tracing_subscriber::EnvFilter` directive, e.g. "info" or "debug".
    pub log_level: String,

    /// How often `ProjectionWorker` polls `projection_tasks` for work.
    pub projection_poll_interval: Duration,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingEnv("DATABASE_URL"))?;

        let database_max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("DATABASE_MAX_CONNECTIONS"))?;

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("PORT"))?;

        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        let secret_key = env::var("SECRET_KEY").map_err(|_| ConfigError::MissingEnv("SECRET_KEY"))?;

        let access_token_ttl_secs: u64 = env::var("ACCESS_TOKEN_TTL_SECONDS")
            .unwrap_or_else(|_| "3600".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("ACCESS_TOKEN_TTL_SECONDS"))?;

        let sync_event_handler = env::var("SYNC_EVENT_HANDLER")
            .unwrap_or_else(|_| "true".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("SYNC_EVENT_HANDLER"))?;

        let cors_allowed_origins = env::var("CORS_ALLOWED_ORIGINS")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();

        let allowed_hosts = env::var("ALLOWED_HOSTS")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();

        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let projection_poll_interval_ms: u64 = env::var("PROJECTION_POLL_INTERVAL_MS")
            .unwrap_or_else(|_| "500".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("PROJECTION_POLL_INTERVAL_MS"))?;

        Ok(Self {
            database_url,
            database_max_connections,
            host,
            port,
            environment,
            secret_key,
            access_token_ttl: Duration::from_secs(access_token_ttl_secs),
            sync_event_handler,
            cors_allowed_origins,
            allowed_hosts,
            log_level,
            projection_poll_interval: Duration::from_millis(projection_poll_interval_ms),
        })
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn dispatch_mode(&self) -> DispatchMode {
        if self.sync_event_handler {
            DispatchMode::Sync
        } else {
            DispatchMode::Async
        }
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnv(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(&'static str),
}

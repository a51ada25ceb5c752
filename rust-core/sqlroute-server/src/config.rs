//! Environment-driven configuration.

use anyhow::{Context, Result};
use sqlroute_core::ServerConfig;
use std::net::SocketAddr;

const DEFAULT_ADDR: &str = "127.0.0.1:8000";
const DEFAULT_DATABASE_URL: &str = "sqlite::memory:";
const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

/// Process configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// HTTP server settings
    pub server: ServerConfig,
    /// `postgres://...` or a SQLite URL
    pub database_url: String,
    /// Pool size
    pub max_connections: u32,
    /// `Access-Control-Allow-Origin` value
    pub cors_origin: String,
}

impl AppConfig {
    /// Read configuration from `SQLROUTE_*` variables and `DATABASE_URL`
    ///
    /// # Errors
    ///
    /// Fails if a set variable cannot be parsed.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let address: SocketAddr = lookup("SQLROUTE_ADDR")
            .as_deref()
            .unwrap_or(DEFAULT_ADDR)
            .parse()
            .context("SQLROUTE_ADDR must be a socket address such as 127.0.0.1:8000")?;

        let max_connections = lookup("SQLROUTE_MAX_CONNECTIONS")
            .map(|v| v.parse::<u32>())
            .transpose()
            .context("SQLROUTE_MAX_CONNECTIONS must be a positive integer")?
            .unwrap_or(DEFAULT_MAX_CONNECTIONS);

        let max_body_size = lookup("SQLROUTE_MAX_BODY_BYTES")
            .map(|v| v.parse::<usize>())
            .transpose()
            .context("SQLROUTE_MAX_BODY_BYTES must be a byte count")?
            .unwrap_or(DEFAULT_MAX_BODY_BYTES);

        let mut server = ServerConfig {
            address,
            max_body_size,
            ..ServerConfig::default()
        };
        if let Some(prefix) = lookup("SQLROUTE_API_PREFIX") {
            server.api_prefix = prefix;
        }

        Ok(Self {
            server,
            database_url: lookup("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            max_connections,
            cors_origin: lookup("SQLROUTE_CORS_ORIGIN").unwrap_or_else(|| "*".to_string()),
        })
    }
}

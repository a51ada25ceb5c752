//! sqlroute server
//!
//! Connects to the catalog database, ensures the catalog tables exist and
//! serves the management API plus dynamic endpoints until Ctrl-C.

mod config;

use anyhow::{Context, Result};
use config::AppConfig;
use sqlroute_core::{catalog, CorsMiddleware, DatabasePool, LoggingMiddleware, Server};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("sqlroute=info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).json().try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let config = AppConfig::from_env()?;

    let pool = DatabasePool::connect(&config.database_url, Some(config.max_connections))
        .await
        .context("failed to connect to the catalog database")?;
    catalog::ensure_schema(&pool)
        .await
        .context("failed to prepare catalog tables")?;
    info!(
        backend = if pool.is_postgres() { "postgres" } else { "sqlite" },
        "Catalog database ready"
    );

    let mut server = Server::new(pool.clone(), config.server.clone())?;
    server.add_middleware(LoggingMiddleware::new());
    server.add_middleware(CorsMiddleware::new().allow_origin(config.cors_origin.as_str()));

    server.serve().await?;
    pool.close().await;
    info!("Server stopped");
    Ok(())
}

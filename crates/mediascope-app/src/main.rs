//! Mediascope application binary - composition root.
//!
//! 1. Parse CLI and load configuration from TOML
//! 2. Open SQLite (connection pool + migrations)
//! 3. Build the extraction and scraper HTTP clients
//! 4. Compose the services into AppState and serve the axum API

mod cli;

use std::sync::Arc;

use clap::Parser;

use mediascope_api::AppState;
use mediascope_core::config::MediascopeConfig;
use mediascope_ingest::{HttpFeatureExtractor, HttpScraperClient};
use mediascope_storage::{Database, MediaRepository};

use cli::CliArgs;

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    let config_file = args.resolve_config_path();
    let mut config = MediascopeConfig::load_or_default(&config_file);
    args.apply(&mut config);
    config.validate()?;

    // RUST_LOG wins over the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.general.log_level)),
        )
        .init();

    tracing::info!("Starting Mediascope v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration resolved");

    let db = Arc::new(Database::from_config(&config.storage)?);
    tracing::info!(
        path = %config.storage.database_path,
        connections = db.pool_size(),
        "SQLite database opened"
    );
    let store = Arc::new(MediaRepository::new(db));

    let extractor = Arc::new(HttpFeatureExtractor::from_config(&config.extractor)?);
    let scraper = Arc::new(HttpScraperClient::from_config(&config.scraper)?);
    tracing::info!(
        extractor = %config.extractor.base_url,
        scraper = %config.scraper.base_url,
        "Collaborator clients ready"
    );

    let state = AppState::new(config, store, extractor, scraper);
    mediascope_api::start_server(state, shutdown_signal()).await?;

    tracing::info!("Mediascope stopped");
    Ok(())
}

use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;
use crate::db::SqliteStore;
use crate::types::AppState;

mod config;
mod db;
mod enrollment;
mod server;
mod types;

const DEFAULT_DEMO_SEMESTER: &str = "2024 Spring";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::load()?;
    info!(
        "Starting TMS enrollment service v{}",
        env!("CARGO_PKG_VERSION")
    );

    let store = Arc::new(SqliteStore::open(
        &config.database_path,
        config.store_busy_timeout(),
    )?);
    if config.seed_demo_data {
        let semester = config
            .enrollment
            .current_semester
            .as_deref()
            .unwrap_or(DEFAULT_DEMO_SEMESTER);
        store.seed_demo(semester)?;
    }

    let state = Arc::new(AppState::new(&config, store));
    let app = server::create_router(state);

    let listener = tokio::net::TcpListener::bind((config.address.as_str(), config.port)).await?;
    info!("Listening on {}:{}", config.address, config.port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    info!("Shutdown signal received");
}

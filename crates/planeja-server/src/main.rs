//! Planeja+ - Server entry point

use anyhow::{Context, Result};
use planeja_api::{create_router, AppState};
use planeja_common::config::{Config, LoggingConfig};
use planeja_common::{Clock, SystemClock};
use planeja_core::{ExpirySweeper, InvitationManager, RateLimiter};
use planeja_storage::{
    create_state_store, DatabasePool, DbSnapshotRepository, SnapshotRepository,
    StoredSnapshotRepository,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration; an explicit path may be given as the first argument
    let config = match std::env::args().nth(1) {
        Some(path) => Config::from_file(&PathBuf::from(path))?,
        None => Config::load()?,
    };

    // Initialize logging
    init_logging(&config.logging);

    info!("Starting Planeja+ server...");

    // Initialize database when it backs the state
    let db_pool = if config.database.backend == "postgres" {
        let pool = DatabasePool::new(&config.database).await?;
        pool.migrate().await?;
        Some(pool)
    } else {
        info!("Using {} state backend", config.database.backend);
        None
    };

    let store = create_state_store(&config, db_pool.clone())?;
    let snapshots: Arc<dyn SnapshotRepository> = match db_pool {
        Some(pool) => Arc::new(DbSnapshotRepository::new(pool)),
        None => Arc::new(StoredSnapshotRepository::new(store.clone())),
    };
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    // Initialize invitation manager
    let rate_limiter = Arc::new(RateLimiter::new(
        store.clone(),
        clock.clone(),
        config.rate_limit.clone(),
    ));
    let invitations = Arc::new(InvitationManager::new(
        store.clone(),
        clock.clone(),
        rate_limiter,
        config.invitations.clone(),
    ));

    // Start expiry sweeper
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper_handle = {
        let sweeper = ExpirySweeper::new(invitations.clone())
            .with_interval(config.invitations.sweep_interval_secs);
        tokio::spawn(async move {
            sweeper.run(shutdown_rx).await;
        })
    };

    // Start API server
    let state = AppState {
        invitations,
        snapshots,
        store,
        clock,
        api_key_sha256: config.api.api_key_sha256.clone(),
    };
    let app = create_router(state, &config.api.cors_origins);

    let addr = format!("{}:{}", config.server.bind_address, config.api.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind API server to {}", addr))?;
    info!("Starting API server on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutdown signal received");
        })
        .await
        .context("API server error")?;

    // Cleanup
    let _ = shutdown_tx.send(true);
    if let Err(e) = sweeper_handle.await {
        tracing::error!("Expiry sweeper task failed: {}", e);
    }

    info!("Planeja+ server shutdown complete");

    Ok(())
}

fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.level));

    let registry = tracing_subscriber::registry().with(filter);
    if config.format == "json" {
        registry.with(fmt::layer().json().with_target(true)).init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_level(true))
            .init();
    }
}

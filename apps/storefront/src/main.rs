//! # Arcade Storefront
//!
//! Starts the storefront service layer and holds it open until shutdown.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  init_tracing ──► StorefrontConfig::load ──► Storefront::start          │
//! │                                                   │                     │
//! │                                                   ▼                     │
//! │                              wait for Ctrl+C / SIGTERM ──► close pool   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use arcade_storefront::config::StorefrontConfig;
use arcade_storefront::{init_tracing, Storefront};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    info!("Starting Arcade storefront");

    let config = StorefrontConfig::load()?;
    info!(
        db_path = %config.db_path.display(),
        max_connections = config.db_max_connections,
        catalog_ttl_secs = config.catalog_cache_ttl.as_secs(),
        profile_ttl_secs = config.profile_cache_ttl.as_secs(),
        "Configuration loaded"
    );

    let storefront = Storefront::start(config).await?;
    if !storefront.health_check().await {
        warn!("Database health check failed after startup");
    }
    info!("Storefront ready");

    shutdown_signal().await;

    info!("Shutting down");
    storefront.shutdown().await;
    info!("Shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}

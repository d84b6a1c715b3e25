//! filestore - HTTP front end for the pluggable file storage service

use anyhow::Context;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use filestore::config::Config;
use filestore::metrics;
use filestore::server::Server;
use filestore::storage::FileStorage;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Configuration first so its log level can seed the filter
    let config = Config::from_env().context("failed to load configuration")?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .context("invalid log level")?;
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    metrics::init_metrics().context("failed to register metrics")?;

    info!(?config, "Configuration loaded");

    let storage = FileStorage::new(&config.storage)
        .await
        .context("failed to initialize storage backend")?;
    if config.storage.auto_create_bucket {
        storage
            .ensure_bucket()
            .await
            .context("failed to create storage bucket")?;
    }

    let server = Server::new(config.clone(), Arc::new(storage));

    let shutdown_signal = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for shutdown signal");
        }
        info!("Received shutdown signal");
    };

    info!("Server starting on {}", config.server.bind_address);
    if let Err(e) = server.start(shutdown_signal).await {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("Server shutdown complete");
    Ok(())
}

//! Config Watcher
//!
//! Mirrors the mesh ConfigMap from the cluster and logs the effective mesh
//! configuration once the cache is warm and again on every change.

mod controller;
mod error;
mod settings;

use controller::Controller;
use crate::error::ControllerError;
use crate::settings::Settings;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // kube is built with rustls but does not pick a crypto provider
    if rustls::crypto::ring::default_provider().install_default().is_err() {
        warn!("rustls crypto provider already installed");
    }

    info!("Starting Config Watcher");

    // Load configuration from environment variables
    let settings = Settings::from_env()?;

    info!("Configuration:");
    info!("  ConfigMap: {}", settings.key());
    info!("  Payload key: {}", settings.payload_key.as_deref().unwrap_or("<single entry>"));
    info!("  Announcement capacity: {}", settings.announcement_capacity);
    info!("  Sync timeout: {:?}", settings.sync_timeout);

    let stop = CancellationToken::new();
    let shutdown = stop.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown requested");
                shutdown.cancel();
            }
            Err(e) => warn!("Failed to listen for shutdown signal: {}", e),
        }
    });

    // Initialize and run controller
    let controller = Controller::new(&settings, stop).await?;
    controller.run().await?;

    Ok(())
}

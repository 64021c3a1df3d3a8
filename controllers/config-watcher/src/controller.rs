//! Main controller implementation.
//!
//! This module contains the `Controller` struct that starts the ConfigMap
//! watch client, waits for the initial sync and then reports the effective
//! mesh configuration whenever the watched ConfigMap changes.

use crate::error::ControllerError;
use crate::settings::Settings;
use configurator::{Announcement, MeshConfig, WatchClient, WatchOptions};
use k8s_openapi::api::core::v1::ConfigMap;
use kube::Client;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Main controller for mesh configuration watching.
#[derive(Debug)]
pub struct Controller {
    client: WatchClient,
    announcements: mpsc::Receiver<Announcement<ConfigMap>>,
    stop: CancellationToken,
    sync_timeout: Duration,
}

impl Controller {
    /// Creates a new controller instance.
    pub async fn new(settings: &Settings, stop: CancellationToken) -> Result<Self, ControllerError> {
        info!("Initializing Config Watcher");

        // Create Kubernetes client
        let kube_client = Client::try_default().await?;

        let options = WatchOptions {
            payload_key: settings.payload_key.clone(),
            announcement_capacity: settings.announcement_capacity,
            ..Default::default()
        };
        let client = WatchClient::with_options(kube_client, stop.clone(), settings.key(), options);

        Self::from_client(client, stop, settings.sync_timeout)
    }

    /// Wraps an already started watch client.
    pub fn from_client(
        mut client: WatchClient,
        stop: CancellationToken,
        sync_timeout: Duration,
    ) -> Result<Self, ControllerError> {
        let announcements = client.take_announcements().ok_or_else(|| {
            ControllerError::InvalidConfig("announcement receiver already taken".to_string())
        })?;

        Ok(Self {
            client,
            announcements,
            stop,
            sync_timeout,
        })
    }

    /// Runs the controller until shutdown.
    ///
    /// Returns the last configuration seen, or `None` if stopped before the
    /// cache synced.
    pub async fn run(mut self) -> Result<Option<MeshConfig>, ControllerError> {
        info!("Config Watcher running");

        let ready = self.client.ready();
        match tokio::time::timeout(self.sync_timeout, ready.wait_or_cancelled(&self.stop)).await {
            Ok(true) => {}
            Ok(false) => {
                info!("Stopped before cache sync of {}", self.client.key());
                return Ok(None);
            }
            Err(_) => {
                self.stop.cancel();
                return Err(ControllerError::Watch(format!(
                    "cache sync of {} did not complete within {:?}",
                    self.client.key(),
                    self.sync_timeout
                )));
            }
        }

        let mut config = self.client.get_config();
        log_config(&config);

        loop {
            tokio::select! {
                () = self.stop.cancelled() => break,
                announcement = self.announcements.recv() => {
                    let Some(announcement) = announcement else {
                        warn!("Announcement channel closed");
                        break;
                    };
                    info!(
                        "ConfigMap {} {}",
                        announcement.object.metadata.name.as_deref().unwrap_or("<unknown>"),
                        announcement.kind
                    );
                    config = self.client.get_config();
                    log_config(&config);
                }
            }
        }

        let dropped = self.client.dropped_announcements();
        if dropped > 0 {
            warn!("{} announcements were dropped", dropped);
        }
        self.client.stopped().await;
        info!("Config Watcher stopped");
        Ok(Some(config))
    }
}

fn log_config(config: &MeshConfig) {
    info!(
        "Mesh config: version={} permissive_traffic_policy_mode={}",
        config.config_version, config.permissive_traffic_policy_mode
    );
}

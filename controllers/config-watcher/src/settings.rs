//! Settings loaded from environment variables.

use crate::error::ControllerError;
use configurator::{DEFAULT_ANNOUNCEMENT_CAPACITY, WatchedResourceKey};
use std::env;
use std::time::Duration;

const DEFAULT_NAMESPACE: &str = "osm-system";
const DEFAULT_CONFIG_NAME: &str = "osm-config";
const DEFAULT_SYNC_TIMEOUT_SECS: u64 = 60;

/// Runtime settings of the Config Watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Namespace of the mesh ConfigMap (`MESH_NAMESPACE`)
    pub namespace: String,
    /// Name of the mesh ConfigMap (`MESH_CONFIG_NAME`)
    pub config_name: String,
    /// Data entry holding the payload (`MESH_CONFIG_KEY`)
    pub payload_key: Option<String>,
    /// Announcement buffer size (`ANNOUNCEMENT_CAPACITY`)
    pub announcement_capacity: usize,
    /// How long to wait for the initial cache sync (`SYNC_TIMEOUT_SECS`)
    pub sync_timeout: Duration,
}

impl Settings {
    /// Loads settings from the process environment.
    pub fn from_env() -> Result<Self, ControllerError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Loads settings through `lookup`, which returns the value of a variable.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ControllerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let namespace = non_empty("MESH_NAMESPACE")
            .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());
        let config_name = non_empty("MESH_CONFIG_NAME")
            .unwrap_or_else(|| DEFAULT_CONFIG_NAME.to_string());
        let payload_key = non_empty("MESH_CONFIG_KEY");

        let announcement_capacity = match non_empty("ANNOUNCEMENT_CAPACITY") {
            None => DEFAULT_ANNOUNCEMENT_CAPACITY,
            Some(raw) => parse_positive("ANNOUNCEMENT_CAPACITY", &raw)?,
        };
        let sync_timeout_secs = match non_empty("SYNC_TIMEOUT_SECS") {
            None => DEFAULT_SYNC_TIMEOUT_SECS,
            Some(raw) => parse_positive("SYNC_TIMEOUT_SECS", &raw)?,
        };

        Ok(Self {
            namespace,
            config_name,
            payload_key,
            announcement_capacity,
            sync_timeout: Duration::from_secs(sync_timeout_secs),
        })
    }

    /// Key of the watched ConfigMap.
    pub fn key(&self) -> WatchedResourceKey {
        WatchedResourceKey::new(&self.namespace, &self.config_name)
    }
}

fn parse_positive<T>(name: &str, raw: &str) -> Result<T, ControllerError>
where
    T: std::str::FromStr + Default + PartialEq,
    T::Err: std::fmt::Display,
{
    match raw.trim().parse::<T>() {
        Ok(value) if value == T::default() => Err(ControllerError::InvalidConfig(format!(
            "{} must be greater than zero",
            name
        ))),
        Ok(value) => Ok(value),
        Err(e) => Err(ControllerError::InvalidConfig(format!(
            "{} must be a positive integer, got {:?}: {}",
            name, raw, e
        ))),
    }
}

//! Configurator error types.
//!
//! None of these ever reach a caller of `WatchClient::get_config()`. Read-path
//! failures are handed to the diagnostics sink and replaced by defaults, and
//! sync failures are logged by the coordinator.

use kube_runtime::reflector::store::WriterDropped;
use thiserror::Error;

/// Reasons the watched ConfigMap could not be turned into a `MeshConfig`.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The watched object is not in the cache
    #[error("ConfigMap {0} not found in cache")]
    NotFound(String),

    /// The object exists but carries no data entries
    #[error("ConfigMap {0} does not contain any data")]
    EmptyData(String),

    /// More than one data entry and no payload key configured
    #[error("ConfigMap {key} has {} data entries ({}), expected exactly one", entries.len(), entries.join(", "))]
    AmbiguousData {
        /// Cache key of the object
        key: String,
        /// Names of the data entries found
        entries: Vec<String>,
    },

    /// The configured payload key is not among the data entries
    #[error("ConfigMap {key} has no data entry named {entry}")]
    MissingEntry {
        /// Cache key of the object
        key: String,
        /// Configured payload key
        entry: String,
    },

    /// The payload is not valid YAML for `MeshConfig`
    #[error("failed to decode ConfigMap {key} entry {entry}: {source}")]
    Decode {
        /// Cache key of the object
        key: String,
        /// Data entry that was decoded
        entry: String,
        /// Underlying YAML error
        #[source]
        source: serde_yaml::Error,
    },
}

/// Reasons the initial cache sync did not complete.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The stop signal fired before the initial list was applied
    #[error("stopped before initial cache sync of {0}")]
    Stopped(String),

    /// The watch stream ended before the initial list was applied
    #[error("watch stream for {key} ended before initial cache sync")]
    StreamEnded {
        /// Watched resource key
        key: String,
        #[source]
        source: WriterDropped,
    },
}

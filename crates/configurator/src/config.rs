//! Mesh configuration record and its decoding from the watched ConfigMap.

use crate::diagnostics::Diagnostics;
use crate::error::ConfigError;
use crate::key::WatchedResourceKey;
use k8s_openapi::api::core::v1::ConfigMap;
use serde::{Deserialize, Serialize};

/// Typed contents of the mesh ConfigMap payload.
///
/// Every field has a default so a record can always be produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshConfig {
    /// Version of the applied config, informational only
    pub config_version: i64,

    /// When true, SMI policies are ignored and services may talk to each
    /// other freely. Useful to observe traffic in brownfield installs.
    pub permissive_traffic_policy_mode: bool,
}

impl MeshConfig {
    /// Parses a YAML payload.
    pub fn from_yaml(payload: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(payload)
    }
}

/// Picks the data entry holding the payload.
///
/// With `payload_key` set, that entry is used. Without it, exactly one entry
/// must be present.
fn select_payload<'a>(
    key: &WatchedResourceKey,
    config_map: &'a ConfigMap,
    payload_key: Option<&str>,
) -> Result<(&'a str, &'a str), ConfigError> {
    let data = match config_map.data.as_ref() {
        Some(data) if !data.is_empty() => data,
        _ => return Err(ConfigError::EmptyData(key.to_string())),
    };

    if let Some(entry) = payload_key {
        return data
            .get_key_value(entry)
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .ok_or_else(|| ConfigError::MissingEntry {
                key: key.to_string(),
                entry: entry.to_string(),
            });
    }

    let mut entries = data.iter();
    match (entries.next(), entries.next()) {
        (Some((k, v)), None) => Ok((k.as_str(), v.as_str())),
        _ => Err(ConfigError::AmbiguousData {
            key: key.to_string(),
            entries: data.keys().cloned().collect(),
        }),
    }
}

/// Decodes `config_map` into a `MeshConfig`.
pub fn decode_config_map(
    key: &WatchedResourceKey,
    config_map: &ConfigMap,
    payload_key: Option<&str>,
) -> Result<MeshConfig, ConfigError> {
    let (entry, payload) = select_payload(key, config_map, payload_key)?;
    MeshConfig::from_yaml(payload).map_err(|source| ConfigError::Decode {
        key: key.to_string(),
        entry: entry.to_string(),
        source,
    })
}

/// Resolves the configuration from an optional cached object.
///
/// Any failure is reported to `diagnostics` and the default is returned.
pub(crate) fn resolve_config(
    key: &WatchedResourceKey,
    cached: Option<&ConfigMap>,
    payload_key: Option<&str>,
    diagnostics: &dyn Diagnostics,
) -> MeshConfig {
    let result = cached
        .ok_or_else(|| ConfigError::NotFound(key.to_string()))
        .and_then(|config_map| decode_config_map(key, config_map, payload_key));

    result.unwrap_or_else(|err| {
        diagnostics.report(&err);
        MeshConfig::default()
    })
}

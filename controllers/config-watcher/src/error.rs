//! Controller-specific error types.
//!
//! This module defines error types specific to the Config Watcher that are
//! not covered by upstream library errors.

use thiserror::Error;
use kube::Error as KubeError;

/// Errors that can occur in the Config Watcher.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The initial cache sync did not complete
    #[error("Resource watch failed: {0}")]
    Watch(String),
}

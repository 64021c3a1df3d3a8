//! Diagnostics sink for read-path failures.
//!
//! The config accessor never returns errors. Whatever went wrong is handed to
//! a [`Diagnostics`] implementation supplied at construction time.

use crate::error::ConfigError;
use std::fmt;
use tracing::{debug, error};

/// Receives read-path failures.
pub trait Diagnostics: Send + Sync + fmt::Debug {
    /// Records a failure that was replaced by the default configuration.
    fn report(&self, error: &ConfigError);
}

/// Forwards diagnostics to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDiagnostics;

impl Diagnostics for TracingDiagnostics {
    fn report(&self, err: &ConfigError) {
        match err {
            // A missing ConfigMap is expected until the first sync
            ConfigError::NotFound(_) => debug!("{}", err),
            _ => error!("{}", err),
        }
    }
}

/// Keeps every reported diagnostic as a string, for tests.
///
/// Available with the `test-util` feature.
#[cfg(any(test, feature = "test-util"))]
#[derive(Debug, Default)]
pub struct RecordingDiagnostics {
    reports: std::sync::Mutex<Vec<String>>,
}

#[cfg(any(test, feature = "test-util"))]
impl RecordingDiagnostics {
    /// Messages reported so far, oldest first.
    pub fn reports(&self) -> Vec<String> {
        self.reports
            .lock()
            .map(|reports| reports.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }
}

#[cfg(any(test, feature = "test-util"))]
impl Diagnostics for RecordingDiagnostics {
    fn report(&self, err: &ConfigError) {
        let mut reports = self
            .reports
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        reports.push(err.to_string());
    }
}

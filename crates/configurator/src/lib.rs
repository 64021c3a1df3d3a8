//! Mesh Configurator
//!
//! Keeps a local mirror of the mesh ConfigMap and decodes it into a typed
//! [`MeshConfig`] on demand.
//!
//! # Example
//!
//! ```no_run
//! use configurator::WatchClient;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = kube::Client::try_default().await?;
//! let stop = CancellationToken::new();
//!
//! let mut watch = WatchClient::new(client, stop.clone(), "osm-system", "osm-config");
//! let mut announcements = watch.take_announcements();
//!
//! if watch.ready().wait_or_cancelled(&stop).await {
//!     let config = watch.get_config();
//!     println!("permissive mode: {}", config.permissive_traffic_policy_mode);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Guarantees
//!
//! - **Readiness**: closed exactly once, when the initial listing is applied
//! - **Announcements**: only objects in the watched namespace, in watch order,
//!   dropped rather than blocking when the buffer is full
//! - **Reads**: never fail; missing or malformed data yields the default config

pub mod announcement;
pub mod client;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod filter;
pub mod key;
pub mod readiness;
pub mod sync;

pub use announcement::{Announcement, AnnouncementKind, AnnouncementRelay, DEFAULT_ANNOUNCEMENT_CAPACITY};
pub use client::{WatchClient, WatchOptions};
pub use config::{decode_config_map, MeshConfig};
pub use diagnostics::{Diagnostics, TracingDiagnostics};
#[cfg(any(test, feature = "test-util"))]
pub use diagnostics::RecordingDiagnostics;
pub use error::{ConfigError, SyncError};
pub use filter::{HasNamespace, NamespaceFilter};
pub use key::WatchedResourceKey;
pub use readiness::ReadinessSignal;
pub use sync::SyncState;

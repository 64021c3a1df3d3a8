//! The watch client: wiring of filter, relay, coordinator and accessor.

use crate::announcement::{Announcement, AnnouncementRelay, DEFAULT_ANNOUNCEMENT_CAPACITY};
use crate::config::{resolve_config, MeshConfig};
use crate::diagnostics::{Diagnostics, TracingDiagnostics};
use crate::filter::NamespaceFilter;
use crate::key::WatchedResourceKey;
use crate::readiness::ReadinessSignal;
use crate::sync::{coordinate, SyncContext, SyncState, SyncStateCell};
use futures::Stream;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::{Api, Client};
use kube_runtime::reflector::Store;
use kube_runtime::reflector::store::Writer;
use kube_runtime::{watcher, WatchStreamExt};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::error;

/// Tunables of a watch client.
#[derive(Debug, Clone)]
pub struct WatchOptions {
    /// Data entry holding the payload. When unset the ConfigMap must have
    /// exactly one entry.
    pub payload_key: Option<String>,
    /// Buffer size of the announcement channel
    pub announcement_capacity: usize,
    /// Where read-path failures are reported
    pub diagnostics: Arc<dyn Diagnostics>,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            payload_key: None,
            announcement_capacity: DEFAULT_ANNOUNCEMENT_CAPACITY,
            diagnostics: Arc::new(TracingDiagnostics),
        }
    }
}

/// Mirrors one ConfigMap and serves its decoded configuration.
pub struct WatchClient {
    key: WatchedResourceKey,
    store: Store<ConfigMap>,
    ready: ReadinessSignal,
    state: SyncStateCell,
    announcements: Option<mpsc::Receiver<Announcement<ConfigMap>>>,
    dropped: Arc<AtomicU64>,
    payload_key: Option<String>,
    diagnostics: Arc<dyn Diagnostics>,
    task: JoinHandle<()>,
}

impl fmt::Debug for WatchClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchClient")
            .field("key", &self.key)
            .field("state", &self.state.get())
            .field("payload_key", &self.payload_key)
            .field("dropped", &self.dropped_announcements())
            .finish_non_exhaustive()
    }
}

impl WatchClient {
    /// Starts watching `namespace/name` with default options.
    ///
    /// Must be called within a Tokio runtime. Returns immediately; the
    /// initial sync happens in the background.
    pub fn new(
        client: Client,
        stop: CancellationToken,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self::with_options(
            client,
            stop,
            WatchedResourceKey::new(namespace, name),
            WatchOptions::default(),
        )
    }

    /// Starts watching `key` with the given options.
    ///
    /// ConfigMaps are watched cluster-wide and filtered down to the key's
    /// namespace before being announced.
    pub fn with_options(
        client: Client,
        stop: CancellationToken,
        key: WatchedResourceKey,
        options: WatchOptions,
    ) -> Self {
        let api: Api<ConfigMap> = Api::all(client);
        let stream = watcher(api, watcher::Config::default()).default_backoff();
        Self::from_stream(stream, stop, key, options)
    }

    /// Starts a client fed by an arbitrary list-watch event stream.
    pub fn from_stream<S>(
        stream: S,
        stop: CancellationToken,
        key: WatchedResourceKey,
        options: WatchOptions,
    ) -> Self
    where
        S: Stream<Item = Result<watcher::Event<ConfigMap>, watcher::Error>> + Send + 'static,
    {
        let writer: Writer<ConfigMap> = Writer::default();
        let store = writer.as_reader();
        let (relay, announcements) = AnnouncementRelay::channel(options.announcement_capacity);
        let dropped = relay.dropped_counter();
        let ready = ReadinessSignal::new();
        let state = SyncStateCell::new();

        let ctx = SyncContext {
            key: key.clone(),
            writer,
            filter: NamespaceFilter::new(key.namespace()),
            relay,
            ready: ready.clone(),
            state: state.clone(),
            stop,
        };
        let task = tokio::spawn(async move {
            if let Err(err) = coordinate(stream, ctx).await {
                error!("Failed initial cache sync for ConfigMap watcher: {}", err);
            }
        });

        Self {
            key,
            store,
            ready,
            state,
            announcements: Some(announcements),
            dropped,
            payload_key: options.payload_key,
            diagnostics: options.diagnostics,
            task,
        }
    }

    /// Key of the watched ConfigMap.
    pub fn key(&self) -> &WatchedResourceKey {
        &self.key
    }

    /// Current configuration. Falls back to `MeshConfig::default()` when the
    /// ConfigMap is missing, empty, ambiguous or malformed.
    pub fn get_config(&self) -> MeshConfig {
        let cached = self.store.get(&self.key.object_ref());
        resolve_config(
            &self.key,
            cached.as_deref(),
            self.payload_key.as_deref(),
            self.diagnostics.as_ref(),
        )
    }

    /// Handle to the one-shot readiness signal.
    pub fn ready(&self) -> ReadinessSignal {
        self.ready.clone()
    }

    /// Progress of the initial sync.
    pub fn sync_state(&self) -> SyncState {
        self.state.get()
    }

    /// Takes the announcement receiver. Returns `None` after the first call.
    ///
    /// Until taken, announcements queue up and are dropped once the buffer
    /// is full.
    pub fn take_announcements(&mut self) -> Option<mpsc::Receiver<Announcement<ConfigMap>>> {
        self.announcements.take()
    }

    /// Announcements dropped because the channel was full.
    pub fn dropped_announcements(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Waits for the background task to finish, which happens after the stop
    /// signal fires or the watch stream ends.
    pub async fn stopped(self) {
        if let Err(err) = self.task.await {
            error!("ConfigMap watcher task for {} failed: {}", self.key, err);
        }
    }
}

//! List-watch loop and initial sync coordination.
//!
//! The coordinator owns the only background task of a watch client. It
//! spawns the watch loop, waits for the reflector store to apply the initial
//! listing and then closes the readiness signal. If the stop signal fires or
//! the stream ends first, the readiness signal stays open.

use crate::announcement::{AnnouncementKind, AnnouncementRelay};
use crate::error::SyncError;
use crate::filter::NamespaceFilter;
use crate::key::WatchedResourceKey;
use crate::readiness::ReadinessSignal;
use futures::{Stream, StreamExt};
use kube::Resource;
use kube_runtime::reflector::store::Writer;
use kube_runtime::reflector::{ObjectRef, Store};
use kube_runtime::watcher;
use std::collections::HashSet;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Progress of the initial cache sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Client built, watch not started yet
    Created,
    /// Watch running, initial listing not yet applied
    Watching,
    /// Initial listing applied and readiness signalled
    Synced,
}

/// Shared, lock-free holder for a `SyncState`.
#[derive(Debug, Clone)]
pub(crate) struct SyncStateCell(Arc<AtomicU8>);

impl SyncStateCell {
    pub(crate) fn new() -> Self {
        Self(Arc::new(AtomicU8::new(SyncState::Created as u8)))
    }

    pub(crate) fn get(&self) -> SyncState {
        match self.0.load(Ordering::Acquire) {
            0 => SyncState::Created,
            1 => SyncState::Watching,
            _ => SyncState::Synced,
        }
    }

    fn set(&self, state: SyncState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

/// Everything the background task needs, moved into it at spawn time.
pub(crate) struct SyncContext<K>
where
    K: Resource + Clone + 'static,
    K::DynamicType: Eq + Hash + Clone,
{
    pub(crate) key: WatchedResourceKey,
    pub(crate) writer: Writer<K>,
    pub(crate) filter: NamespaceFilter,
    pub(crate) relay: AnnouncementRelay<K>,
    pub(crate) ready: ReadinessSignal,
    pub(crate) state: SyncStateCell,
    pub(crate) stop: CancellationToken,
}

/// Announcement for `event`, judged against the store before the event is applied.
fn classify<'a, K>(store: &Store<K>, event: &'a watcher::Event<K>) -> Option<(AnnouncementKind, &'a K)>
where
    K: Resource + Clone + 'static,
    K::DynamicType: Default + Eq + Hash + Clone,
{
    match event {
        watcher::Event::Apply(obj) | watcher::Event::InitApply(obj) => {
            let kind = if store.get(&ObjectRef::from_obj(obj)).is_some() {
                AnnouncementKind::Updated
            } else {
                AnnouncementKind::Added
            };
            Some((kind, obj))
        }
        watcher::Event::Delete(obj) => Some((AnnouncementKind::Deleted, obj)),
        watcher::Event::Init | watcher::Event::InitDone => None,
    }
}

/// Tracks which objects a relist has delivered so far.
///
/// On `InitDone` the reflector replaces its whole state with the relisted
/// objects. Anything cached but missing from the relist is gone, and has to
/// be announced as deleted since no `Delete` event will follow.
struct RelistTracker<K>
where
    K: Resource,
    K::DynamicType: Eq + Hash,
{
    seen: Option<HashSet<ObjectRef<K>>>,
}

impl<K> RelistTracker<K>
where
    K: Resource + Clone + 'static,
    K::DynamicType: Default + Eq + Hash + Clone,
{
    fn new() -> Self {
        Self { seen: None }
    }

    /// Records `event`. On `InitDone`, returns the cached objects the relist
    /// did not deliver.
    fn observe(&mut self, store: &Store<K>, event: &watcher::Event<K>) -> Vec<Arc<K>> {
        match event {
            watcher::Event::Init => {
                self.seen = Some(HashSet::new());
                Vec::new()
            }
            watcher::Event::InitApply(obj) => {
                if let Some(seen) = self.seen.as_mut() {
                    seen.insert(ObjectRef::from_obj(obj));
                }
                Vec::new()
            }
            watcher::Event::InitDone => match self.seen.take() {
                Some(seen) => store
                    .state()
                    .into_iter()
                    .filter(|obj| !seen.contains(&ObjectRef::from_obj(obj.as_ref())))
                    .collect(),
                None => Vec::new(),
            },
            watcher::Event::Apply(_) | watcher::Event::Delete(_) => Vec::new(),
        }
    }
}

/// Applies watch events to the store and relays the ones in the watched namespace.
///
/// Runs until the stop signal fires or the stream ends.
async fn run_watch_loop<K, S>(
    stream: S,
    mut writer: Writer<K>,
    filter: NamespaceFilter,
    relay: AnnouncementRelay<K>,
    stop: CancellationToken,
) where
    K: Resource + Clone + Debug + Send + Sync + 'static,
    K::DynamicType: Default + Eq + Hash + Clone,
    S: Stream<Item = Result<watcher::Event<K>, watcher::Error>>,
{
    let store = writer.as_reader();
    let mut relist = RelistTracker::new();
    let mut stream = std::pin::pin!(stream);

    loop {
        let next = tokio::select! {
            () = stop.cancelled() => {
                info!("Stop requested, ending watch of namespace {}", filter.namespace());
                break;
            }
            next = stream.next() => next,
        };

        let event = match next {
            Some(Ok(event)) => event,
            Some(Err(err)) => {
                // The production stream retries with backoff after errors
                warn!("Watch stream error: {}", err);
                continue;
            }
            None => {
                warn!("Watch stream ended");
                break;
            }
        };

        match &event {
            watcher::Event::Init => debug!("Watch relist started"),
            watcher::Event::InitDone => debug!("Watch relist complete"),
            _ => {}
        }

        let announcement = classify(&store, &event);
        let vanished = relist.observe(&store, &event);
        writer.apply_watcher_event(&event);

        if let Some((kind, obj)) = announcement {
            if filter.should_observe(obj) {
                debug!("Observed {} {:?}", kind, obj.meta().name);
                relay.announce(kind, Arc::new(obj.clone()));
            }
        }
        for obj in vanished {
            if filter.should_observe(obj.as_ref()) {
                debug!("Observed deleted {:?} (missing from relist)", obj.meta().name);
                relay.announce(AnnouncementKind::Deleted, obj);
            }
        }
    }
}

/// Runs the sync coordinator to completion.
///
/// Returns once the watch loop has ended, or early with an error if the
/// initial sync never completed.
pub(crate) async fn coordinate<K, S>(stream: S, ctx: SyncContext<K>) -> Result<(), SyncError>
where
    K: Resource + Clone + Debug + Send + Sync + 'static,
    K::DynamicType: Default + Eq + Hash + Clone + Send + Sync,
    S: Stream<Item = Result<watcher::Event<K>, watcher::Error>> + Send + 'static,
{
    let SyncContext {
        key,
        writer,
        filter,
        relay,
        ready,
        state,
        stop,
    } = ctx;
    let store = writer.as_reader();

    let watch = tokio::spawn(run_watch_loop(stream, writer, filter, relay, stop.clone()));
    state.set(SyncState::Watching);
    info!("Started ConfigMap watcher for {}", key);
    info!("Waiting for cache sync of {}", key);

    let synced = tokio::select! {
        biased;
        res = store.wait_until_ready() => {
            res.map_err(|source| SyncError::StreamEnded { key: key.to_string(), source })
        }
        () = stop.cancelled() => Err(SyncError::Stopped(key.to_string())),
    };

    if synced.is_ok() {
        state.set(SyncState::Synced);
        if ready.mark_ready() {
            info!("Cache sync for {} finished", key);
        }
    }

    // The watch loop ends on its own once stopped or out of events
    if let Err(err) = watch.await {
        error!("Watch loop for {} panicked: {}", key, err);
    }
    synced
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::ConfigMap;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn config_map(namespace: &str, name: &str) -> ConfigMap {
        ConfigMap {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_sync_state_cell_transitions() {
        let cell = SyncStateCell::new();
        assert_eq!(cell.get(), SyncState::Created);
        cell.set(SyncState::Watching);
        assert_eq!(cell.get(), SyncState::Watching);
        cell.set(SyncState::Synced);
        assert_eq!(cell.clone().get(), SyncState::Synced);
    }

    #[test]
    fn test_classify_add_then_update() {
        let mut writer: Writer<ConfigMap> = Writer::default();
        let store = writer.as_reader();
        let event = watcher::Event::Apply(config_map("osm-system", "osm-config"));

        assert!(matches!(classify(&store, &event), Some((AnnouncementKind::Added, _))));
        writer.apply_watcher_event(&event);
        assert!(matches!(classify(&store, &event), Some((AnnouncementKind::Updated, _))));
    }

    #[test]
    fn test_relist_reports_objects_missing_from_it() {
        let mut writer: Writer<ConfigMap> = Writer::default();
        let store = writer.as_reader();
        let mut relist = RelistTracker::new();

        let initial = [
            watcher::Event::Init,
            watcher::Event::InitApply(config_map("osm-system", "osm-config")),
            watcher::Event::InitApply(config_map("osm-system", "keep-me")),
            watcher::Event::InitDone,
        ];
        for event in &initial {
            assert!(relist.observe(&store, event).is_empty());
            writer.apply_watcher_event(event);
        }

        let relisted = [
            watcher::Event::Init,
            watcher::Event::InitApply(config_map("osm-system", "keep-me")),
        ];
        for event in &relisted {
            assert!(relist.observe(&store, event).is_empty());
            writer.apply_watcher_event(event);
        }
        let vanished = relist.observe(&store, &watcher::Event::InitDone);
        let names: Vec<_> = vanished.iter().map(|obj| obj.metadata.name.clone()).collect();
        assert_eq!(names, vec![Some("osm-config".to_string())]);
    }

    #[test]
    fn test_init_done_without_init_reports_nothing() {
        let mut writer: Writer<ConfigMap> = Writer::default();
        let store = writer.as_reader();
        writer.apply_watcher_event(&watcher::Event::Apply(config_map("osm-system", "osm-config")));

        let mut relist = RelistTracker::new();
        assert!(relist.observe(&store, &watcher::Event::InitDone).is_empty());
    }

    #[test]
    fn test_classify_delete_and_markers() {
        let store = Writer::<ConfigMap>::default().as_reader();
        let delete = watcher::Event::Delete(config_map("osm-system", "osm-config"));
        assert!(matches!(classify(&store, &delete), Some((AnnouncementKind::Deleted, _))));
        assert!(classify(&store, &watcher::Event::<ConfigMap>::Init).is_none());
        assert!(classify(&store, &watcher::Event::<ConfigMap>::InitDone).is_none());
    }
}

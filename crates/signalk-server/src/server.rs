//! SignalK host bus.
//!
//! This module provides the event loop that:
//! - Applies incoming deltas to the store
//! - Fans self-vessel values out to per-path change feeds
//! - Broadcasts processed deltas to observers
//!
//! Provider status (the last error a plugin reported) is kept alongside.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use serde::Serialize;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use signalk_core::{iso_timestamp, Delta, MemoryStore, SignalKStore, SELF_CONTEXT};

/// Capacity of each per-path change feed.
const FEED_CAPACITY: usize = 64;

/// Configuration for the SignalK host.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server name reported on discovery.
    pub name: String,
    /// SignalK version.
    pub version: String,
    /// Self vessel URN.
    pub self_urn: String,
    /// Directory plugins may keep files in.
    pub config_path: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "signalk-tides".to_string(),
            version: "1.7.0".to_string(),
            self_urn: "vessels.urn:mrn:signalk:uuid:00000000-0000-0000-0000-000000000000"
                .to_string(),
            config_path: PathBuf::from("."),
        }
    }
}

/// Events that can be sent to the server.
#[derive(Debug, Clone)]
pub enum ServerEvent {
    /// A delta was produced by a provider or plugin.
    DeltaReceived {
        /// Id of the producer, used as `$source` when the delta has none.
        source: String,
        delta: Delta,
    },
}

/// Status of a data provider (plugin).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderStatus {
    pub id: String,
    pub message: String,
    pub is_error: bool,
    pub timestamp: String,
}

/// Per-path broadcast channels for self-vessel values.
#[derive(Default)]
struct PathFeeds {
    senders: Mutex<HashMap<String, broadcast::Sender<Value>>>,
}

impl PathFeeds {
    fn subscribe(&self, path: &str) -> broadcast::Receiver<Value> {
        let mut senders = self.senders.lock().unwrap_or_else(PoisonError::into_inner);
        senders
            .entry(path.to_string())
            .or_insert_with(|| broadcast::channel(FEED_CAPACITY).0)
            .subscribe()
    }

    /// Send to the path's feed. A feed whose receivers are all gone is removed.
    fn publish(&self, path: &str, value: Value) {
        let mut senders = self.senders.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(tx) = senders.get(path) else {
            return;
        };
        if tx.send(value).is_err() {
            senders.remove(path);
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.senders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Cloneable access to the running host.
#[derive(Clone)]
pub struct ServerHandle {
    config: Arc<ServerConfig>,
    store: Arc<RwLock<MemoryStore>>,
    feeds: Arc<PathFeeds>,
    status: Arc<RwLock<HashMap<String, ProviderStatus>>>,
    event_tx: mpsc::Sender<ServerEvent>,
    delta_tx: broadcast::Sender<Delta>,
}

impl ServerHandle {
    /// The self context, "vessels.urn:mrn:signalk:uuid:...".
    pub fn self_context(&self) -> String {
        self.read_store().self_urn().to_string()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Current value at a path relative to the self vessel.
    pub fn self_value(&self, path: &str) -> Option<Value> {
        self.read_store().self_value(path)
    }

    /// Snapshot of the full data model.
    pub fn full_model(&self) -> Value {
        self.read_store().full_model().clone()
    }

    /// Node at an absolute dotted path. A leading "vessels.self" addresses
    /// the self vessel.
    pub fn path_value(&self, path: &str) -> Option<Value> {
        let store = self.read_store();
        match path.strip_prefix(SELF_CONTEXT) {
            Some("") => store.get_path(store.self_urn()),
            Some(rest) => rest
                .strip_prefix('.')
                .and_then(|rest| store.get_self_path(rest)),
            None => store.get_path(path),
        }
    }

    /// Subscribe to future values of a self path. The current value is not replayed.
    pub fn subscribe_self(&self, path: &str) -> broadcast::Receiver<Value> {
        self.feeds.subscribe(path)
    }

    /// Subscribe to every delta after it has been applied to the store.
    pub fn subscribe_deltas(&self) -> broadcast::Receiver<Delta> {
        self.delta_tx.subscribe()
    }

    /// Hand a delta to the event loop without waiting.
    ///
    /// A full or closed queue drops the delta with a warning.
    pub fn handle_message(&self, source: &str, delta: Delta) {
        let event = ServerEvent::DeltaReceived {
            source: source.to_string(),
            delta,
        };
        if let Err(e) = self.event_tx.try_send(event) {
            warn!("Dropping delta from {}: {}", source, e);
        }
    }

    /// Record an error reported by a provider. Logging is left to the caller.
    pub fn set_provider_error(&self, id: &str, message: &str) {
        self.set_status(id, message, true);
    }

    /// Record a non-error status message for a provider.
    pub fn set_provider_status(&self, id: &str, message: &str) {
        debug!("{} status: {}", id, message);
        self.set_status(id, message, false);
    }

    pub fn provider_status(&self, id: &str) -> Option<ProviderStatus> {
        self.status
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    fn set_status(&self, id: &str, message: &str, is_error: bool) {
        let status = ProviderStatus {
            id: id.to_string(),
            message: message.to_string(),
            is_error,
            timestamp: iso_timestamp(chrono::Utc::now()),
        };
        self.status
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.to_string(), status);
    }

    fn read_store(&self) -> std::sync::RwLockReadGuard<'_, MemoryStore> {
        self.store.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply a delta and notify feeds and observers.
    fn process(&self, source: &str, mut delta: Delta) {
        for update in &mut delta.updates {
            if update.source_ref.is_none() {
                update.source_ref = Some(source.to_string());
            }
        }

        let applied = self
            .store
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .apply_delta(&delta);

        for pv in applied {
            self.feeds.publish(&pv.path, pv.value);
        }

        let _ = self.delta_tx.send(delta);
    }
}

/// The SignalK host event loop.
pub struct SignalKServer {
    handle: ServerHandle,
    event_rx: mpsc::Receiver<ServerEvent>,
}

impl SignalKServer {
    /// Create a new host with the given configuration.
    pub fn new(config: ServerConfig) -> Self {
        let store = MemoryStore::new(&config.self_urn);
        let (delta_tx, _) = broadcast::channel(1024);
        let (event_tx, event_rx) = mpsc::channel(1024);

        let handle = ServerHandle {
            config: Arc::new(config),
            store: Arc::new(RwLock::new(store)),
            feeds: Arc::new(PathFeeds::default()),
            status: Arc::new(RwLock::new(HashMap::new())),
            event_tx,
            delta_tx,
        };

        Self { handle, event_rx }
    }

    pub fn handle(&self) -> ServerHandle {
        self.handle.clone()
    }

    /// Process events until every sender has been dropped.
    ///
    /// The loop's own handle keeps one sender alive, so in practice this runs
    /// until the task is aborted.
    pub async fn run(mut self) {
        info!("SignalK host started for {}", self.handle.config.self_urn);

        while let Some(event) = self.event_rx.recv().await {
            match event {
                ServerEvent::DeltaReceived { source, delta } => {
                    debug!("Delta from {}: {} value(s)", source, delta.value_count());
                    self.handle.process(&source, delta);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_feed_dropped_after_last_receiver() {
        let feeds = PathFeeds::default();
        let mut kept = feeds.subscribe("navigation.position");
        let dropped = feeds.subscribe("navigation.datetime");
        drop(dropped);
        assert_eq!(feeds.len(), 2);

        feeds.publish("navigation.position", json!(1));
        feeds.publish("navigation.datetime", json!("2024-03-10T06:00:00.000Z"));
        assert_eq!(feeds.len(), 1);
        assert_eq!(kept.try_recv().unwrap(), json!(1));

        // Resubscribing recreates the feed.
        let mut again = feeds.subscribe("navigation.datetime");
        feeds.publish("navigation.datetime", json!("2024-03-10T07:00:00.000Z"));
        assert_eq!(again.try_recv().unwrap(), json!("2024-03-10T07:00:00.000Z"));
    }
}

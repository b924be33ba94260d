//! SignalK data store.
//!
//! The store maintains the current state of all SignalK data. Applying a
//! delta reports the self-vessel values it wrote so that the host can fan
//! them out to per-path change feeds.

use crate::model::{Delta, PathValue, SELF_CONTEXT};
use serde_json::{Map, Value};

/// Trait for SignalK data storage implementations.
pub trait SignalKStore: Send + Sync {
    /// Apply a delta to the store, merging values into the tree.
    ///
    /// Returns the values that landed on the self vessel, in delta order.
    fn apply_delta(&mut self, delta: &Delta) -> Vec<PathValue>;

    /// Get the stored node at an absolute path (e.g., "vessels.self.navigation.position").
    fn get_path(&self, path: &str) -> Option<Value>;

    /// Get the stored node relative to self vessel, including `$source` and `timestamp`.
    fn get_self_path(&self, path: &str) -> Option<Value>;

    /// Get just the value relative to self vessel (e.g., "navigation.position").
    fn self_value(&self, path: &str) -> Option<Value> {
        self.get_self_path(path)
            .and_then(|node| node.get("value").cloned())
            .filter(|v| !v.is_null())
    }

    /// Get the self vessel identifier.
    fn self_urn(&self) -> &str;

    /// Get the full data model as JSON.
    fn full_model(&self) -> &Value;
}

/// In-memory SignalK store implementation.
///
/// Stores the full SignalK tree as a nested JSON structure.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    data: Value,
    /// The self vessel context, "vessels.urn:mrn:signalk:uuid:..."
    self_urn: String,
}

impl MemoryStore {
    /// Create a new empty store with the given self vessel URN.
    ///
    /// The URN may be given with or without the "vessels." prefix.
    pub fn new(self_urn: &str) -> Self {
        let urn_key = self_urn.strip_prefix("vessels.").unwrap_or(self_urn);
        let self_urn = format!("vessels.{urn_key}");

        let data = serde_json::json!({
            "version": "1.7.0",
            "self": self_urn,
            "vessels": {
                urn_key: {}
            },
            "sources": {}
        });

        Self { data, self_urn }
    }

    fn resolve_context(&self, context: Option<&str>) -> String {
        match context {
            None | Some(SELF_CONTEXT) => self.self_urn.clone(),
            Some(other) => other.to_string(),
        }
    }

    /// Set a value at a dotted path, creating intermediate objects as needed.
    /// A non-object node in the way is replaced by an object.
    fn set_path_value(&mut self, full_path: &str, value: Value) {
        let segments: Vec<&str> = full_path.split('.').collect();
        let Some((last, parents)) = segments.split_last() else {
            return;
        };

        let mut current = &mut self.data;
        for segment in parents {
            let Value::Object(map) = current else {
                return;
            };
            let child = map
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !child.is_object() {
                *child = Value::Object(Map::new());
            }
            current = child;
        }

        if let Value::Object(map) = current {
            map.insert(last.to_string(), value);
        }
    }

    fn get_path_value(&self, path: &str) -> Option<Value> {
        let mut current = &self.data;
        for segment in path.split('.') {
            current = current.as_object()?.get(segment)?;
        }
        Some(current.clone())
    }
}

impl SignalKStore for MemoryStore {
    fn apply_delta(&mut self, delta: &Delta) -> Vec<PathValue> {
        let context = self.resolve_context(delta.context.as_deref());
        let is_self = context == self.self_urn;
        let mut applied = Vec::new();

        for update in &delta.updates {
            for pv in &update.values {
                let node = serde_json::json!({
                    "value": pv.value,
                    "$source": update.source_ref,
                    "timestamp": update.timestamp
                });
                self.set_path_value(&format!("{}.{}", context, pv.path), node);

                if is_self {
                    applied.push(pv.clone());
                }
            }
        }

        applied
    }

    fn get_path(&self, path: &str) -> Option<Value> {
        self.get_path_value(path)
    }

    fn get_self_path(&self, path: &str) -> Option<Value> {
        self.get_path_value(&format!("{}.{}", self.self_urn, path))
    }

    fn self_urn(&self) -> &str {
        &self.self_urn
    }

    fn full_model(&self) -> &Value {
        &self.data
    }
}

//! SignalK data model types.
//!
//! These types represent the subset of the SignalK specification that
//! plugins exchange with the server:
//! - Delta messages carrying timestamped path/value updates
//! - WGS84 positions as published on `navigation.position`

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Context used by deltas that target the server's own vessel.
pub const SELF_CONTEXT: &str = "vessels.self";

/// A SignalK delta message containing one or more updates.
///
/// Deltas are the primary mechanism for transmitting changes in SignalK.
/// They contain a context (which vessel/object) and a list of updates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delta {
    /// The context path (e.g., "vessels.urn:mrn:signalk:uuid:...")
    /// If None, defaults to "vessels.self"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,

    /// The list of updates in this delta
    pub updates: Vec<Update>,
}

impl Delta {
    /// Build a single-update delta stamped with the current time.
    pub fn with_values(context: impl Into<String>, values: Vec<PathValue>) -> Self {
        Self {
            context: Some(context.into()),
            updates: vec![Update {
                source_ref: None,
                timestamp: Some(iso_timestamp(Utc::now())),
                values,
            }],
        }
    }

    /// Total number of path values across all updates.
    pub fn value_count(&self) -> usize {
        self.updates.iter().map(|u| u.values.len()).sum()
    }
}

/// A single update within a delta, containing values from one source at one timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Update {
    /// Reference to the producing source (a plugin id for plugin output)
    #[serde(rename = "$source", skip_serializing_if = "Option::is_none")]
    pub source_ref: Option<String>,

    /// ISO 8601 timestamp (UTC)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,

    /// The path-value pairs in this update
    pub values: Vec<PathValue>,
}

/// A single path-value pair within an update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathValue {
    /// The SignalK path (e.g., "environment.tide.heightHigh")
    pub path: String,

    /// The value at this path
    pub value: serde_json::Value,
}

impl PathValue {
    pub fn new(path: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        Self {
            path: path.into(),
            value: value.into(),
        }
    }
}

/// Position in WGS84 coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,
}

impl Position {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            altitude: None,
        }
    }

    /// Decode a `navigation.position` value. Returns None when either
    /// coordinate is missing or not a number.
    pub fn from_value(value: &serde_json::Value) -> Option<Self> {
        Some(Self {
            latitude: value.get("latitude")?.as_f64()?,
            longitude: value.get("longitude")?.as_f64()?,
            altitude: value.get("altitude").and_then(|a| a.as_f64()),
        })
    }
}

/// Format a timestamp the way SignalK servers do: RFC 3339, UTC, milliseconds.
pub fn iso_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_delta_deserialize() {
        let json = r#"{
            "context": "vessels.self",
            "updates": [{
                "$source": "tides-api",
                "timestamp": "2024-01-17T10:30:00.000Z",
                "values": [
                    {"path": "environment.tide.heightHigh", "value": 1.85}
                ]
            }]
        }"#;

        let delta: Delta = serde_json::from_str(json).unwrap();
        assert_eq!(delta.context, Some("vessels.self".to_string()));
        assert_eq!(delta.updates.len(), 1);
        assert_eq!(delta.updates[0].source_ref, Some("tides-api".to_string()));
        assert_eq!(delta.updates[0].values[0].path, "environment.tide.heightHigh");
    }

    #[test]
    fn test_with_values_stamps_single_update() {
        let delta = Delta::with_values(
            "vessels.urn:mrn:signalk:uuid:test",
            vec![
                PathValue::new("environment.tide.heightLow", 0.2),
                PathValue::new("environment.tide.timeLow", "2024-01-17T16:00:00.000Z"),
            ],
        );

        assert_eq!(delta.updates.len(), 1);
        assert_eq!(delta.value_count(), 2);
        assert!(delta.updates[0].timestamp.is_some());

        let json = serde_json::to_string(&delta).unwrap();
        assert!(!json.contains("$source"));
        assert!(json.contains("environment.tide.timeLow"));
    }

    #[test]
    fn test_position_from_value() {
        let value = serde_json::json!({"latitude": 47.6, "longitude": -122.3});
        assert_eq!(Position::from_value(&value), Some(Position::new(47.6, -122.3)));

        let missing = serde_json::json!({"latitude": 47.6});
        assert_eq!(Position::from_value(&missing), None);
        assert_eq!(Position::from_value(&serde_json::json!("nope")), None);
    }

    #[test]
    fn test_iso_timestamp_millis() {
        let at = Utc.with_ymd_and_hms(2024, 1, 17, 10, 30, 0).unwrap();
        assert_eq!(iso_timestamp(at), "2024-01-17T10:30:00.000Z");
    }
}

//! Tide prediction stations and nearest-station lookup.

use std::collections::HashMap;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use signalk_core::Position;
use signalk_plugins::CalcError;

/// Mean equatorial radius in metres.
const EARTH_RADIUS_M: f64 = 6_378_137.0;

/// One entry of the NOAA station list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_id: Option<String>,
    #[serde(default)]
    pub name: String,
    pub lat: f64,
    pub lng: f64,
}

impl Station {
    pub fn position(&self) -> Position {
        Position::new(self.lat, self.lng)
    }

    /// Id of the harmonic station predictions are published under.
    pub fn reference_id(&self) -> &str {
        self.reference_id.as_deref().unwrap_or(&self.id)
    }
}

/// Great-circle distance in metres (haversine).
pub fn distance(a: Position, b: Position) -> f64 {
    let (lat1, lat2) = (a.latitude.to_radians(), b.latitude.to_radians());
    let dlat = lat2 - lat1;
    let dlon = (b.longitude - a.longitude).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
}

/// Stations keyed by id, in the order they were first listed.
///
/// The distance ordering is computed once, from the first position it is
/// asked about, and reused for every later lookup.
#[derive(Debug, Default)]
pub struct StationTable {
    stations: Vec<Station>,
    by_id: HashMap<String, usize>,
    sorted: OnceLock<Vec<usize>>,
}

impl StationTable {
    pub fn new(list: Vec<Station>) -> Self {
        let mut stations: Vec<Station> = Vec::with_capacity(list.len());
        let mut by_id = HashMap::with_capacity(list.len());

        // A repeated id keeps its first slot and takes the later record.
        for station in list {
            match by_id.get(&station.id) {
                Some(&index) => stations[index] = station,
                None => {
                    by_id.insert(station.id.clone(), stations.len());
                    stations.push(station);
                }
            }
        }

        Self {
            stations,
            by_id,
            sorted: OnceLock::new(),
        }
    }

    /// Decode a `{ "stations": [...] }` document.
    pub fn from_document(document: &Value) -> Result<Self, CalcError> {
        let list = document
            .get("stations")
            .cloned()
            .ok_or_else(|| CalcError::MalformedCache("missing stations".to_string()))?;
        let list: Vec<Station> =
            serde_json::from_value(list).map_err(|e| CalcError::MalformedCache(e.to_string()))?;
        Ok(Self::new(list))
    }

    pub fn parse(bytes: &[u8]) -> Result<Self, CalcError> {
        let document: Value =
            serde_json::from_slice(bytes).map_err(|e| CalcError::MalformedCache(e.to_string()))?;
        Self::from_document(&document)
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Station> {
        self.by_id.get(id).map(|&index| &self.stations[index])
    }

    pub fn stations(&self) -> &[Station] {
        &self.stations
    }

    /// Up to `limit` stations by distance.
    pub fn nearest(&self, position: Position, limit: usize) -> Vec<&Station> {
        self.sorted_from(position)
            .iter()
            .take(limit)
            .map(|&index| &self.stations[index])
            .collect()
    }

    pub fn closest(&self, position: Position) -> Option<&Station> {
        self.nearest(position, 1).into_iter().next()
    }

    fn sorted_from(&self, position: Position) -> &[usize] {
        self.sorted.get_or_init(|| {
            let distances: Vec<f64> = self
                .stations
                .iter()
                .map(|s| distance(position, s.position()))
                .collect();
            let mut order: Vec<usize> = (0..self.stations.len()).collect();
            // Stable, so equal distances keep list order.
            order.sort_by(|&a, &b| distances[a].total_cmp(&distances[b]));
            order
        })
    }
}

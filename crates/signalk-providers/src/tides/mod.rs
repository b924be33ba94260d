//! Tide calculations for the `tides-api` plugin.
//!
//! Each provider publishes the next low and high water:
//!
//! | Path                           | Value                 |
//! |--------------------------------|-----------------------|
//! | `environment.tide.heightLow`   | metres                |
//! | `environment.tide.timeLow`     | ISO 8601 UTC          |
//! | `environment.tide.heightHigh`  | metres                |
//! | `environment.tide.timeHigh`    | ISO 8601 UTC          |
//!
//! Providers skip the network while both recorded events are still ahead.

pub mod noaa;
pub mod worldtides;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;

use signalk_core::{iso_timestamp, PathValue, Position};
use signalk_plugins::{CalcError, Calculation, CalculationPlugin, PluginInfo, ServerApi, Trigger};

use crate::http::Fetcher;

pub use noaa::{ClosestTides, NoaaTides};
pub use worldtides::WorldTides;

pub const PLUGIN_ID: &str = "tides-api";
pub const PLUGIN_NAME: &str = "Tide APIs";
pub const PLUGIN_DESCRIPTION: &str = "Plugin that fetches tide data from online sources";
pub const SCHEMA_TITLE: &str = "Tides API";

/// Configuration group all tide providers share.
pub const GROUP: &str = "tides";

pub const POSITION_PATH: &str = "navigation.position";
pub const DATETIME_PATH: &str = "navigation.datetime";

pub const HEIGHT_LOW: &str = "environment.tide.heightLow";
pub const TIME_LOW: &str = "environment.tide.timeLow";
pub const HEIGHT_HIGH: &str = "environment.tide.heightHigh";
pub const TIME_HIGH: &str = "environment.tide.timeHigh";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TideKind {
    High,
    Low,
}

/// A predicted high or low water.
#[derive(Debug, Clone, PartialEq)]
pub struct TideEvent {
    pub kind: TideKind,
    pub time: DateTime<Utc>,
    /// Metres above the provider's datum.
    pub height: f64,
}

/// The first high and first low after some instant.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NextTides {
    pub low: Option<TideEvent>,
    pub high: Option<TideEvent>,
}

impl NextTides {
    /// Pick the first event of each kind strictly after `now`.
    pub fn after(events: impl IntoIterator<Item = TideEvent>, now: DateTime<Utc>) -> Self {
        let mut next = Self::default();
        for event in events.into_iter().filter(|e| e.time > now) {
            let slot = match event.kind {
                TideKind::High => &mut next.high,
                TideKind::Low => &mut next.low,
            };
            if slot.is_none() {
                *slot = Some(event);
            }
        }
        next
    }

    /// Updates for whichever events were found, low water first.
    pub fn to_values(&self) -> Vec<PathValue> {
        let mut values = Vec::with_capacity(4);
        if let Some(low) = &self.low {
            values.push(PathValue::new(HEIGHT_LOW, low.height));
            values.push(PathValue::new(TIME_LOW, iso_timestamp(low.time)));
        }
        if let Some(high) = &self.high {
            values.push(PathValue::new(HEIGHT_HIGH, high.height));
            values.push(PathValue::new(TIME_HIGH, iso_timestamp(high.time)));
        }
        values
    }
}

/// Times of the last published low and high water.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TideWatch {
    low: Option<DateTime<Utc>>,
    high: Option<DateTime<Utc>>,
}

impl TideWatch {
    /// True while both recorded events are still in the future.
    pub fn is_current(&self, now: DateTime<Utc>) -> bool {
        matches!((self.low, self.high), (Some(low), Some(high)) if low > now && high > now)
    }

    pub fn record(&mut self, next: &NextTides) {
        if let Some(low) = &next.low {
            self.low = Some(low.time);
        }
        if let Some(high) = &next.high {
            self.high = Some(high.time);
        }
    }
}

/// Decode the position input. An absent or null position is `NoPosition`.
pub(crate) fn position_input(inputs: &[Value]) -> Result<Position, CalcError> {
    let value = match inputs.first() {
        None | Some(Value::Null) => return Err(CalcError::NoPosition),
        Some(value) => value,
    };
    Position::from_value(value)
        .ok_or_else(|| CalcError::InvalidInput(format!("{} is not a position", POSITION_PATH)))
}

pub fn plugin_info() -> PluginInfo {
    PluginInfo {
        id: PLUGIN_ID.to_string(),
        name: PLUGIN_NAME.to_string(),
        description: PLUGIN_DESCRIPTION.to_string(),
    }
}

/// The tide provider calculations of one plugin instance.
#[derive(Clone)]
pub struct TideProviders {
    pub noaa: Arc<NoaaTides>,
    pub worldtides: Arc<WorldTides>,
}

impl TideProviders {
    pub fn new(api: Arc<dyn ServerApi>, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            noaa: Arc::new(NoaaTides::new(api, fetcher.clone())),
            worldtides: Arc::new(WorldTides::new(fetcher)),
        }
    }

    pub fn calculations(&self) -> Vec<Arc<dyn Calculation>> {
        let noaa: Arc<dyn Calculation> = self.noaa.clone();
        let worldtides: Arc<dyn Calculation> = self.worldtides.clone();
        vec![noaa, worldtides]
    }
}

/// The `tides-api` plugin over the given providers.
pub fn tides_plugin(
    api: Arc<dyn ServerApi>,
    providers: &TideProviders,
    trigger: Trigger,
) -> CalculationPlugin {
    CalculationPlugin::new(plugin_info(), api, providers.calculations(), trigger)
        .with_schema_title(SCHEMA_TITLE)
}

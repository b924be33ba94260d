//! Tide extremes from worldtides.info (global, needs an API key).

use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::{self, FutureExt};
use reqwest::Url;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::debug;

use signalk_core::Position;
use signalk_plugins::{CalcError, CalcFuture, CalcOutput, Calculation};

use super::{position_input, NextTides, TideEvent, TideKind, TideWatch, GROUP, POSITION_PATH};
use crate::http::Fetcher;

pub const API_URL: &str = "https://www.worldtides.info/api";
pub const API_KEY_OPTION: &str = "worldtidesApiKey";

/// Seconds of extremes requested per cycle.
const LENGTH_SECS: u32 = 52_200;
const DATUM: &str = "LAT";

#[derive(Debug, Deserialize)]
struct ExtremesResponse {
    status: u16,
    error: Option<String>,
    #[serde(default)]
    extremes: Vec<Extreme>,
}

#[derive(Debug, Deserialize)]
struct Extreme {
    dt: i64,
    height: f64,
    #[serde(rename = "type")]
    kind: String,
}

impl Extreme {
    fn event(&self) -> Option<TideEvent> {
        let kind = match self.kind.as_str() {
            "High" => TideKind::High,
            "Low" => TideKind::Low,
            _ => return None,
        };
        Some(TideEvent {
            kind,
            time: DateTime::from_timestamp(self.dt, 0)?,
            height: self.height,
        })
    }
}

struct WorldTidesState {
    fetcher: Arc<dyn Fetcher>,
    api_key: RwLock<Option<String>>,
    watch: Mutex<TideWatch>,
}

impl WorldTidesState {
    fn extremes_url(&self, position: Position, now: DateTime<Utc>) -> Result<Url, CalcError> {
        let key = self
            .api_key
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| CalcError::Provider("no worldtides.info API key configured".to_string()))?;

        let mut url = Url::parse(API_URL).map_err(|e| CalcError::InvalidInput(e.to_string()))?;
        url.query_pairs_mut()
            .append_key_only("extremes")
            .append_pair("lat", &position.latitude.to_string())
            .append_pair("lon", &position.longitude.to_string())
            .append_pair("length", &LENGTH_SECS.to_string())
            .append_pair("start", &now.timestamp().to_string())
            .append_pair("datum", DATUM)
            .append_pair("key", &key);
        Ok(url)
    }

    async fn next_tides(
        self: Arc<Self>,
        url: Url,
        now: DateTime<Utc>,
    ) -> Result<Option<CalcOutput>, CalcError> {
        debug!("updating tide");
        let body = self.fetcher.get_json(url).await?;
        let response: ExtremesResponse = serde_json::from_value(body)
            .map_err(|e| CalcError::Provider(format!("unexpected response: {}", e)))?;
        if response.status != 200 {
            return Err(CalcError::Provider(format!(
                "worldtides response: {}",
                response.error.as_deref().unwrap_or("none")
            )));
        }

        let next = NextTides::after(response.extremes.iter().filter_map(Extreme::event), now);
        self.watch
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record(&next);

        Ok(Some(CalcOutput::Values(next.to_values())))
    }
}

/// Next high and low water from worldtides.info.
pub struct WorldTides {
    state: Arc<WorldTidesState>,
}

impl WorldTides {
    pub const DEBOUNCE: Duration = Duration::from_secs(60);

    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            state: Arc::new(WorldTidesState {
                fetcher,
                api_key: RwLock::new(None),
                watch: Mutex::new(TideWatch::default()),
            }),
        }
    }
}

impl Calculation for WorldTides {
    fn group(&self) -> Option<&str> {
        Some(GROUP)
    }

    fn option_key(&self) -> &str {
        "worldtides"
    }

    fn title(&self) -> &str {
        "Tide API from worldtides.info"
    }

    fn derived_from(&self) -> Vec<String> {
        vec![POSITION_PATH.to_string()]
    }

    fn debounce_delay(&self) -> Duration {
        Self::DEBOUNCE
    }

    fn properties(&self) -> Option<Map<String, Value>> {
        let mut properties = Map::new();
        properties.insert(
            API_KEY_OPTION.to_string(),
            json!({
                "type": "string",
                "title": "worldtides.info API key"
            }),
        );
        Some(properties)
    }

    fn start(&self, options: &Value) {
        let key = options
            .get(GROUP)
            .and_then(|group| group.get(API_KEY_OPTION))
            .and_then(Value::as_str)
            .filter(|key| !key.is_empty())
            .map(str::to_string);
        *self
            .state
            .api_key
            .write()
            .unwrap_or_else(PoisonError::into_inner) = key;
    }

    fn calculate(&self, inputs: &[Value]) -> Option<CalcFuture> {
        debug!("starting worldtides");
        let now = Utc::now();

        let idle = self
            .state
            .watch
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_current(now);
        if idle {
            return Some(future::ready(Ok(None)).boxed());
        }

        let url = match position_input(inputs).and_then(|p| self.state.extremes_url(p, now)) {
            Ok(url) => url,
            Err(e) => return Some(future::ready(Err(e)).boxed()),
        };

        Some(self.state.clone().next_tides(url, now).boxed())
    }
}

//! NOAA CO-OPS tide predictions (US stations only).
//!
//! Predictions come from the station nearest to the vessel. The station list
//! is read from `noaastations.json` in the config directory, or downloaded
//! once and written there.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Days, NaiveDateTime, Utc};
use futures::future::{self, FutureExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::{debug, error, info, warn};

use signalk_core::{iso_timestamp, Position};
use signalk_plugins::{CalcError, CalcFuture, CalcOutput, Calculation, ServerApi};

use super::{
    position_input, NextTides, TideEvent, TideKind, TideWatch, DATETIME_PATH, GROUP,
    PLUGIN_ID, POSITION_PATH,
};
use crate::http::{url_with_params, Fetcher};
use crate::stations::{Station, StationTable};

pub const STATIONS_URL: &str =
    "https://api.tidesandcurrents.noaa.gov/mdapi/prod/webapi/stations.json?type=tidepredictions";
pub const DATAGETTER_URL: &str = "https://api.tidesandcurrents.noaa.gov/api/prod/datagetter";
pub const STATIONS_FILE: &str = "noaastations.json";

const DATUM: &str = "MLLW";
const APPLICATION: &str = "signalk.org/node-server";
/// Hours of predictions requested per cycle.
const RANGE_HOURS: u32 = 24;
/// Prediction timestamps, always GMT.
const PREDICTION_TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

#[derive(Debug, Deserialize)]
struct DataGetterResponse {
    #[serde(default)]
    predictions: Vec<Prediction>,
    error: Option<ErrorMessage>,
}

#[derive(Debug, Deserialize)]
struct ErrorMessage {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct Prediction {
    t: String,
    v: String,
    #[serde(rename = "type", default)]
    kind: String,
}

impl Prediction {
    fn time(&self) -> Option<DateTime<Utc>> {
        NaiveDateTime::parse_from_str(&self.t, PREDICTION_TIME_FORMAT)
            .ok()
            .map(|t| t.and_utc())
    }

    fn height(&self) -> Option<f64> {
        self.v.trim().parse().ok()
    }

    fn event(&self) -> Option<TideEvent> {
        let kind = match self.kind.as_str() {
            "H" => TideKind::High,
            "L" => TideKind::Low,
            _ => return None,
        };
        Some(TideEvent {
            kind,
            time: self.time()?,
            height: self.height()?,
        })
    }
}

impl DataGetterResponse {
    fn decode(body: Value) -> Result<Self, CalcError> {
        let response: Self = serde_json::from_value(body)
            .map_err(|e| CalcError::Provider(format!("unexpected response: {}", e)))?;
        match response.error {
            Some(error) => Err(CalcError::Provider(error.message)),
            None => Ok(response),
        }
    }
}

/// Response of the closest-station query: one day of heights per date key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClosestTides {
    pub name: String,
    pub id: String,
    pub position: Position,
    /// Keyed by `YYYYMMDD`.
    pub date: BTreeMap<String, DayHeights>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DayHeights {
    pub height: HeightSeries,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HeightSeries {
    pub values: Vec<HeightValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeightValue {
    pub value: f64,
    pub time: String,
}

struct NoaaState {
    api: Arc<dyn ServerApi>,
    fetcher: Arc<dyn Fetcher>,
    /// Loaded at most once; concurrent loaders wait on the first.
    stations: OnceCell<Arc<StationTable>>,
    watch: Mutex<TideWatch>,
}

impl NoaaState {
    fn stations_file(&self) -> PathBuf {
        self.api.config_path().join(STATIONS_FILE)
    }

    fn stations(&self) -> Option<Arc<StationTable>> {
        self.stations.get().cloned()
    }

    /// `navigation.datetime` when the vessel publishes one, else the system clock.
    fn now(&self) -> DateTime<Utc> {
        self.api
            .get_self_path(DATETIME_PATH)
            .and_then(|v| v.as_str().and_then(|s| DateTime::parse_from_rfc3339(s).ok()))
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(Utc::now)
    }

    async fn load_stations(&self) -> Result<Arc<StationTable>, CalcError> {
        self.stations
            .get_or_try_init(|| self.read_stations())
            .await
            .cloned()
    }

    async fn read_stations(&self) -> Result<Arc<StationTable>, CalcError> {
        let file = self.stations_file();
        let table = match tokio::fs::read(&file).await {
            Ok(bytes) => {
                debug!("reading stations from {}", file.display());
                StationTable::parse(&bytes)?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("downloading stations...");
                let url = reqwest::Url::parse(STATIONS_URL)
                    .map_err(|e| CalcError::InvalidInput(e.to_string()))?;
                let document = self.fetcher.get_json(url).await?;
                let table = StationTable::from_document(&document)?;
                match serde_json::to_vec_pretty(&document) {
                    Ok(bytes) => {
                        if let Err(e) = tokio::fs::write(&file, bytes).await {
                            warn!("Failed to write {}: {}", file.display(), e);
                        }
                    }
                    Err(e) => warn!("Failed to encode station list: {}", e),
                }
                table
            }
            Err(e) => {
                return Err(CalcError::MalformedCache(format!(
                    "{}: {}",
                    file.display(),
                    e
                )))
            }
        };

        info!("Loaded {} NOAA tide stations", table.len());
        Ok(Arc::new(table))
    }

    async fn next_tides(
        self: Arc<Self>,
        station: Station,
        now: DateTime<Utc>,
    ) -> Result<Option<CalcOutput>, CalcError> {
        let url = url_with_params(
            DATAGETTER_URL,
            &[
                ("station", station.id.clone()),
                ("begin_date", now.format("%Y%m%d %H:%M").to_string()),
                ("range", RANGE_HOURS.to_string()),
                ("product", "predictions".to_string()),
                ("application", APPLICATION.to_string()),
                ("datum", DATUM.to_string()),
                ("time_zone", "gmt".to_string()),
                ("units", "metric".to_string()),
                ("interval", "hilo".to_string()),
                ("format", "json".to_string()),
            ],
        )?;
        debug!("{}", url);

        let response = DataGetterResponse::decode(self.fetcher.get_json(url).await?)?;
        let next = NextTides::after(
            response.predictions.iter().filter_map(Prediction::event),
            now,
        );
        self.watch
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record(&next);

        Ok(Some(CalcOutput::Values(next.to_values())))
    }
}

/// Next high and low water from the nearest NOAA station.
pub struct NoaaTides {
    state: Arc<NoaaState>,
}

impl NoaaTides {
    pub const DEBOUNCE: Duration = Duration::from_secs(10);

    pub fn new(api: Arc<dyn ServerApi>, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            state: Arc::new(NoaaState {
                api,
                fetcher,
                stations: OnceCell::new(),
                watch: Mutex::new(TideWatch::default()),
            }),
        }
    }

    /// Load the station list from the cache file, downloading it if absent.
    /// Only the first successful load does any work.
    pub async fn load_stations(&self) -> Result<Arc<StationTable>, CalcError> {
        self.state.load_stations().await
    }

    pub fn stations(&self) -> Option<Arc<StationTable>> {
        self.state.stations()
    }

    /// The full day of predictions, yesterday through today, at the station
    /// nearest to `position`. Loads the station list on first use.
    pub async fn closest_tides(&self, position: Position) -> Result<ClosestTides, CalcError> {
        let stations = match self.stations() {
            Some(stations) => stations,
            None => self.load_stations().await?,
        };
        let station = stations
            .closest(position)
            .cloned()
            .ok_or_else(|| CalcError::Provider("no tide stations".to_string()))?;

        let now = self.state.now();
        let yesterday = now.checked_sub_days(Days::new(1)).unwrap_or(now);
        let url = url_with_params(
            DATAGETTER_URL,
            &[
                ("product", "predictions".to_string()),
                ("application", APPLICATION.to_string()),
                ("begin_date", yesterday.format("%Y%m%d").to_string()),
                ("end_date", now.format("%Y%m%d").to_string()),
                ("datum", DATUM.to_string()),
                ("station", station.reference_id().to_string()),
                ("time_zone", "gmt".to_string()),
                ("units", "metric".to_string()),
                ("interval", "hilo".to_string()),
                ("format", "json".to_string()),
            ],
        )?;
        debug!("{}", url);

        let response = DataGetterResponse::decode(self.state.fetcher.get_json(url).await?)?;

        let mut date: BTreeMap<String, DayHeights> = BTreeMap::new();
        for prediction in &response.predictions {
            let (Some(time), Some(value)) = (prediction.time(), prediction.height()) else {
                warn!("Skipping malformed prediction {:?}", prediction);
                continue;
            };
            date.entry(time.format("%Y%m%d").to_string())
                .or_default()
                .height
                .values
                .push(HeightValue {
                    value,
                    time: iso_timestamp(time),
                });
        }

        Ok(ClosestTides {
            name: station.name.clone(),
            id: station.reference_id().to_string(),
            position: station.position(),
            date,
        })
    }
}

impl Calculation for NoaaTides {
    fn group(&self) -> Option<&str> {
        Some(GROUP)
    }

    fn option_key(&self) -> &str {
        "noaa"
    }

    fn title(&self) -> &str {
        "NOAA (US only)"
    }

    fn derived_from(&self) -> Vec<String> {
        vec![POSITION_PATH.to_string()]
    }

    fn debounce_delay(&self) -> Duration {
        Self::DEBOUNCE
    }

    fn start(&self, _options: &Value) {
        if self.state.stations().is_some() {
            return;
        }

        let state = self.state.clone();
        tokio::spawn(async move {
            if let Err(e) = state.load_stations().await {
                error!("error: {}", e);
                state.api.set_provider_error(PLUGIN_ID, &e.to_string());
            }
        });
    }

    fn calculate(&self, inputs: &[Value]) -> Option<CalcFuture> {
        // Nothing to do until the station list is in.
        let stations = self.state.stations()?;

        let position = match position_input(inputs) {
            Ok(position) => position,
            Err(e) => return Some(future::ready(Err(e)).boxed()),
        };

        let now = self.state.now();
        let idle = self
            .state
            .watch
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_current(now);
        if idle {
            return Some(future::ready(Ok(None)).boxed());
        }

        let Some(station) = stations.closest(position).cloned() else {
            return Some(
                future::ready(Err(CalcError::Provider("no tide stations".to_string()))).boxed(),
            );
        };

        Some(self.state.clone().next_tides(station, now).boxed())
    }
}

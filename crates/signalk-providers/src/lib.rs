//! # signalk-providers
//!
//! Tide data providers for the SignalK `tides-api` plugin.
//!
//! - [`tides::NoaaTides`]: NOAA CO-OPS predictions from the nearest US station
//! - [`tides::WorldTides`]: worldtides.info extremes anywhere, with an API key
//!
//! Both are [`signalk_plugins::Calculation`]s derived from
//! `navigation.position`. Network access goes through [`http::Fetcher`].

pub mod http;
pub mod stations;
pub mod tides;

pub use http::{Fetcher, ReqwestFetcher, Url};
pub use stations::{Station, StationTable};
pub use tides::{
    plugin_info, tides_plugin, ClosestTides, NoaaTides, TideProviders, TideWatch, WorldTides,
    PLUGIN_ID,
};

//! # signalk-plugins
//!
//! Runtime for SignalK calculation plugins.
//!
//! A plugin is a registry of [`Calculation`]s. Each calculation declares the
//! self paths it is derived from and an asynchronous function producing
//! updates. The [`Scheduler`] watches the inputs, debounces bursts, drops
//! repeated inputs inside the TTL window and delivers results to the host
//! as deltas.
//!
//! ```text
//! ServerApi::self_stream ─► combine latest ─► debounce ─► EmitGate ─► calculate
//!                                                                      │
//! ServerApi::handle_message ◄──────────── deliver ◄─────────────────────┘
//! ```

pub mod api;
pub mod calculation;
pub mod debounce;
pub mod delivery;
pub mod error;
pub mod gate;
pub mod plugin;
pub mod scheduler;
pub mod schema;

#[cfg(test)]
mod testing;

pub use api::{ChangeFeed, ServerApi};
pub use calculation::{CalcFuture, CalcOutput, Calculation, DEFAULT_DEBOUNCE};
pub use error::CalcError;
pub use gate::EmitGate;
pub use plugin::{CalculationPlugin, PluginInfo};
pub use scheduler::{Scheduler, Trigger};

//! # signalk-server
//!
//! The host side of the SignalK plugin interface.
//!
//! [`SignalKServer`] owns the event loop that applies deltas to the store.
//! Cloneable [`ServerHandle`]s give plugins and HTTP handlers what the Node.js
//! server exposes as `app`: current values, per-path change feeds, message
//! submission and provider status.

pub mod server;

pub use server::{ProviderStatus, ServerConfig, ServerEvent, ServerHandle, SignalKServer};
pub use signalk_core::{Delta, MemoryStore, SignalKStore};

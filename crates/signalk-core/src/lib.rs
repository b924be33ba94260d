//! # signalk-core
//!
//! Core SignalK data model and store implementation.
//!
//! This crate provides:
//! - Data model types (Delta, Update, PathValue, Position)
//! - In-memory store that reports which self paths a delta touched
//! - File-backed configuration storage for settings and plugin config
//!
//! This crate is intentionally runtime-agnostic and contains no async code.

pub mod config;
pub mod model;
pub mod store;

pub use config::{
    ConfigError, ConfigStorage, FileConfigStorage, PluginConfig, ServerSettings,
    TriggerMode,
};
pub use model::*;
pub use store::{MemoryStore, SignalKStore};

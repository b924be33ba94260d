//! # signalk-web
//!
//! REST API for the SignalK tides server.
//!
//! ## Architecture
//!
//! The web layer is built on Axum and provides these route groups:
//!
//! - `/signalk` - Discovery
//! - `/signalk/v1/api/` - Data model and the closest-tides resource
//! - `/skServer/` - Plugin management
//!
//! ## Usage
//!
//! ```rust,ignore
//! use signalk_web::{create_router, ServerState};
//!
//! let state = ServerState::new(handle, storage, plugin, Some(noaa));
//! let app = create_router(Arc::new(state));
//!
//! let listener = TcpListener::bind("0.0.0.0:3000").await?;
//! axum::serve(listener, app).await?;
//! ```

pub mod routes;

// Re-exports
pub use routes::create_router;

use std::sync::Arc;

use tokio::sync::Mutex;

use signalk_core::ConfigStorage;
use signalk_plugins::CalculationPlugin;
use signalk_providers::NoaaTides;
use signalk_server::ServerHandle;

/// Shared server state for all route handlers.
pub struct ServerState {
    pub server: ServerHandle,
    pub storage: Arc<dyn ConfigStorage>,
    /// The tides plugin; locked while it is restarted.
    pub plugin: Mutex<CalculationPlugin>,
    /// NOAA provider backing the closest-tides resource.
    pub noaa: Option<Arc<NoaaTides>>,
}

impl ServerState {
    pub fn new(
        server: ServerHandle,
        storage: Arc<dyn ConfigStorage>,
        plugin: CalculationPlugin,
        noaa: Option<Arc<NoaaTides>>,
    ) -> Self {
        Self {
            server,
            storage,
            plugin: Mutex::new(plugin),
            noaa,
        }
    }
}

/// Type alias for shared state in Axum handlers.
pub type AppState = Arc<ServerState>;

//! HTTP route handlers.
//!
//! Paths follow the Node.js Signal K server so existing clients work
//! unchanged.

pub mod api;
pub mod plugins;
pub mod tides;

use crate::AppState;
use axum::{extract::State, response::Json, routing::get, Router};

/// Create the main Axum router with all routes.
///
/// Routes are organized as:
/// - `/signalk/v1/` - Signal K API (data model, resources)
/// - `/skServer/` - Server management
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Discovery endpoint
        .route("/signalk", get(discovery_handler))
        // SignalK v1 API routes
        .nest("/signalk/v1", signalk_v1_routes())
        // Server management routes
        .nest("/skServer", sk_server_routes())
        .with_state(state)
}

/// Create SignalK v1 API routes.
fn signalk_v1_routes() -> Router<AppState> {
    Router::new()
        // Resources provided by plugins
        .merge(tides::routes())
        // Data model
        .merge(api::routes())
}

/// Create /skServer management routes.
fn sk_server_routes() -> Router<AppState> {
    Router::new()
        // Plugin management
        .merge(plugins::server_routes())
}

/// Handler for `/signalk` discovery endpoint.
///
/// Returns the Signal K discovery document with available endpoints.
async fn discovery_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    let config = state.server.config();
    Json(serde_json::json!({
        "endpoints": {
            "v1": {
                "version": config.version,
                "signalk-http": "/signalk/v1/api"
            }
        },
        "server": {
            "id": config.name,
            "version": env!("CARGO_PKG_VERSION")
        }
    }))
}

//! Plugin management routes.
//!
//! The subset of the admin UI's plugin API needed to configure the tides
//! plugin.
//!
//! # Endpoints
//!
//! ### `GET /skServer/plugins`
//! List installed plugins with their saved configuration.
//!
//! **Response:**
//! ```json
//! [
//!   {
//!     "id": "tides-api",
//!     "name": "Tide APIs",
//!     "version": "0.1.0",
//!     "description": "Next high and low water from online tide services",
//!     "enabled": true,
//!     "statusMessage": "Started 1 calculation(s)",
//!     "data": { "tides": { "noaa": true } }
//!   }
//! ]
//! ```
//!
//! ### `GET /skServer/plugins/:id/schema`
//! JSON schema and UI schema of the plugin options.
//!
//! ### `POST /skServer/plugins/:id/config`
//! Save plugin configuration and restart the plugin.
//!
//! **Request:**
//! ```json
//! { "enabled": true, "configuration": { "default_ttl": 0, "tides": { "noaa": true } } }
//! ```

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{error, info};

use signalk_core::{ConfigError, PluginConfig};

use crate::AppState;

/// Plugin information.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Plugin {
    pub id: String,

    pub name: String,

    pub version: String,

    pub description: String,

    pub enabled: bool,

    /// Last status or error reported by the plugin.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,

    /// Saved plugin options.
    pub data: Value,
}

pub fn server_routes() -> Router<AppState> {
    Router::new()
        .route("/plugins", get(list_plugins))
        .route("/plugins/:id/schema", get(plugin_schema))
        .route("/plugins/:id/config", post(save_plugin_config))
}

/// GET /skServer/plugins
async fn list_plugins(State(state): State<AppState>) -> Result<Json<Vec<Plugin>>, StatusCode> {
    let plugin = state.plugin.lock().await;
    let info = plugin.info();

    let config = match state.storage.load_plugin_config(&info.id) {
        Ok(config) => config,
        Err(ConfigError::NotFound(_)) => PluginConfig::default(),
        Err(e) => {
            error!("Failed to load config for {}: {}", info.id, e);
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    Ok(Json(vec![Plugin {
        id: info.id.clone(),
        name: info.name.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        description: info.description.clone(),
        enabled: config.enabled,
        status_message: state.server.provider_status(&info.id).map(|s| s.message),
        data: config.configuration,
    }]))
}

/// GET /skServer/plugins/:id/schema
async fn plugin_schema(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    let plugin = state.plugin.lock().await;
    if plugin.info().id != id {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(Json(json!({
        "schema": plugin.schema(),
        "uiSchema": plugin.ui_schema(),
    })))
}

/// POST /skServer/plugins/:id/config
async fn save_plugin_config(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(config): Json<PluginConfig>,
) -> Response {
    let mut plugin = state.plugin.lock().await;
    if plugin.info().id != id {
        return (StatusCode::NOT_FOUND, format!("No such plugin: {id}")).into_response();
    }

    if let Err(e) = state.storage.save_plugin_config(&id, &config) {
        error!("Failed to save config for {}: {}", id, e);
        return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
    }

    if config.enabled {
        let started = plugin.start(config.configuration);
        info!("Restarted {} with {} calculation(s)", id, started);
    } else {
        plugin.stop();
        info!("Stopped {}", id);
    }

    (StatusCode::OK, format!("Saved configuration for plugin {id}")).into_response()
}

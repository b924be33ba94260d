//! Data model REST API.
//!
//! - `GET /signalk/v1/api` returns the full model
//! - `GET /signalk/v1/api/vessels/self/navigation/position` returns one node

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use serde_json::Value;

use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api", get(full_api_handler))
        .route("/api/*path", get(path_handler))
}

/// Full API handler - returns entire data model
async fn full_api_handler(State(state): State<AppState>) -> Json<Value> {
    Json(state.server.full_model())
}

/// Path-based API handler
async fn path_handler(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    let path = path.trim_matches('/').replace('/', ".");
    state
        .server
        .path_value(&path)
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

//! Tide resources.
//!
//! ### `GET /signalk/v1/api/resources/tides/closest`
//! Yesterday's and today's high and low water at the NOAA station nearest
//! to the vessel.
//!
//! **Response:**
//! ```json
//! {
//!   "name": "Boston",
//!   "id": "8443970",
//!   "position": { "latitude": 42.3539, "longitude": -71.0503 },
//!   "date": {
//!     "20240310": {
//!       "height": { "values": [ { "value": 3.051, "time": "2024-03-10T01:12:00.000Z" } ] }
//!     }
//!   }
//! }
//! ```
//!
//! `401 no position` when the vessel has no position, `404` with the
//! provider's message when the lookup fails.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use tracing::{debug, error};

use signalk_core::Position;
use signalk_plugins::CalcError;
use signalk_providers::PLUGIN_ID;

use crate::AppState;

const POSITION_PATH: &str = "navigation.position";

pub fn routes() -> Router<AppState> {
    Router::new().route("/api/resources/tides/closest", get(closest_tides))
}

/// GET /signalk/v1/api/resources/tides/closest
async fn closest_tides(State(state): State<AppState>) -> Response {
    let Some(position) = state
        .server
        .self_value(POSITION_PATH)
        .as_ref()
        .and_then(Position::from_value)
    else {
        debug!("closest tides: {}", CalcError::NoPosition);
        return (StatusCode::UNAUTHORIZED, "no position").into_response();
    };

    let Some(noaa) = &state.noaa else {
        return (StatusCode::NOT_FOUND, "no tide provider").into_response();
    };

    match noaa.closest_tides(position).await {
        Ok(tides) => Json(tides).into_response(),
        Err(CalcError::Provider(message)) => (StatusCode::NOT_FOUND, message).into_response(),
        Err(e) => {
            error!("error: {}", e);
            state.server.set_provider_error(PLUGIN_ID, &e.to_string());
            (StatusCode::NOT_FOUND, "error").into_response()
        }
    }
}

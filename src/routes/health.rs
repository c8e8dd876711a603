//! Liveness probe

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};

use crate::server::{json_response, AppState};
use crate::types::api::HealthResponse;

/// `GET /health` - 200 whenever the process is serving
pub fn health_check(state: &AppState) -> Response<Full<Bytes>> {
    let body = HealthResponse {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
        rooms: state.rooms.room_count(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    };
    json_response(StatusCode::OK, &body)
}

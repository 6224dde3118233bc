use axum::Json;
use axum::extract::State;
use chrono::{DateTime, Utc};
use serde::Serialize;

use matterlink_core::ConnectionState;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub connection: ConnectionState,
    pub devices: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_refresh: Option<DateTime<Utc>>,
}

/// Liveness plus a coarse view of the bridge session. Always 200; the
/// `connection` field tells the real story.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        connection: state.controller.connection_state(),
        devices: state.controller.device_count(),
        last_refresh: state.controller.last_refresh(),
    })
}

//! Device routes: listing, commands, renaming, removal.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::Deserialize;
use serde_json::{Value, json};

use matterlink_core::Device;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CommandRequest {
    pub command: String,
    /// Command parameters; omitted means none.
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Deserialize)]
pub struct RenameRequest {
    pub name: String,
}

/// `GET /api/devices` -- the full registry, in first-seen order.
pub async fn list(State(state): State<AppState>) -> Json<Vec<Arc<Device>>> {
    Json(state.controller.list_devices())
}

/// `GET /api/devices/:node_id`
pub async fn get_one(
    State(state): State<AppState>,
    Path(node_id): Path<u64>,
) -> Result<Json<Arc<Device>>, ApiError> {
    Ok(Json(state.controller.get_device(node_id)?))
}

/// `POST /api/devices/:node_id/command`
pub async fn command(
    State(state): State<AppState>,
    Path(node_id): Path<u64>,
    Json(request): Json<CommandRequest>,
) -> Result<Json<Value>, ApiError> {
    let result = state
        .controller
        .send_command(node_id, &request.command, &request.params)
        .await?;

    state.mirror_registry().await;
    Ok(Json(json!({ "status": "ok", "result": result })))
}

/// `PATCH /api/devices/:node_id` -- assign a local display name.
pub async fn rename(
    State(state): State<AppState>,
    Path(node_id): Path<u64>,
    Json(request): Json<RenameRequest>,
) -> Result<Json<Arc<Device>>, ApiError> {
    if request.name.trim().is_empty() {
        return Err(ApiError::InvalidBody("'name' must not be empty".into()));
    }

    let device = state.controller.rename_device(node_id, request.name.trim())?;
    if let Err(e) = state.mirror.rename(node_id, &device.name).await {
        tracing::warn!(error = %e, node_id, "mirror rename failed");
    }
    Ok(Json(device))
}

/// `DELETE /api/devices/:node_id` -- decommission and forget.
pub async fn remove(
    State(state): State<AppState>,
    Path(node_id): Path<u64>,
) -> Result<StatusCode, ApiError> {
    state.controller.remove_device(node_id).await?;

    if let Err(e) = state.mirror.delete(node_id).await {
        tracing::warn!(error = %e, node_id, "mirror delete failed");
    }
    state.mirror_registry().await;
    Ok(StatusCode::NO_CONTENT)
}

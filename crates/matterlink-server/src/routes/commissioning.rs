//! Commissioning routes.
//!
//! Pairing runs as a background job; the start route returns `202` with
//! a job identifier immediately and the job routes expose progress.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::Deserialize;
use serde_json::{Value, json};
use uuid::Uuid;

use matterlink_core::CommissioningJob;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct StartRequest {
    /// Matter setup code, e.g. `MT:Y.K9042C00KA0648G00` or the numeric
    /// pairing code from the device label.
    pub setup_code: String,
}

/// `POST /api/commissioning/start`
pub async fn start(
    State(state): State<AppState>,
    Json(request): Json<StartRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let code = request.setup_code.trim();
    if code.is_empty() {
        return Err(ApiError::InvalidBody("'setup_code' must not be empty".into()));
    }

    let job_id = state.controller.start_commissioning(code.to_owned()).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "job_id": job_id, "state": "queued" })),
    ))
}

/// `GET /api/commissioning/jobs`
pub async fn jobs(State(state): State<AppState>) -> Json<Vec<CommissioningJob>> {
    Json(state.controller.commissioning_jobs())
}

/// `GET /api/commissioning/jobs/:job_id`
pub async fn job(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<CommissioningJob>, ApiError> {
    Ok(Json(state.controller.commissioning_job(job_id)?))
}

//! Route table.

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub mod commissioning;
pub mod devices;
pub mod health;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/api/devices", get(devices::list))
        .route(
            "/api/devices/:node_id",
            get(devices::get_one)
                .patch(devices::rename)
                .delete(devices::remove),
        )
        .route("/api/devices/:node_id/command", post(devices::command))
        .route("/api/commissioning/start", post(commissioning::start))
        .route("/api/commissioning/jobs", get(commissioning::jobs))
        .route("/api/commissioning/jobs/:job_id", get(commissioning::job))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

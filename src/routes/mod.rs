use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::app_state::AppState;
use crate::models::api::ErrorResponse;

pub mod health;
pub mod jobs;
pub mod metrics;
pub mod worker;

/// Error half of handler results: status plus `{"error": ...}` body.
pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

/// Application routes. Metrics and HTTP layers are added by the server binary.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/api/v1/assets/{asset_id}/analyze", post(jobs::submit_analysis))
        .route("/api/v1/jobs/{job_id}", get(jobs::get_job_status))
        .route("/api/v1/worker/run", post(worker::run_worker))
        .with_state(state)
}

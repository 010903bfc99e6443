use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use crate::app_state::AppState;
use crate::models::api::WorkerRunResponse;
use crate::routes::{api_error, ApiError};
use crate::services::worker::{self, RunOutcome};

/// POST /api/v1/worker/run: process at most one queued job.
///
/// Analysis failures are a normal outcome and still return 200; only a
/// failed claim or terminal write is a 500.
pub async fn run_worker(State(state): State<AppState>) -> Result<Json<WorkerRunResponse>, ApiError> {
    let outcome = worker::run_once(&state).await.map_err(|e| {
        tracing::error!(error = %e, "Worker invocation failed");
        api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;

    Ok(Json(run_response(outcome)))
}

fn run_response(outcome: RunOutcome) -> WorkerRunResponse {
    let empty = WorkerRunResponse {
        message: String::new(),
        job_id: None,
        status: None,
        overall_status: None,
        compliance_score: None,
        error: None,
    };

    match outcome {
        RunOutcome::Idle => WorkerRunResponse {
            message: "No jobs available".to_string(),
            ..empty
        },
        RunOutcome::Completed {
            job_id,
            overall_status,
            compliance_score,
        } => WorkerRunResponse {
            message: "Job completed".to_string(),
            job_id: Some(job_id),
            status: Some("completed".to_string()),
            overall_status: Some(overall_status.to_string()),
            compliance_score: Some(compliance_score),
            ..empty
        },
        RunOutcome::Failed { job_id, error } => WorkerRunResponse {
            message: "Job failed".to_string(),
            job_id: Some(job_id),
            status: Some("failed".to_string()),
            error: Some(error),
            ..empty
        },
        RunOutcome::Superseded { job_id } => WorkerRunResponse {
            message: "Job was already failed by stale recovery; result discarded".to_string(),
            job_id: Some(job_id),
            status: Some("failed".to_string()),
            ..empty
        },
    }
}

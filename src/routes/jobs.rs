use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::db::{asset_queries, queries, queries::SubmitOutcome};
use crate::models::api::{JobStatusResponse, SubmitResponse};
use crate::models::job::JobStatus;
use crate::routes::{api_error, ApiError};

/// POST /api/v1/assets/{asset_id}/analyze: queue an asset for analysis.
pub async fn submit_analysis(
    State(state): State<AppState>,
    Path(asset_id): Path<Uuid>,
) -> Result<(StatusCode, Json<SubmitResponse>), ApiError> {
    let outcome = queries::submit_asset(&state.db, asset_id).await.map_err(|e| {
        tracing::error!(asset_id = %asset_id, error = %e, "Failed to queue analysis job");
        api_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to queue analysis job")
    })?;

    match outcome {
        SubmitOutcome::Queued(job) => {
            tracing::info!(job_id = %job.id, asset_id = %asset_id, "Analysis job queued");
            Ok((
                StatusCode::ACCEPTED,
                Json(SubmitResponse {
                    job_id: job.id,
                    asset_id,
                    status: job.status.to_string(),
                    message: "Asset queued for compliance analysis".to_string(),
                }),
            ))
        }
        SubmitOutcome::AlreadyQueued(job) => Ok((
            StatusCode::OK,
            Json(SubmitResponse {
                job_id: job.id,
                asset_id,
                status: job.status.to_string(),
                message: "Asset is already queued for analysis".to_string(),
            }),
        )),
        SubmitOutcome::AssetNotFound => Err(api_error(
            StatusCode::NOT_FOUND,
            format!("Asset {asset_id} not found"),
        )),
        SubmitOutcome::AssetBusy => Err(api_error(
            StatusCode::CONFLICT,
            format!("Asset {asset_id} is currently being analyzed"),
        )),
    }
}

/// GET /api/v1/jobs/{job_id}: job status, with the report once completed.
pub async fn get_job_status(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<JobStatusResponse>, ApiError> {
    let internal = |e: sqlx::Error| {
        tracing::error!(job_id = %job_id, error = %e, "Failed to load job");
        api_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to load job")
    };

    let job = queries::get_job(&state.db, job_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("Job {job_id} not found")))?;

    let report = if job.status == JobStatus::Completed {
        asset_queries::get_asset(&state.db, job.asset_id)
            .await
            .map_err(internal)?
            .and_then(|asset| asset.report)
    } else {
        None
    };

    Ok(Json(JobStatusResponse {
        job_id: job.id,
        asset_id: job.asset_id,
        status: job.status.to_string(),
        error: job.error,
        report,
    }))
}

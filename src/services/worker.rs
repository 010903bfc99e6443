//! One worker invocation: recover stale work, claim at most one job, run it,
//! and write its terminal state.

use std::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::db::{
    asset_queries,
    queries::{self, CompletedAnalysis, TerminalWrite},
};
use crate::models::asset::MediaSource;
use crate::models::compliance::CheckStatus;
use crate::models::job::AnalysisJob;
use crate::services::pipeline::{AnalysisOutcome, PipelineError};

/// What a single invocation did.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Idle,
    Completed {
        job_id: Uuid,
        overall_status: CheckStatus,
        compliance_score: i32,
    },
    Failed {
        job_id: Uuid,
        error: String,
    },
    /// The run finished after stale recovery had already failed the job.
    Superseded {
        job_id: Uuid,
    },
}

/// Failures of the queue bookkeeping itself. Analysis failures are recorded
/// on the job and reported as `RunOutcome::Failed` instead.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Failed to serialize analysis results: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub async fn run_once(state: &AppState) -> Result<RunOutcome, WorkerError> {
    let recovered = queries::recover_stale_jobs(&state.db, state.stale_job_timeout).await?;
    for job in &recovered {
        tracing::warn!(
            job_id = %job.id,
            asset_id = %job.asset_id,
            started_at = ?job.started_at,
            "Recovered stale processing job"
        );
    }
    if !recovered.is_empty() {
        metrics::counter!("analysis_jobs_recovered_total").increment(recovered.len() as u64);
    }

    let Some(job) = queries::claim_next_job(&state.db).await? else {
        tracing::trace!("No jobs available");
        return Ok(RunOutcome::Idle);
    };
    metrics::counter!("analysis_jobs_claimed_total").increment(1);

    let span = tracing::info_span!("analysis_job", job_id = %job.id, asset_id = %job.asset_id);
    process_job(state, job).instrument(span).await
}

async fn process_job(state: &AppState, job: AnalysisJob) -> Result<RunOutcome, WorkerError> {
    tracing::info!("Processing analysis job");
    let start = Instant::now();

    let result = match tokio::time::timeout(state.job_timeout, analyze_asset(state, job.asset_id)).await {
        Ok(result) => result,
        Err(_) => Err(PipelineError::TimedOut(state.job_timeout)),
    };
    metrics::histogram!("analysis_job_duration_seconds").record(start.elapsed().as_secs_f64());

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(e) => {
            let error = e.to_string();
            tracing::error!(
                failure = e.class().as_str(),
                error = %error,
                duration_ms = start.elapsed().as_millis() as u64,
                "Job failed"
            );
            return record_failure(state, &job, error).await;
        }
    };

    record_completion(state, &job, &outcome, start).await
}

/// Write a finished analysis. If the write itself fails the job is failed
/// with the persistence error, so the processing slot is not held until
/// stale recovery.
pub async fn record_completion(
    state: &AppState,
    job: &AnalysisJob,
    outcome: &AnalysisOutcome,
    start: Instant,
) -> Result<RunOutcome, WorkerError> {
    let overall_status = outcome.report.overall_status;
    let compliance_score = outcome.report.compliance_score;

    let written = match persist_results(state, job, outcome).await {
        Ok(written) => written,
        Err(e) => {
            tracing::error!(error = %e, "Failed to persist analysis results");
            record_failure(state, job, format!("Failed to persist results: {e}")).await?;
            return Err(e);
        }
    };
    if written == TerminalWrite::AlreadyFinalized {
        return Ok(superseded(job));
    }

    metrics::counter!("analysis_jobs_completed_total", "overall_status" => overall_status.to_string())
        .increment(1);
    tracing::info!(
        overall_status = %overall_status,
        compliance_score,
        duration_ms = start.elapsed().as_millis() as u64,
        "Job completed"
    );

    Ok(RunOutcome::Completed {
        job_id: job.id,
        overall_status,
        compliance_score,
    })
}

async fn persist_results(
    state: &AppState,
    job: &AnalysisJob,
    outcome: &AnalysisOutcome,
) -> Result<TerminalWrite, WorkerError> {
    let report = serde_json::to_value(&outcome.report)?;
    let written = queries::complete_job(
        &state.db,
        job,
        &CompletedAnalysis {
            creative_type: outcome.creative_type.as_ref().map(|t| t.as_ref()),
            compliance_score: outcome.report.compliance_score,
            overall_status: outcome.report.overall_status.as_ref(),
            analysis_results: &outcome.raw_results,
            report: &report,
        },
    )
    .await?;
    Ok(written)
}

async fn record_failure(state: &AppState, job: &AnalysisJob, error: String) -> Result<RunOutcome, WorkerError> {
    match queries::fail_job(&state.db, job, &error).await? {
        TerminalWrite::Written => {
            metrics::counter!("analysis_jobs_failed_total").increment(1);
            Ok(RunOutcome::Failed { job_id: job.id, error })
        }
        TerminalWrite::AlreadyFinalized => Ok(superseded(job)),
    }
}

fn superseded(job: &AnalysisJob) -> RunOutcome {
    tracing::warn!("Job was already finalized by stale recovery; discarding this run's result");
    metrics::counter!("analysis_jobs_superseded_total").increment(1);
    RunOutcome::Superseded { job_id: job.id }
}

async fn analyze_asset(state: &AppState, asset_id: Uuid) -> Result<AnalysisOutcome, PipelineError> {
    let asset = asset_queries::get_asset(&state.db, asset_id)
        .await?
        .ok_or(PipelineError::AssetNotFound(asset_id))?;

    let campaign_id = asset.campaign_id.ok_or_else(|| PipelineError::MissingLinkage {
        asset_id,
        detail: "asset is not attached to a campaign".to_string(),
    })?;
    let guidelines = asset_queries::get_brand_guidelines_for_campaign(&state.db, campaign_id)
        .await?
        .ok_or_else(|| PipelineError::MissingLinkage {
            asset_id,
            detail: format!("campaign {campaign_id} has no brand"),
        })?;

    let url = state.storage.playable_url(&asset.storage_path).await?;
    let size_bytes = match asset.file_size.and_then(|s| u64::try_from(s).ok()) {
        Some(size) => Some(size),
        None => state.storage.object_size(&asset.storage_path).await?,
    };

    tracing::debug!(
        brand = %guidelines.name,
        mime_type = %asset.mime_type,
        size_bytes = ?size_bytes,
        "Asset resolved"
    );

    let media = MediaSource {
        url,
        mime_type: asset.mime_type,
        size_bytes,
    };
    state.pipeline.run(&media, &guidelines).await
}

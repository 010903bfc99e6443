use sqlx::PgPool;
use std::time::Duration;
use uuid::Uuid;

use crate::models::asset::AssetStatus;
use crate::models::job::AnalysisJob;

/// Postgres SQLSTATE for unique_violation.
const UNIQUE_VIOLATION: &str = "23505";

/// Result of asking to (re)analyze an asset.
#[derive(Debug)]
pub enum SubmitOutcome {
    Queued(AnalysisJob),
    /// A queued job for this asset already exists; it is returned as-is.
    AlreadyQueued(AnalysisJob),
    AssetNotFound,
    AssetBusy,
}

/// Whether a terminal write took effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalWrite {
    Written,
    /// The job had already left `processing` (stale recovery got there
    /// first). Nothing was written.
    AlreadyFinalized,
}

/// Values written to the asset when a job completes.
#[derive(Debug)]
pub struct CompletedAnalysis<'a> {
    pub creative_type: Option<&'a str>,
    pub compliance_score: i32,
    pub overall_status: &'a str,
    pub analysis_results: &'a serde_json::Value,
    pub report: &'a serde_json::Value,
}

/// Queue a job for an asset and move the asset back to pending.
pub async fn submit_asset(pool: &PgPool, asset_id: Uuid) -> Result<SubmitOutcome, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let status: Option<String> =
        sqlx::query_scalar("SELECT status FROM creative_assets WHERE id = $1 FOR UPDATE")
            .bind(asset_id)
            .fetch_optional(&mut *tx)
            .await?;

    let Some(status) = status else {
        return Ok(SubmitOutcome::AssetNotFound);
    };
    if status == AssetStatus::Processing.as_ref() {
        return Ok(SubmitOutcome::AssetBusy);
    }

    let existing = sqlx::query_as::<_, AnalysisJob>(
        r#"
        SELECT id, asset_id, status, error, created_at, started_at, completed_at
        FROM analysis_jobs
        WHERE asset_id = $1 AND status = 'queued'
        ORDER BY created_at ASC
        LIMIT 1
        "#,
    )
    .bind(asset_id)
    .fetch_optional(&mut *tx)
    .await?;

    if let Some(job) = existing {
        tx.commit().await?;
        return Ok(SubmitOutcome::AlreadyQueued(job));
    }

    let job = sqlx::query_as::<_, AnalysisJob>(
        r#"
        INSERT INTO analysis_jobs (asset_id, status)
        VALUES ($1, 'queued')
        RETURNING id, asset_id, status, error, created_at, started_at, completed_at
        "#,
    )
    .bind(asset_id)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query("UPDATE creative_assets SET status = 'pending', updated_at = NOW() WHERE id = $1")
        .bind(asset_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(SubmitOutcome::Queued(job))
}

/// Get a job by ID
pub async fn get_job(pool: &PgPool, job_id: Uuid) -> Result<Option<AnalysisJob>, sqlx::Error> {
    sqlx::query_as::<_, AnalysisJob>(
        r#"
        SELECT id, asset_id, status, error, created_at, started_at, completed_at
        FROM analysis_jobs
        WHERE id = $1
        "#,
    )
    .bind(job_id)
    .fetch_optional(pool)
    .await
}

/// Atomically claim the oldest queued job, or nothing if the queue is
/// empty or another job is already processing.
pub async fn claim_next_job(pool: &PgPool) -> Result<Option<AnalysisJob>, sqlx::Error> {
    let claimed = sqlx::query_as::<_, AnalysisJob>(
        r#"
        SELECT id, asset_id, status, error, created_at, started_at, completed_at
        FROM claim_next_analysis_job()
        "#,
    )
    .fetch_optional(pool)
    .await;

    match claimed {
        Ok(job) => Ok(job),
        Err(sqlx::Error::Database(e)) if e.code().as_deref() == Some(UNIQUE_VIOLATION) => {
            tracing::debug!("Processing slot taken by a concurrent claim");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Mark a job and its asset completed, with results, in one transaction.
/// Only a job still in `processing` is written.
pub async fn complete_job(
    pool: &PgPool,
    job: &AnalysisJob,
    analysis: &CompletedAnalysis<'_>,
) -> Result<TerminalWrite, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let updated = sqlx::query(
        r#"
        UPDATE analysis_jobs
        SET status = 'completed', error = NULL, completed_at = NOW()
        WHERE id = $1 AND status = 'processing'
        "#,
    )
    .bind(job.id)
    .execute(&mut *tx)
    .await?;

    if updated.rows_affected() == 0 {
        tx.rollback().await?;
        return Ok(TerminalWrite::AlreadyFinalized);
    }

    sqlx::query(
        r#"
        UPDATE creative_assets
        SET status = 'completed',
            creative_type = $2,
            compliance_score = $3,
            overall_status = $4,
            analysis_results = $5,
            report = $6,
            updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(job.asset_id)
    .bind(analysis.creative_type)
    .bind(analysis.compliance_score)
    .bind(analysis.overall_status)
    .bind(analysis.analysis_results)
    .bind(analysis.report)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(TerminalWrite::Written)
}

/// Mark a job and its asset failed in one transaction. The asset keeps
/// an error payload in place of results. Only a job still in `processing`
/// is written.
pub async fn fail_job(pool: &PgPool, job: &AnalysisJob, error: &str) -> Result<TerminalWrite, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let updated = sqlx::query(
        r#"
        UPDATE analysis_jobs
        SET status = 'failed', error = $2, completed_at = NOW()
        WHERE id = $1 AND status = 'processing'
        "#,
    )
    .bind(job.id)
    .bind(error)
    .execute(&mut *tx)
    .await?;

    if updated.rows_affected() == 0 {
        tx.rollback().await?;
        return Ok(TerminalWrite::AlreadyFinalized);
    }

    sqlx::query(
        r#"
        UPDATE creative_assets
        SET status = 'failed',
            analysis_results = jsonb_build_object('error', $2::text),
            report = NULL,
            updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(job.asset_id)
    .bind(error)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(TerminalWrite::Written)
}

/// Fail every job that has been processing longer than `timeout`, freeing
/// the processing slot. Returns the recovered jobs.
pub async fn recover_stale_jobs(pool: &PgPool, timeout: Duration) -> Result<Vec<AnalysisJob>, sqlx::Error> {
    let message = format!(
        "Job exceeded the {}-second processing timeout and was marked failed; resubmit to retry",
        timeout.as_secs()
    );

    sqlx::query_as::<_, AnalysisJob>(
        r#"
        WITH stale AS (
            UPDATE analysis_jobs
            SET status = 'failed', error = $2, completed_at = NOW()
            WHERE status = 'processing'
              AND started_at < NOW() - make_interval(secs => $1)
            RETURNING id, asset_id, status, error, created_at, started_at, completed_at
        ), failed_assets AS (
            UPDATE creative_assets a
            SET status = 'failed',
                analysis_results = jsonb_build_object('error', $2::text),
                updated_at = NOW()
            FROM stale
            WHERE a.id = stale.asset_id
            RETURNING a.id
        )
        SELECT id, asset_id, status, error, created_at, started_at, completed_at
        FROM stale
        "#,
    )
    .bind(timeout.as_secs_f64())
    .bind(&message)
    .fetch_all(pool)
    .await
}

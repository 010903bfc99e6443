use axum::extract::State;
use axum::response::IntoResponse;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

/// Prometheus metrics scrape endpoint.
pub async fn prometheus_metrics(State(handle): State<Arc<PrometheusHandle>>) -> impl IntoResponse {
    handle.render()
}

/// Register descriptions for the pipeline's metrics.
pub fn describe() {
    metrics::describe_counter!("analysis_jobs_claimed_total", "Analysis jobs claimed from the queue");
    metrics::describe_counter!(
        "analysis_jobs_completed_total",
        "Analysis jobs completed, by overall compliance status"
    );
    metrics::describe_counter!("analysis_jobs_failed_total", "Analysis jobs that failed");
    metrics::describe_counter!(
        "analysis_jobs_recovered_total",
        "Processing jobs failed by the staleness timeout"
    );
    metrics::describe_counter!(
        "analysis_jobs_superseded_total",
        "Jobs whose result was discarded because stale recovery failed them first"
    );
    metrics::describe_counter!(
        "adapter_retries_total",
        "Retries of external service calls, by operation and failure kind"
    );
    metrics::describe_counter!(
        "analysis_stage_degraded_total",
        "Optional stages that failed and were defaulted"
    );
    metrics::describe_histogram!(
        "analysis_job_duration_seconds",
        "Time to run one analysis job"
    );
    metrics::describe_histogram!(
        "transcription_wait_seconds",
        "Time spent polling for a transcript"
    );
}

use asset_compliance::{
    app_state::AppState,
    config::AppConfig,
    db, routes,
    services::worker::{self, RunOutcome},
};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tokio::time::sleep;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    // `--once` handles at most one job and exits, for cron-style triggers.
    let once = std::env::args().skip(1).any(|arg| arg == "--once");

    tracing::info!(once, "Starting analysis worker");

    let config = AppConfig::from_env().expect("Failed to load configuration");

    let metrics_addr: SocketAddr = config
        .worker_metrics_addr
        .parse()
        .expect("WORKER_METRICS_ADDR must be a socket address");
    PrometheusBuilder::new()
        .with_http_listener(metrics_addr)
        .install()
        .expect("Failed to install Prometheus metrics exporter");
    routes::metrics::describe();
    tracing::info!(%metrics_addr, "Serving worker metrics");

    tracing::info!("Connecting to PostgreSQL");
    let db_pool = db::init_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");

    let state = AppState::from_config(db_pool, &config).expect("Failed to initialize services");
    let poll_interval = config.worker_poll_interval();

    if once {
        match worker::run_once(&state).await {
            Ok(outcome) => log_outcome(&outcome),
            Err(e) => {
                tracing::error!(error = %e, "Worker invocation failed");
                std::process::exit(1);
            }
        }
        return;
    }

    tracing::info!("Worker ready, starting job processing loop");

    loop {
        match worker::run_once(&state).await {
            Ok(RunOutcome::Idle) => {
                tracing::trace!("No jobs available, sleeping");
                sleep(poll_interval).await;
            }
            Ok(outcome) => {
                // A job ran; look for the next one immediately.
                log_outcome(&outcome);
            }
            Err(e) => {
                tracing::error!(error = %e, "Error processing job, will retry");
                sleep(poll_interval).await;
            }
        }
    }
}

fn log_outcome(outcome: &RunOutcome) {
    match outcome {
        RunOutcome::Idle => tracing::info!("No jobs available"),
        RunOutcome::Completed {
            job_id,
            overall_status,
            compliance_score,
        } => tracing::debug!(
            job_id = %job_id,
            overall_status = %overall_status,
            compliance_score,
            "Job processed"
        ),
        RunOutcome::Failed { job_id, error } => {
            tracing::debug!(job_id = %job_id, error = %error, "Job processed with failure")
        }
        RunOutcome::Superseded { job_id } => {
            tracing::debug!(job_id = %job_id, "Job result discarded after stale recovery")
        }
    }
}

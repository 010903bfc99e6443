use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{AppConfig, ConfigError};
use crate::services::{
    pipeline::Pipeline,
    storage::{R2Client, StorageError},
    transcription::{TranscriptionClient, TranscriptionError},
    vision::{VisionClient, VisionError},
    vocabulary::{VocabularyClient, VocabularyError},
};

/// Shared application state passed to all route handlers and the worker.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub storage: Arc<R2Client>,
    pub pipeline: Arc<Pipeline>,
    pub stale_job_timeout: Duration,
    /// Analysis that runs longer is abandoned and the job failed.
    pub job_timeout: Duration,
}

impl AppState {
    pub fn new(
        db: PgPool,
        storage: R2Client,
        pipeline: Pipeline,
        stale_job_timeout: Duration,
        job_timeout: Duration,
    ) -> Self {
        Self {
            db,
            storage: Arc::new(storage),
            pipeline: Arc::new(pipeline),
            stale_job_timeout,
            job_timeout,
        }
    }

    /// Build storage and the analysis clients from configuration.
    pub fn from_config(db: PgPool, config: &AppConfig) -> Result<Self, InitError> {
        config.check_timeouts()?;

        tracing::info!("Initializing R2 storage client");
        let storage = R2Client::new(
            &config.r2_bucket,
            &config.r2_endpoint,
            &config.r2_access_key,
            &config.r2_secret_key,
            config.presigned_url_ttl_secs,
        )?;

        let retry = config.retry_policy();

        tracing::info!(model = %config.vision_model, "Initializing vision client");
        let vision = VisionClient::new(
            &config.vision_api_base,
            &config.vision_model,
            &config.vision_api_key,
            config.inline_media_limit_bytes,
            retry,
        )?;

        tracing::info!("Initializing transcription client");
        let transcription = TranscriptionClient::new(
            &config.transcription_api_base,
            &config.transcription_api_key,
            Duration::from_secs(config.transcription_poll_interval_secs),
            Duration::from_secs(config.transcription_timeout_secs),
            retry,
        )?;

        tracing::info!(model = %config.vocabulary_model, "Initializing vocabulary client");
        let vocabulary = VocabularyClient::new(
            &config.vocabulary_api_base,
            &config.vocabulary_model,
            &config.vocabulary_api_key,
            retry,
        )?;

        Ok(Self::new(
            db,
            storage,
            Pipeline::new(vision, transcription, vocabulary),
            config.stale_job_timeout(),
            config.job_timeout(),
        ))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("Configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage client: {0}")]
    Storage(#[from] StorageError),

    #[error("Vision client: {0}")]
    Vision(#[from] VisionError),

    #[error("Transcription client: {0}")]
    Transcription(#[from] TranscriptionError),

    #[error("Vocabulary client: {0}")]
    Vocabulary(#[from] VocabularyError),
}

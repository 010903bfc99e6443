use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::models::analysis::{Transcript, TranscriptWord};
use crate::services::retry::{with_retry, RetryError, RetryPolicy};
use crate::services::upstream::{check_response, UpstreamError};

/// Error fragments the service uses when a file has no speech to transcribe.
const NO_AUDIO_MARKERS: &[&str] = &[
    "no spoken audio",
    "does not appear to contain audio",
    "no audio",
    "audio duration is too short",
];

/// Client for the speech-to-text service (AssemblyAI-style submit/poll API).
pub struct TranscriptionClient {
    http: Client,
    api_base: String,
    api_key: String,
    poll_interval: Duration,
    timeout: Duration,
    retry: RetryPolicy,
}

#[derive(Serialize)]
struct SubmitRequest<'a> {
    audio_url: &'a str,
}

#[derive(Deserialize)]
struct SubmitResponse {
    id: String,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptState {
    Queued,
    Processing,
    Completed,
    Error,
}

#[derive(Deserialize)]
struct PollResponse {
    status: TranscriptState,
    text: Option<String>,
    words: Option<Vec<TranscriptWord>>,
    error: Option<String>,
}

impl TranscriptionClient {
    pub fn new(
        api_base: &str,
        api_key: &str,
        poll_interval: Duration,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Result<Self, TranscriptionError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| TranscriptionError::Request(RetryError::Permanent(e.into())))?;

        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            poll_interval,
            timeout,
            retry,
        })
    }

    /// Submit the audio and poll until the transcript is ready.
    ///
    /// The whole poll loop runs under a hard wall-clock ceiling. A file with
    /// no speech yields an empty transcript rather than an error.
    pub async fn transcribe(&self, audio_url: &str) -> Result<Transcript, TranscriptionError> {
        let id = with_retry(&self.retry, "transcription submit", || self.submit(audio_url)).await?;
        tracing::debug!(transcript_id = %id, "Transcription submitted");

        let started = Instant::now();
        let outcome = tokio::time::timeout(self.timeout, self.poll_until_done(&id)).await;
        metrics::histogram!("transcription_wait_seconds").record(started.elapsed().as_secs_f64());

        match outcome {
            Ok(result) => result,
            Err(_) => Err(TranscriptionError::TimedOut {
                waited_secs: self.timeout.as_secs(),
            }),
        }
    }

    async fn submit(&self, audio_url: &str) -> Result<String, UpstreamError> {
        let response = self
            .http
            .post(format!("{}/transcript", self.api_base))
            .header("authorization", &self.api_key)
            .json(&SubmitRequest { audio_url })
            .send()
            .await?;
        let response = check_response("transcription service", response).await?;
        let body: SubmitResponse = response.json().await?;
        Ok(body.id)
    }

    async fn poll(&self, id: &str) -> Result<PollResponse, UpstreamError> {
        let response = self
            .http
            .get(format!("{}/transcript/{}", self.api_base, id))
            .header("authorization", &self.api_key)
            .send()
            .await?;
        let response = check_response("transcription service", response).await?;
        Ok(response.json().await?)
    }

    async fn poll_until_done(&self, id: &str) -> Result<Transcript, TranscriptionError> {
        loop {
            let poll = with_retry(&self.retry, "transcription poll", || self.poll(id)).await?;

            match poll.status {
                TranscriptState::Completed => {
                    return Ok(Transcript {
                        text: poll.text.unwrap_or_default(),
                        words: poll.words.unwrap_or_default(),
                    });
                }
                TranscriptState::Error => {
                    let message = poll.error.unwrap_or_else(|| "unknown transcription error".to_string());
                    if indicates_no_audio(&message) {
                        tracing::info!(transcript_id = %id, "No speech in asset, using empty transcript");
                        return Ok(Transcript::default());
                    }
                    return Err(TranscriptionError::Failed(message));
                }
                TranscriptState::Queued | TranscriptState::Processing => {
                    tracing::trace!(transcript_id = %id, status = ?poll.status, "Transcript not ready");
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }
    }
}

fn indicates_no_audio(message: &str) -> bool {
    let lower = message.to_lowercase();
    NO_AUDIO_MARKERS.iter().any(|marker| lower.contains(marker))
}

#[derive(Debug, thiserror::Error)]
pub enum TranscriptionError {
    #[error(transparent)]
    Request(#[from] RetryError<UpstreamError>),

    #[error("Transcription failed: {0}")]
    Failed(String),

    #[error("Transcription did not complete within {waited_secs} seconds")]
    TimedOut { waited_secs: u64 },
}

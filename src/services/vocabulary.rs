use garde::Validate;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::models::analysis::{Transcript, VocabularyFindingKind, VocabularyResult};
use crate::models::brand::BrandGuidelines;
use crate::models::compliance::CheckStatus;
use crate::services::extract::{self, ExtractError};
use crate::services::retry::{with_retry, FailureKind, RetryError, RetryPolicy, Retryable};
use crate::services::upstream::{check_response, UpstreamError};

/// Mispronunciation claims below this confidence are discarded.
/// Banned-word citations are never confidence-filtered.
pub const MISPRONUNCIATION_MIN_CONFIDENCE: f64 = 0.8;

const SYSTEM_PROMPT: &str = concat!(
    "You check marketing transcripts for brand vocabulary and tone compliance. ",
    "Report every occurrence of a banned term, and clear mispronunciations of the brand name ",
    "using the phonetic guide when one is given. Respond with ONLY a JSON object: ",
    "{\"status\": \"pass\"|\"warn\"|\"fail\", \"notes\": string, \"citations\": [{\"kind\": ",
    "\"banned_word\"|\"mispronunciation\", \"term\": string, \"timestamp\": string, ",
    "\"context\": string, \"confidence\": number between 0 and 1}]}."
);

/// Client for the text compliance service (OpenAI-compatible chat completions).
pub struct VocabularyClient {
    http: Client,
    api_base: String,
    model: String,
    api_key: String,
    retry: RetryPolicy,
}

/// Request document sent to the model.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VocabularyRequest<'a> {
    pub transcript_text: &'a str,
    pub brand_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phonetic_guide: Option<&'a str>,
    pub banned_terms: &'a [String],
}

/// Filtered verdict plus the raw JSON kept for audit.
#[derive(Debug, Clone, Serialize)]
pub struct VocabularyReport {
    pub result: VocabularyResult,
    pub discarded_citations: usize,
    pub raw: serde_json::Value,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

impl VocabularyClient {
    pub fn new(api_base: &str, model: &str, api_key: &str, retry: RetryPolicy) -> Result<Self, VocabularyError> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(90))
            .build()
            .map_err(UpstreamError::Http)?;

        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: api_key.to_string(),
            retry,
        })
    }

    /// Check a non-empty transcript against the brand vocabulary.
    pub async fn check(
        &self,
        transcript: &Transcript,
        guidelines: &BrandGuidelines,
    ) -> Result<VocabularyReport, RetryError<VocabularyError>> {
        let request = VocabularyRequest {
            transcript_text: &transcript.text,
            brand_name: &guidelines.name,
            phonetic_guide: guidelines.phonetic_guide.as_deref(),
            banned_terms: &guidelines.banned_terms,
        };
        let body = json!({
            "model": self.model,
            "temperature": 0,
            "response_format": {"type": "json_object"},
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": serde_json::to_string(&request).unwrap_or_default()}
            ]
        });

        with_retry(&self.retry, "vocabulary check", || self.complete(&body)).await
    }

    async fn complete(&self, body: &serde_json::Value) -> Result<VocabularyReport, VocabularyError> {
        let response = self
            .http
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(UpstreamError::Http)?;
        let response = check_response("vocabulary service", response).await?;
        let chat: ChatResponse = response.json().await.map_err(UpstreamError::Http)?;

        let text = chat
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|t| !t.trim().is_empty())
            .ok_or(VocabularyError::EmptyResponse)?;

        let raw = extract::extract_value(&text)?;
        let result: VocabularyResult = extract::from_extracted(raw.clone(), &text)?;
        result.validate()?;

        let (result, discarded_citations) = filter_low_confidence(result);
        if discarded_citations > 0 {
            tracing::debug!(discarded_citations, "Dropped low-confidence mispronunciation citations");
        }

        Ok(VocabularyReport {
            result,
            discarded_citations,
            raw,
        })
    }
}

/// Drop mispronunciation citations under the confidence threshold.
///
/// If that leaves nothing to cite, the verdict becomes pass: the only
/// evidence against the asset was below the bar for reporting.
pub fn filter_low_confidence(result: VocabularyResult) -> (VocabularyResult, usize) {
    let before = result.citations.len();
    let citations: Vec<_> = result
        .citations
        .into_iter()
        .filter(|c| match c.kind {
            VocabularyFindingKind::BannedWord => true,
            VocabularyFindingKind::Mispronunciation => c.confidence >= MISPRONUNCIATION_MIN_CONFIDENCE,
        })
        .collect();
    let discarded = before - citations.len();

    let (status, notes) = if discarded > 0 && citations.is_empty() && result.status != CheckStatus::Pass {
        let notes = if result.notes.is_empty() {
            "Only low-confidence pronunciation findings were reported; they were discarded".to_string()
        } else {
            format!(
                "{} (low-confidence pronunciation findings were discarded)",
                result.notes
            )
        };
        (CheckStatus::Pass, notes)
    } else {
        (result.status, result.notes)
    };

    (
        VocabularyResult {
            status,
            notes,
            citations,
        },
        discarded,
    )
}

#[derive(Debug, thiserror::Error)]
pub enum VocabularyError {
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error("Vocabulary service returned no content")]
    EmptyResponse,

    #[error(transparent)]
    Extraction(#[from] ExtractError),

    #[error("Vocabulary response failed validation: {0}")]
    Invalid(#[from] garde::Report),
}

impl Retryable for VocabularyError {
    fn failure_kind(&self) -> FailureKind {
        match self {
            VocabularyError::Upstream(e) => e.failure_kind(),
            VocabularyError::EmptyResponse => FailureKind::Transient,
            _ => FailureKind::Permanent,
        }
    }
}

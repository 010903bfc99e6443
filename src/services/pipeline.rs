//! One analysis run: adapters in, canonical checks and a rendered report out.

use serde_json::json;
use uuid::Uuid;

use crate::models::analysis::{Transcript, VocabularyResult};
use crate::models::asset::{CreativeType, MediaKind, MediaSource};
use crate::models::brand::BrandGuidelines;
use crate::models::compliance::{ComplianceChecks, ComplianceReport, DefaultReason};
use crate::services::aggregator::{self, StageOutcome};
use crate::services::report;
use crate::services::retry::RetryError;
use crate::services::storage::StorageError;
use crate::services::transcription::TranscriptionClient;
use crate::services::vision::{VisionClient, VisionError, VisionReport};
use crate::services::vocabulary::{VocabularyClient, VocabularyReport};

pub struct Pipeline {
    vision: VisionClient,
    transcription: TranscriptionClient,
    vocabulary: VocabularyClient,
}

/// Everything a finished run produces, ready for the terminal write.
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub checks: ComplianceChecks,
    pub report: ComplianceReport,
    pub creative_type: Option<CreativeType>,
    /// Raw adapter payloads kept on the asset for audit.
    pub raw_results: serde_json::Value,
}

/// How a job failure is reported in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    Analysis,
    DataPrecondition,
}

impl FailureClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureClass::Analysis => "analysis",
            FailureClass::DataPrecondition => "data_precondition",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Asset {0} not found")]
    AssetNotFound(Uuid),

    #[error("Asset {asset_id} has no brand guidelines: {detail}")]
    MissingLinkage { asset_id: Uuid, detail: String },

    #[error("Could not access asset in storage: {0}")]
    Storage(#[from] StorageError),

    #[error("Vision analysis failed: {0}")]
    Vision(#[from] RetryError<VisionError>),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Analysis did not finish within the {}-second job timeout", .0.as_secs())]
    TimedOut(std::time::Duration),
}

impl PipelineError {
    pub fn class(&self) -> FailureClass {
        match self {
            PipelineError::AssetNotFound(_) | PipelineError::MissingLinkage { .. } => {
                FailureClass::DataPrecondition
            }
            _ => FailureClass::Analysis,
        }
    }
}

impl Pipeline {
    pub fn new(vision: VisionClient, transcription: TranscriptionClient, vocabulary: VocabularyClient) -> Self {
        Self {
            vision,
            transcription,
            vocabulary,
        }
    }

    /// Run every applicable stage for one asset.
    ///
    /// Vision failures abort the run. Transcription and vocabulary failures
    /// degrade to a warning on the vocabulary check.
    pub async fn run(
        &self,
        media: &MediaSource,
        guidelines: &BrandGuidelines,
    ) -> Result<AnalysisOutcome, PipelineError> {
        let kind = self.vision.preflight(media).map_err(RetryError::Permanent)?;

        let (vision, transcript) = match kind {
            MediaKind::Image => {
                let vision = self.vision.analyze_checked(media, kind, guidelines).await?;
                (vision, StageOutcome::Skipped(DefaultReason::StillImage))
            }
            MediaKind::Video => {
                let vision = async {
                    self.vision
                        .analyze_checked(media, kind, guidelines)
                        .await
                        .map_err(PipelineError::from)
                };
                let transcript = async { Ok::<_, PipelineError>(self.transcribe(&media.url).await) };
                tokio::try_join!(vision, transcript)?
            }
        };

        let vocabulary = match &transcript {
            StageOutcome::Completed(t) => self.check_vocabulary(t, guidelines).await,
            StageOutcome::Skipped(reason) => StageOutcome::Skipped(reason.clone()),
            StageOutcome::Failed(message) => {
                StageOutcome::Failed(format!("transcript unavailable ({message})"))
            }
        };

        let verdict: StageOutcome<VocabularyResult> = match &vocabulary {
            StageOutcome::Completed(report) => StageOutcome::Completed(report.result.clone()),
            StageOutcome::Skipped(reason) => StageOutcome::Skipped(reason.clone()),
            StageOutcome::Failed(message) => StageOutcome::Failed(message.clone()),
        };

        let aggregation = aggregator::aggregate(guidelines, &vision.analysis, &verdict);
        let report = report::generate(&aggregation.checks);

        tracing::info!(
            overall_status = %report.overall_status,
            compliance_score = report.compliance_score,
            "Analysis complete"
        );

        Ok(AnalysisOutcome {
            raw_results: raw_results(kind, &vision, &transcript, &vocabulary, &aggregation.checks),
            checks: aggregation.checks,
            creative_type: aggregation.creative_type,
            report,
        })
    }

    async fn transcribe(&self, url: &str) -> StageOutcome<Transcript> {
        match self.transcription.transcribe(url).await {
            Ok(transcript) if transcript.is_empty() => StageOutcome::Skipped(DefaultReason::NoAudio),
            Ok(transcript) => StageOutcome::Completed(transcript),
            Err(e) => {
                tracing::warn!(stage = "transcription", error = %e, "Stage degraded");
                metrics::counter!("analysis_stage_degraded_total", "stage" => "transcription").increment(1);
                StageOutcome::Failed(e.to_string())
            }
        }
    }

    async fn check_vocabulary(
        &self,
        transcript: &Transcript,
        guidelines: &BrandGuidelines,
    ) -> StageOutcome<VocabularyReport> {
        match self.vocabulary.check(transcript, guidelines).await {
            Ok(report) => StageOutcome::Completed(report),
            Err(e) => {
                tracing::warn!(stage = "vocabulary", error = %e, "Stage degraded");
                metrics::counter!("analysis_stage_degraded_total", "stage" => "vocabulary").increment(1);
                StageOutcome::Failed(e.to_string())
            }
        }
    }
}

fn raw_results(
    kind: MediaKind,
    vision: &VisionReport,
    transcript: &StageOutcome<Transcript>,
    vocabulary: &StageOutcome<VocabularyReport>,
    checks: &ComplianceChecks,
) -> serde_json::Value {
    let media_kind = match kind {
        MediaKind::Image => "image",
        MediaKind::Video => "video",
    };
    let transcript = match transcript {
        StageOutcome::Completed(t) => json!({
            "status": "completed",
            "text": t.text,
            "word_count": t.words.len(),
        }),
        other => stage_summary(other),
    };
    let vocabulary = match vocabulary {
        StageOutcome::Completed(v) => json!({
            "status": "completed",
            "raw": v.raw,
            "discarded_citations": v.discarded_citations,
        }),
        other => stage_summary(other),
    };

    json!({
        "media_kind": media_kind,
        "vision": vision.raw,
        "transcript": transcript,
        "vocabulary": vocabulary,
        "checks": checks,
    })
}

fn stage_summary<T>(outcome: &StageOutcome<T>) -> serde_json::Value {
    match outcome {
        StageOutcome::Completed(_) => json!({"status": "completed"}),
        StageOutcome::Skipped(reason) => json!({"status": "skipped", "reason": reason.label()}),
        StageOutcome::Failed(message) => json!({"status": "failed", "error": message}),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_classes() {
        let missing = PipelineError::MissingLinkage {
            asset_id: Uuid::nil(),
            detail: "asset has no campaign".to_string(),
        };
        assert_eq!(missing.class(), FailureClass::DataPrecondition);
        assert_eq!(PipelineError::AssetNotFound(Uuid::nil()).class(), FailureClass::DataPrecondition);

        let vision = PipelineError::Vision(RetryError::Permanent(VisionError::Unsupported(
            "video/x-matroska is not supported".to_string(),
        )));
        assert_eq!(vision.class(), FailureClass::Analysis);
        assert_eq!(vision.class().as_str(), "analysis");
    }

    #[test]
    fn test_stage_summary_labels() {
        let skipped: StageOutcome<()> = StageOutcome::Skipped(DefaultReason::StillImage);
        assert_eq!(stage_summary(&skipped), json!({"status": "skipped", "reason": "still_image"}));

        let failed: StageOutcome<()> = StageOutcome::Failed("timed out".to_string());
        assert_eq!(stage_summary(&failed)["error"], "timed out");
    }
}

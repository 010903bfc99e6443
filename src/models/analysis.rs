//! Payloads returned by the external analysis services, after extraction.

use garde::Validate;
use serde::{Deserialize, Serialize};

use crate::models::asset::CreativeType;
use crate::models::compliance::{CheckResult, CheckStatus};

/// Signals the vision service reports alongside the content classification.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct ContentSignals {
    pub marketing_intent: bool,
    pub product_focus: bool,
    pub call_to_action: bool,
    pub camera_stability: Option<String>,
    pub production_quality: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct ContentTypeAnalysis {
    #[garde(skip)]
    pub classification: CreativeType,

    #[garde(range(min = 0.0, max = 1.0))]
    pub confidence: f64,

    #[serde(default)]
    #[garde(skip)]
    pub signals: ContentSignals,

    #[serde(default)]
    #[garde(skip)]
    pub reasoning: Option<String>,
}

/// Per-dimension verdicts from the multimodal vision/video service.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default, PartialEq)]
pub struct VisionAnalysis {
    #[serde(default)]
    #[garde(skip)]
    pub logo_compliance: Option<CheckResult>,

    #[serde(default)]
    #[garde(skip)]
    pub color_compliance: Option<CheckResult>,

    #[serde(default)]
    #[garde(skip)]
    pub tone_compliance: Option<CheckResult>,

    #[serde(default)]
    #[garde(skip)]
    pub disclaimer_compliance: Option<CheckResult>,

    #[serde(default)]
    #[garde(skip)]
    pub layout_compliance: Option<CheckResult>,

    #[serde(default)]
    #[garde(dive)]
    pub content_type_analysis: Option<ContentTypeAnalysis>,
}

/// One word of a transcript with its timing in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TranscriptWord {
    pub text: String,
    #[serde(default)]
    pub start: u64,
    #[serde(default)]
    pub end: u64,
    #[serde(default)]
    pub confidence: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Transcript {
    pub text: String,
    #[serde(default)]
    pub words: Vec<TranscriptWord>,
}

impl Transcript {
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VocabularyFindingKind {
    #[serde(alias = "banned_term", alias = "banned")]
    BannedWord,
    #[serde(alias = "pronunciation")]
    Mispronunciation,
}

/// A single banned-word occurrence or mispronunciation claim.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct VocabularyCitation {
    #[garde(skip)]
    pub kind: VocabularyFindingKind,

    #[serde(default)]
    #[garde(skip)]
    pub term: String,

    #[serde(default)]
    #[garde(skip)]
    pub timestamp: Option<String>,

    #[serde(default)]
    #[garde(skip)]
    pub context: Option<String>,

    #[serde(default = "full_confidence")]
    #[garde(range(min = 0.0, max = 1.0))]
    pub confidence: f64,
}

fn full_confidence() -> f64 {
    1.0
}

/// Vocabulary/tone verdict on a transcript.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct VocabularyResult {
    #[garde(skip)]
    pub status: CheckStatus,

    #[serde(default)]
    #[garde(skip)]
    pub notes: String,

    #[serde(default)]
    #[garde(dive)]
    pub citations: Vec<VocabularyCitation>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_vision_analysis_validates_confidence() {
        let analysis: VisionAnalysis = serde_json::from_value(json!({
            "logo_compliance": {"status": "pass", "notes": "ok", "citations": []},
            "content_type_analysis": {"classification": "Branded", "confidence": 1.4}
        }))
        .unwrap();
        assert!(analysis.validate().is_err());
    }

    #[test]
    fn test_vision_analysis_missing_dimensions_are_none() {
        let analysis: VisionAnalysis = serde_json::from_value(json!({
            "content_type_analysis": {
                "classification": "UGC",
                "confidence": 0.82,
                "signals": {"marketing_intent": true, "camera_stability": "handheld"}
            }
        }))
        .unwrap();
        assert!(analysis.validate().is_ok());
        assert!(analysis.logo_compliance.is_none());
        let content = analysis.content_type_analysis.unwrap();
        assert!(content.signals.marketing_intent);
        assert!(!content.signals.call_to_action);
    }

    #[test]
    fn test_vocabulary_citation_defaults_confidence() {
        let citation: VocabularyCitation =
            serde_json::from_value(json!({"kind": "banned_term", "term": "cheap"})).unwrap();
        assert_eq!(citation.kind, VocabularyFindingKind::BannedWord);
        assert_eq!(citation.confidence, 1.0);
    }
}

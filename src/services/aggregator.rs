//! Folds heterogeneous service outputs into the canonical set of checks.

use crate::models::analysis::{
    ContentTypeAnalysis, VisionAnalysis, VocabularyCitation, VocabularyFindingKind, VocabularyResult,
};
use crate::models::asset::CreativeType;
use crate::models::brand::BrandGuidelines;
use crate::models::compliance::{
    CheckName, CheckResult, CheckStatus, Citation, ComplianceChecks, DefaultReason, Severity,
};

/// Classifications below this confidence are flagged for review.
const CONTENT_TYPE_MIN_CONFIDENCE: f64 = 0.6;

/// Result of an optional pipeline stage.
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome<T> {
    Completed(T),
    Skipped(DefaultReason),
    Failed(String),
}

impl<T> StageOutcome<T> {
    pub fn as_completed(&self) -> Option<&T> {
        match self {
            StageOutcome::Completed(value) => Some(value),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Aggregation {
    pub checks: ComplianceChecks,
    pub creative_type: Option<CreativeType>,
}

pub fn aggregate(
    guidelines: &BrandGuidelines,
    vision: &VisionAnalysis,
    vocabulary: &StageOutcome<VocabularyResult>,
) -> Aggregation {
    let mut checks = ComplianceChecks::new();

    let content_type = match &vision.content_type_analysis {
        Some(analysis) => content_type_check(analysis),
        None => CheckResult::default_for(CheckName::ContentType, DefaultReason::NotReported),
    };
    checks.insert(CheckName::ContentType, content_type);

    let vocabulary = match vocabulary {
        StageOutcome::Completed(result) => vocabulary_check(result),
        StageOutcome::Skipped(reason) => CheckResult::default_for(CheckName::Vocabulary, reason.clone()),
        StageOutcome::Failed(message) => {
            CheckResult::default_for(CheckName::Vocabulary, DefaultReason::StageFailed(message.clone()))
        }
    };
    checks.insert(CheckName::Vocabulary, vocabulary);

    checks.insert(CheckName::Logo, reported(CheckName::Logo, &vision.logo_compliance));

    let color = if guidelines.has_palette() {
        reported(CheckName::Color, &vision.color_compliance)
    } else {
        CheckResult::default_for(CheckName::Color, DefaultReason::NoPaletteDefined)
    };
    checks.insert(CheckName::Color, color);

    checks.insert(CheckName::Tone, reported(CheckName::Tone, &vision.tone_compliance));

    let disclaimers = if guidelines.requires_disclaimers() {
        reported(CheckName::Disclaimers, &vision.disclaimer_compliance)
    } else {
        CheckResult::default_for(CheckName::Disclaimers, DefaultReason::NoDisclaimersRequired)
    };
    checks.insert(CheckName::Disclaimers, disclaimers);

    checks.insert(CheckName::Layout, reported(CheckName::Layout, &vision.layout_compliance));

    Aggregation {
        checks,
        creative_type: vision.content_type_analysis.as_ref().map(|a| a.classification),
    }
}

fn reported(check: CheckName, result: &Option<CheckResult>) -> CheckResult {
    result
        .clone()
        .unwrap_or_else(|| CheckResult::default_for(check, DefaultReason::NotReported))
}

/// Non-marketing content fails outright, whatever the other dimensions say.
pub fn content_type_check(analysis: &ContentTypeAnalysis) -> CheckResult {
    let confidence_pct = (analysis.confidence * 100.0).round() as i64;
    let signals = describe_signals(analysis);

    let (status, mut notes, impact) = match analysis.classification {
        CreativeType::NonMarketing => (
            CheckStatus::Fail,
            format!(
                "Classified as Non-Marketing ({confidence_pct}% confidence): no promotional intent detected"
            ),
            Some("Non-marketing content is out of category for brand campaigns".to_string()),
        ),
        classification if analysis.confidence < CONTENT_TYPE_MIN_CONFIDENCE => (
            CheckStatus::Warn,
            format!(
                "Classified as {classification} with low confidence ({confidence_pct}%); manual review recommended"
            ),
            None,
        ),
        classification => (
            CheckStatus::Pass,
            format!("Classified as {classification} ({confidence_pct}% confidence)"),
            None,
        ),
    };

    if !signals.is_empty() {
        notes.push_str(&format!(". Signals: {signals}"));
    }
    if let Some(reasoning) = analysis.reasoning.as_deref().filter(|r| !r.trim().is_empty()) {
        notes.push_str(&format!(". {}", reasoning.trim()));
    }

    CheckResult::new(status, notes).with_business_impact(impact)
}

fn describe_signals(analysis: &ContentTypeAnalysis) -> String {
    let s = &analysis.signals;
    let mut parts: Vec<String> = [
        (s.marketing_intent, "marketing intent"),
        (s.product_focus, "product focus"),
        (s.call_to_action, "call to action"),
    ]
    .iter()
    .filter(|(present, _)| *present)
    .map(|(_, label)| label.to_string())
    .collect();

    if let Some(stability) = s.camera_stability.as_deref().filter(|v| !v.is_empty()) {
        parts.push(format!("camera {stability}"));
    }
    if let Some(quality) = s.production_quality.as_deref().filter(|v| !v.is_empty()) {
        parts.push(format!("{quality} production quality"));
    }
    parts.join(", ")
}

fn vocabulary_check(result: &VocabularyResult) -> CheckResult {
    let notes = if result.notes.trim().is_empty() {
        match result.status {
            CheckStatus::Pass => "No banned vocabulary or mispronunciations detected".to_string(),
            _ => format!("{} vocabulary finding(s)", result.citations.len()),
        }
    } else {
        result.notes.clone()
    };

    CheckResult::new(result.status, notes)
        .with_citations(result.citations.iter().map(vocabulary_citation).collect())
}

fn vocabulary_citation(citation: &VocabularyCitation) -> Citation {
    let (description, severity) = match citation.kind {
        VocabularyFindingKind::BannedWord => (format!("Banned term \"{}\"", citation.term), Severity::High),
        VocabularyFindingKind::Mispronunciation => (
            format!(
                "Possible mispronunciation of \"{}\" ({:.0}% confidence)",
                citation.term,
                citation.confidence * 100.0
            ),
            Severity::Medium,
        ),
    };
    let description = match citation.context.as_deref().filter(|c| !c.trim().is_empty()) {
        Some(context) => format!("{description}: \"{}\"", context.trim()),
        None => description,
    };

    Citation {
        timestamp: citation.timestamp.clone(),
        location: None,
        description,
        severity,
    }
}

//! Compliance verdict types shared by the aggregator and the report generator.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// Verdict of a single check, ordered by severity so the worst status is the max.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, AsRefStr, Display, EnumString,
)]
#[serde(rename_all = "lowercase", try_from = "String")]
#[strum(ascii_case_insensitive)]
pub enum CheckStatus {
    #[strum(to_string = "pass", serialize = "passed", serialize = "compliant", serialize = "ok")]
    Pass,
    #[strum(to_string = "warn", serialize = "warning", serialize = "needs_review", serialize = "review")]
    Warn,
    #[strum(
        to_string = "fail",
        serialize = "failed",
        serialize = "non_compliant",
        serialize = "non-compliant",
        serialize = "violation"
    )]
    Fail,
}

impl TryFrom<String> for CheckStatus {
    type Error = strum::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.trim().parse()
    }
}

/// Severity attached to a citation. Unknown labels fall back to `Medium`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase", from = "String")]
#[strum(ascii_case_insensitive)]
pub enum Severity {
    #[strum(to_string = "low", serialize = "minor", serialize = "info")]
    Low,
    #[default]
    #[strum(to_string = "medium", serialize = "moderate")]
    Medium,
    #[strum(to_string = "high", serialize = "major")]
    High,
    #[strum(to_string = "critical", serialize = "severe")]
    Critical,
}

impl From<String> for Severity {
    fn from(value: String) -> Self {
        value.trim().parse().unwrap_or_default()
    }
}

/// A pointer to where in the asset a finding was observed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Citation {
    #[serde(default, deserialize_with = "string_or_number", skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, alias = "text", alias = "issue", alias = "quote", deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default)]
    pub severity: Severity,
}

/// Canonical compliance dimensions, declared in report display order.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumIter,
)]
#[serde(rename_all = "snake_case")]
pub enum CheckName {
    #[strum(to_string = "Content Type")]
    ContentType,
    #[strum(to_string = "Vocabulary")]
    Vocabulary,
    #[strum(to_string = "Logo Usage")]
    Logo,
    #[strum(to_string = "Color Palette")]
    Color,
    #[strum(to_string = "Tone of Voice")]
    Tone,
    #[strum(to_string = "Disclaimers")]
    Disclaimers,
    #[strum(to_string = "Layout")]
    Layout,
}

/// Why a check is being filled in by policy rather than by an analysis service.
#[derive(Debug, Clone, PartialEq)]
pub enum DefaultReason {
    StillImage,
    NoAudio,
    NoPaletteDefined,
    NoDisclaimersRequired,
    NotReported,
    StageFailed(String),
}

impl DefaultReason {
    /// Stable label for the audit payload.
    pub fn label(&self) -> &'static str {
        match self {
            DefaultReason::StillImage => "still_image",
            DefaultReason::NoAudio => "no_audio",
            DefaultReason::NoPaletteDefined => "no_palette_defined",
            DefaultReason::NoDisclaimersRequired => "no_disclaimers_required",
            DefaultReason::NotReported => "not_reported",
            DefaultReason::StageFailed(_) => "stage_failed",
        }
    }
}

/// One compliance dimension's verdict. Built once per run and never mutated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckResult {
    pub status: CheckStatus,
    #[serde(default, deserialize_with = "null_as_default")]
    pub notes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_impact: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub citations: Vec<Citation>,
}

impl CheckResult {
    pub fn new(status: CheckStatus, notes: impl Into<String>) -> Self {
        Self {
            status,
            notes: notes.into(),
            business_impact: None,
            citations: Vec::new(),
        }
    }

    pub fn with_citations(mut self, citations: Vec<Citation>) -> Self {
        self.citations = citations;
        self
    }

    pub fn with_business_impact(mut self, impact: Option<String>) -> Self {
        self.business_impact = impact.filter(|i| !i.trim().is_empty());
        self
    }

    /// The single policy for checks that no service produced a verdict for.
    ///
    /// Absence of input (still image, silent video, no palette, no required
    /// disclaimers) is never a violation and passes. A dimension the service
    /// skipped or a stage that failed after retries is a warning, since the
    /// asset could not be verified either way.
    pub fn default_for(check: CheckName, reason: DefaultReason) -> Self {
        match reason {
            DefaultReason::StillImage => {
                CheckResult::new(CheckStatus::Pass, "Still image: no audio to analyze")
            }
            DefaultReason::NoAudio => CheckResult::new(
                CheckStatus::Pass,
                "No audio or dialogue detected; nothing to analyze",
            ),
            DefaultReason::NoPaletteDefined => CheckResult::new(
                CheckStatus::Pass,
                "No color palette defined or no visual content",
            ),
            DefaultReason::NoDisclaimersRequired => CheckResult::new(
                CheckStatus::Pass,
                "No disclaimers required by brand guidelines",
            ),
            DefaultReason::NotReported => CheckResult::new(
                CheckStatus::Warn,
                format!("{check} was not assessed by the analysis service; manual review recommended"),
            ),
            DefaultReason::StageFailed(message) => CheckResult::new(
                CheckStatus::Warn,
                format!("{check} could not be verified: {message}"),
            ),
        }
    }
}

/// Canonical mapping of check name to verdict. `BTreeMap` keeps display order.
pub type ComplianceChecks = BTreeMap<CheckName, CheckResult>;

/// One display row of the rendered report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FrontendReportItem {
    pub check: String,
    pub result: CheckStatus,
    pub details: String,
}

/// Display-ready report persisted alongside the asset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComplianceReport {
    pub items: Vec<FrontendReportItem>,
    pub overall_status: CheckStatus,
    pub compliance_score: i32,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<serde_json::Value>::deserialize(deserializer)? {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_ordering_is_worst_case() {
        assert!(CheckStatus::Fail > CheckStatus::Warn);
        assert!(CheckStatus::Warn > CheckStatus::Pass);
    }

    #[test]
    fn test_status_parses_model_variants() {
        for (raw, expected) in [
            ("PASS", CheckStatus::Pass),
            ("compliant", CheckStatus::Pass),
            ("Warning", CheckStatus::Warn),
            ("non_compliant", CheckStatus::Fail),
            (" fail ", CheckStatus::Fail),
        ] {
            let parsed: CheckStatus = serde_json::from_value(json!(raw)).unwrap();
            assert_eq!(parsed, expected, "{raw}");
        }
        assert!(serde_json::from_value::<CheckStatus>(json!("maybe")).is_err());
        assert_eq!(serde_json::to_value(CheckStatus::Warn).unwrap(), json!("warn"));
    }

    #[test]
    fn test_check_result_tolerates_sparse_payload() {
        let result: CheckResult = serde_json::from_value(json!({
            "status": "fail",
            "notes": null,
            "citations": [
                {"timestamp": 12.5, "text": "Logo stretched", "severity": "major"},
                {"location": "top-left", "description": "Clear space violated", "severity": "whatever"}
            ]
        }))
        .unwrap();

        assert_eq!(result.status, CheckStatus::Fail);
        assert!(result.notes.is_empty());
        assert_eq!(result.citations.len(), 2);
        assert_eq!(result.citations[0].timestamp.as_deref(), Some("12.5"));
        assert_eq!(result.citations[0].severity, Severity::High);
        assert_eq!(result.citations[1].severity, Severity::Medium);
    }

    #[test]
    fn test_default_policy() {
        let no_audio = CheckResult::default_for(CheckName::Vocabulary, DefaultReason::NoAudio);
        assert_eq!(no_audio.status, CheckStatus::Pass);
        assert!(no_audio.notes.contains("No audio"));

        let palette = CheckResult::default_for(CheckName::Color, DefaultReason::NoPaletteDefined);
        assert_eq!(palette.status, CheckStatus::Pass);
        assert_eq!(palette.notes, "No color palette defined or no visual content");

        let failed = CheckResult::default_for(
            CheckName::Vocabulary,
            DefaultReason::StageFailed("transcription timed out".to_string()),
        );
        assert_eq!(failed.status, CheckStatus::Warn);
        assert_eq!(failed.notes, "Vocabulary could not be verified: transcription timed out");

        let missing = CheckResult::default_for(CheckName::Layout, DefaultReason::NotReported);
        assert_eq!(missing.status, CheckStatus::Warn);
        assert!(missing.citations.is_empty());
    }

    #[test]
    fn test_business_impact_blank_is_dropped() {
        let result = CheckResult::new(CheckStatus::Warn, "x").with_business_impact(Some("  ".into()));
        assert!(result.business_impact.is_none());
    }
}

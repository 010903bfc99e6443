//! Renders canonical checks into display rows and an overall verdict.

use crate::models::compliance::{
    CheckResult, CheckStatus, Citation, ComplianceChecks, ComplianceReport, FrontendReportItem,
};

/// Maximum citations spelled out per row; the rest are counted.
const MAX_LISTED_CITATIONS: usize = 3;

/// Worst-case reduction: any fail → fail, else any warn → warn, else pass.
pub fn overall_status(checks: &ComplianceChecks) -> CheckStatus {
    checks.values().map(|c| c.status).max().unwrap_or(CheckStatus::Pass)
}

/// `round(100 * passed / total)`; an empty set scores 0.
pub fn compliance_score(checks: &ComplianceChecks) -> i32 {
    let total = checks.len();
    if total == 0 {
        return 0;
    }
    let passed = checks.values().filter(|c| c.status == CheckStatus::Pass).count();
    ((100.0 * passed as f64) / total as f64).round() as i32
}

/// Deterministic rendering: rows follow `CheckName` order.
pub fn generate(checks: &ComplianceChecks) -> ComplianceReport {
    let items = checks
        .iter()
        .map(|(name, result)| FrontendReportItem {
            check: name.to_string(),
            result: result.status,
            details: render_details(result),
        })
        .collect();

    ComplianceReport {
        items,
        overall_status: overall_status(checks),
        compliance_score: compliance_score(checks),
    }
}

fn render_details(result: &CheckResult) -> String {
    let mut details = result.notes.trim().to_string();

    if let Some(impact) = &result.business_impact {
        push_sentence(&mut details, &format!("Business impact: {}", impact.trim()));
    }

    if !result.citations.is_empty() {
        let listed: Vec<String> = result
            .citations
            .iter()
            .take(MAX_LISTED_CITATIONS)
            .map(render_citation)
            .collect();
        let mut line = format!("Citations: {}", listed.join("; "));
        let remaining = result.citations.len().saturating_sub(MAX_LISTED_CITATIONS);
        if remaining > 0 {
            line.push_str(&format!("; and {remaining} more"));
        }
        push_sentence(&mut details, &line);
    }

    details
}

fn render_citation(citation: &Citation) -> String {
    let anchor = match (&citation.timestamp, &citation.location) {
        (Some(ts), Some(loc)) => format!("[{ts}, {loc}] "),
        (Some(ts), None) => format!("[{ts}] "),
        (None, Some(loc)) => format!("[{loc}] "),
        (None, None) => String::new(),
    };
    format!("{anchor}{} ({})", citation.description.trim(), citation.severity.as_ref())
}

fn push_sentence(details: &mut String, sentence: &str) {
    if !details.is_empty() {
        if !details.ends_with('.') {
            details.push('.');
        }
        details.push(' ');
    }
    details.push_str(sentence);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::compliance::{CheckName, Severity};

    fn checks(entries: &[(CheckName, CheckStatus)]) -> ComplianceChecks {
        entries
            .iter()
            .map(|(name, status)| (*name, CheckResult::new(*status, format!("{name} notes"))))
            .collect()
    }

    #[test]
    fn test_worst_case_reduction() {
        let set = checks(&[
            (CheckName::Logo, CheckStatus::Pass),
            (CheckName::Color, CheckStatus::Warn),
            (CheckName::Tone, CheckStatus::Pass),
        ]);
        assert_eq!(overall_status(&set), CheckStatus::Warn);
        assert_eq!(compliance_score(&set), 67);

        let set = checks(&[(CheckName::Logo, CheckStatus::Warn), (CheckName::Tone, CheckStatus::Fail)]);
        assert_eq!(overall_status(&set), CheckStatus::Fail);
        assert_eq!(compliance_score(&set), 0);

        let set = checks(&[(CheckName::Logo, CheckStatus::Pass)]);
        assert_eq!(overall_status(&set), CheckStatus::Pass);
        assert_eq!(compliance_score(&set), 100);
    }

    #[test]
    fn test_empty_set() {
        let set = ComplianceChecks::new();
        assert_eq!(overall_status(&set), CheckStatus::Pass);
        assert_eq!(compliance_score(&set), 0);
    }

    #[test]
    fn test_rows_follow_fixed_order_and_are_idempotent() {
        let set = checks(&[
            (CheckName::Disclaimers, CheckStatus::Pass),
            (CheckName::Logo, CheckStatus::Fail),
            (CheckName::ContentType, CheckStatus::Pass),
            (CheckName::Tone, CheckStatus::Warn),
            (CheckName::Vocabulary, CheckStatus::Pass),
            (CheckName::Color, CheckStatus::Pass),
        ]);

        let first = generate(&set);
        let order: Vec<&str> = first.items.iter().map(|i| i.check.as_str()).collect();
        assert_eq!(
            order,
            vec!["Content Type", "Vocabulary", "Logo Usage", "Color Palette", "Tone of Voice", "Disclaimers"]
        );
        assert_eq!(first, generate(&set));
        assert_eq!(first.overall_status, CheckStatus::Fail);
        assert_eq!(first.compliance_score, 67);
    }

    #[test]
    fn test_details_include_impact_and_citations() {
        let citation = |n: usize| Citation {
            timestamp: Some(format!("00:0{n}")),
            location: None,
            description: format!("finding {n}"),
            severity: Severity::High,
        };
        let result = CheckResult::new(CheckStatus::Fail, "Logo distorted")
            .with_business_impact(Some("Weakens recognition".to_string()))
            .with_citations((1..=5).map(citation).collect());

        let details = render_details(&result);
        assert_eq!(
            details,
            "Logo distorted. Business impact: Weakens recognition. Citations: [00:01] finding 1 (high); \
             [00:02] finding 2 (high); [00:03] finding 3 (high); and 2 more"
        );
    }
}

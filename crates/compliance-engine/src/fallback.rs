//! Per-rule fallback validation.
//!
//! When the batch call fails, each rule is judged on its own against a
//! small context of keyword-matched segments, and the model's free-text
//! answer is parsed with marker scanning rather than JSON.

use shared_types::{ComplianceStatus, Rule, Segment, Severity, ValidationResult};
use tracing::warn;

use crate::batch::{pending_result, truncate_chars};
use crate::provider::ChatProvider;

/// Segments included in a per-rule context.
const CONTEXT_SEGMENTS: usize = 5;
/// Content budget per context segment.
const CONTEXT_SEGMENT_CHARS: usize = 500;

pub(crate) const FALLBACK_SYSTEM_PROMPT: &str =
    "You are a compliance validation expert. Answer with a verdict of \
     COMPLIANT, NON_COMPLIANT or PARTIAL, a severity, and a short finding.";

/// Segments whose content or title mentions any rule keyword,
/// case-insensitively, in document order.
pub(crate) fn find_relevant_segments<'a>(rule: &Rule, segments: &'a [Segment]) -> Vec<&'a Segment> {
    let keywords: Vec<String> = rule.keywords.iter().map(|k| k.to_lowercase()).collect();
    segments
        .iter()
        .filter(|segment| {
            let content = segment.content.to_lowercase();
            let title = segment.title.to_lowercase();
            keywords
                .iter()
                .any(|k| content.contains(k.as_str()) || title.contains(k.as_str()))
        })
        .collect()
}

pub(crate) fn build_context(relevant: &[&Segment]) -> String {
    relevant
        .iter()
        .take(CONTEXT_SEGMENTS)
        .map(|segment| {
            format!(
                "[{}]\n{}",
                segment.title,
                truncate_chars(&segment.content, CONTEXT_SEGMENT_CHARS)
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn build_rule_prompt(rule: &Rule, context: &str) -> String {
    let requirements = if rule.requirements.is_empty() {
        String::new()
    } else {
        format!("\nRequirements:\n- {}", rule.requirements.join("\n- "))
    };
    format!(
        "Rule {id}: {name}\n{description}{requirements}\n\n\
         Relevant document sections:\n{context}\n\n\
         Is the document compliant with this rule? State COMPLIANT, \
         NON_COMPLIANT or PARTIAL, the severity (CRITICAL, HIGH, MEDIUM, \
         LOW or INFO), and explain the finding.",
        id = rule.id,
        name = rule.name,
        description = rule.description,
        context = if context.is_empty() {
            "(no sections matched this rule's keywords)"
        } else {
            context
        },
    )
}

fn parse_status(text: &str) -> ComplianceStatus {
    let upper = text.to_uppercase();
    if upper.contains("NON_COMPLIANT") || upper.contains("NON-COMPLIANT") {
        ComplianceStatus::NonCompliant
    } else if upper.contains("COMPLIANT") {
        ComplianceStatus::Compliant
    } else {
        ComplianceStatus::Partial
    }
}

fn parse_severity(text: &str, default: Severity) -> Severity {
    let upper = text.to_uppercase();
    for severity in [
        Severity::Critical,
        Severity::High,
        Severity::Medium,
        Severity::Low,
        Severity::Info,
    ] {
        if upper.contains(&severity.as_str().to_uppercase()) {
            return severity;
        }
    }
    default
}

/// First non-empty line that is not a markdown heading, capped at 200 chars.
fn summarize(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| truncate_chars(line, 200).to_string())
        .unwrap_or_default()
}

pub(crate) fn parse_free_text(rule: &Rule, segments: &[&Segment], text: &str) -> ValidationResult {
    let status = parse_status(text);
    ValidationResult {
        rule_id: rule.id.clone(),
        rule_name: rule.name.clone(),
        framework: rule.framework,
        status,
        severity: parse_severity(text, rule.severity_default),
        confidence_score: 0.7,
        finding_summary: summarize(text),
        finding_details: String::new(),
        affected_sections: segments
            .iter()
            .take(CONTEXT_SEGMENTS)
            .map(|s| s.title.clone())
            .collect(),
        evidence: Vec::new(),
        remediation_required: status == ComplianceStatus::NonCompliant,
        remediation_suggestions: String::new(),
        ai_explanation: text.to_string(),
    }
}

/// Judge one rule in isolation. Provider failure degrades to a pending
/// result carrying the error, never an `Err`.
pub(crate) async fn validate_rule(
    provider: &dyn ChatProvider,
    rule: &Rule,
    segments: &[Segment],
) -> ValidationResult {
    let relevant = find_relevant_segments(rule, segments);
    let context = build_context(&relevant);
    let prompt = build_rule_prompt(rule, &context);

    match provider.chat(FALLBACK_SYSTEM_PROMPT, &prompt, false).await {
        Ok(text) => parse_free_text(rule, &relevant, &text),
        Err(e) => {
            warn!(rule_id = %rule.id, %e, "per-rule validation failed");
            let mut result = pending_result(rule, "Per-rule validation failed");
            result.finding_summary = format!("Validation failed: {e}");
            result
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use shared_types::{Framework, SegmentKind, SemanticType};
    use std::collections::BTreeMap;

    fn rule(keywords: &[&str]) -> Rule {
        Rule {
            id: "R1".to_string(),
            name: "Cash flow disclosure".to_string(),
            description: "A cash flow statement must be presented.".to_string(),
            requirements: vec!["Statement present".to_string()],
            keywords: keywords.iter().map(|s| s.to_string()).collect(),
            severity_default: Severity::High,
            framework: Framework::IndAs,
        }
    }

    fn segment(title: &str, content: &str) -> Segment {
        Segment {
            kind: SegmentKind::Header,
            level: 1,
            title: title.to_string(),
            content: content.to_string(),
            line_start: 0,
            line_end: 0,
            semantic_type: SemanticType::Paragraph,
            confidence: 0.7,
            metadata: BTreeMap::new(),
        }
    }

    #[test]
    fn keyword_match_covers_title_and_content() {
        let rule = rule(&["cash flow"]);
        let segments = vec![
            segment("CASH FLOW STATEMENT", "table follows"),
            segment("Notes", "operating cash flow improved"),
            segment("Directors", "board composition"),
        ];
        let relevant = find_relevant_segments(&rule, &segments);
        assert_eq!(relevant.len(), 2);
        assert_eq!(relevant[0].title, "CASH FLOW STATEMENT");
    }

    #[test]
    fn context_caps_segment_count_and_length() {
        let rule = rule(&["note"]);
        let segments: Vec<Segment> = (0..8)
            .map(|i| segment(&format!("Note {i}"), &"note ".repeat(300)))
            .collect();
        let relevant = find_relevant_segments(&rule, &segments);
        let context = build_context(&relevant);

        assert_eq!(context.matches("[Note").count(), 5);
        for block in context.split("\n\n") {
            assert!(block.chars().count() <= 500 + "[Note 0]\n".len());
        }
    }

    #[test]
    fn non_compliant_beats_bare_compliant() {
        let rule = rule(&[]);
        let result = parse_free_text(
            &rule,
            &[],
            "The document is NON-COMPLIANT even though parts look compliant.",
        );
        assert_eq!(result.status, ComplianceStatus::NonCompliant);
        assert!(result.remediation_required);
    }

    #[test]
    fn no_verdict_marker_means_partial() {
        let rule = rule(&[]);
        let result = parse_free_text(&rule, &[], "Unable to determine from the excerpt.");
        assert_eq!(result.status, ComplianceStatus::Partial);
        assert_eq!(result.confidence_score, 0.7);
    }

    #[test]
    fn severity_scan_prefers_most_severe_marker() {
        let rule = rule(&[]);
        let result = parse_free_text(
            &rule,
            &[],
            "NON_COMPLIANT. Severity is LOW for most items but CRITICAL overall.",
        );
        assert_eq!(result.severity, Severity::Critical);
    }

    #[test]
    fn missing_severity_marker_uses_rule_default() {
        let rule = rule(&[]);
        let result = parse_free_text(&rule, &[], "COMPLIANT. All statements present.");
        assert_eq!(result.severity, Severity::High);
    }

    #[test]
    fn summary_skips_headings_and_caps_length() {
        let rule = rule(&[]);
        let text = format!("# Verdict\n\nCOMPLIANT. {}", "detail ".repeat(100));
        let result = parse_free_text(&rule, &[], &text);
        assert!(result.finding_summary.starts_with("COMPLIANT."));
        assert!(result.finding_summary.chars().count() <= 200);
        assert_eq!(result.ai_explanation, text);
    }

    proptest! {
        #[test]
        fn any_text_with_non_compliant_marker_is_non_compliant(
            prefix in "[a-z ]{0,40}",
            suffix in "[a-z ]{0,40}",
        ) {
            let rule = rule(&[]);
            let text = format!("{prefix}NON_COMPLIANT{suffix}");
            let result = parse_free_text(&rule, &[], &text);
            prop_assert_eq!(result.status, ComplianceStatus::NonCompliant);
        }
    }
}

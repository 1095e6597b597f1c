//! Batch validation path.
//!
//! All rules for a framework are judged in one chat completion: the prompt
//! carries the rule catalog as JSON plus a truncated document excerpt, and
//! the model answers with a JSON array of verdicts. Responses are parsed
//! permissively; rules the model skipped come back as pending.

use std::collections::HashMap;

use serde::{Deserialize, Deserializer};
use shared_types::{ComplianceStatus, Rule, Severity, ValidationResult};
use tracing::warn;

pub(crate) const SYSTEM_PROMPT: &str =
    "You are a compliance validation expert. Return only valid JSON.";

/// Document excerpt budget for the batch prompt.
const DOCUMENT_EXCERPT_CHARS: usize = 8_000;

/// Truncate at a char boundary without allocating when the text fits.
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

pub(crate) fn build_batch_prompt(rules: &[Rule], document_text: &str) -> String {
    let catalog: Vec<serde_json::Value> = rules
        .iter()
        .map(|r| {
            serde_json::json!({
                "rule_id": r.id,
                "name": r.name,
                "description": r.description,
                "requirements": r.requirements,
                "severity": r.severity_default,
            })
        })
        .collect();
    let catalog_json =
        serde_json::to_string_pretty(&catalog).unwrap_or_else(|_| "[]".to_string());

    format!(
        "Validate the document below against every rule in this catalog.\n\
         \n\
         Rules:\n{catalog_json}\n\
         \n\
         Document (truncated):\n{excerpt}\n\
         \n\
         Respond with a JSON array containing exactly one object per rule, in catalog order:\n\
         [{{\"rule_id\": \"...\", \"status\": \"compliant|non_compliant|partial\", \
         \"severity\": \"critical|high|medium|low|info\", \"confidence\": 0.0, \
         \"finding_summary\": \"...\", \"finding_details\": \"...\", \
         \"affected_sections\": [], \"evidence\": [], \
         \"remediation_required\": false, \"remediation_suggestions\": \"...\"}}]",
        excerpt = truncate_chars(document_text, DOCUMENT_EXCERPT_CHARS),
    )
}

/// Pull the first JSON array out of a response that may be wrapped in prose
/// or code fences.
pub(crate) fn extract_json_array(response: &str) -> Option<&str> {
    let start = response.find('[')?;
    let end = response.rfind(']')?;
    if end <= start {
        return None;
    }
    Some(&response[start..=end])
}

fn de_status<'de, D: Deserializer<'de>>(d: D) -> Result<ComplianceStatus, D::Error> {
    let raw = String::deserialize(d)?;
    Ok(match raw.to_ascii_lowercase().as_str() {
        "compliant" => ComplianceStatus::Compliant,
        "non_compliant" | "non-compliant" | "noncompliant" => ComplianceStatus::NonCompliant,
        "partial" | "partially_compliant" => ComplianceStatus::Partial,
        _ => ComplianceStatus::Pending,
    })
}

fn de_severity<'de, D: Deserializer<'de>>(d: D) -> Result<Severity, D::Error> {
    let raw = String::deserialize(d)?;
    Ok(Severity::parse(&raw).unwrap_or(Severity::Medium))
}

fn de_yes_no<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum YesNo {
        Bool(bool),
        Text(String),
    }
    Ok(match YesNo::deserialize(d)? {
        YesNo::Bool(b) => b,
        YesNo::Text(s) => matches!(s.to_ascii_lowercase().as_str(), "true" | "yes" | "required"),
    })
}

fn default_confidence() -> f32 {
    0.7
}

/// One model verdict as it appears on the wire. Field tolerance matters
/// more than strictness here; anything unusable degrades to pending.
#[derive(Debug, Deserialize)]
pub(crate) struct BatchVerdict {
    #[serde(default)]
    pub rule_id: String,
    #[serde(deserialize_with = "de_status", default = "pending_status")]
    pub status: ComplianceStatus,
    #[serde(deserialize_with = "de_severity", default = "default_verdict_severity")]
    pub severity: Severity,
    #[serde(default = "default_confidence")]
    pub confidence: f32,
    #[serde(default)]
    pub finding_summary: String,
    #[serde(default)]
    pub finding_details: String,
    #[serde(default)]
    pub affected_sections: Vec<String>,
    #[serde(default)]
    pub evidence: Vec<String>,
    #[serde(deserialize_with = "de_yes_no", default)]
    pub remediation_required: bool,
    #[serde(default)]
    pub remediation_suggestions: String,
}

fn pending_status() -> ComplianceStatus {
    ComplianceStatus::Pending
}

fn default_verdict_severity() -> Severity {
    Severity::Medium
}

/// Placeholder for a rule the model did not answer.
pub(crate) fn pending_result(rule: &Rule, explanation: &str) -> ValidationResult {
    ValidationResult {
        rule_id: rule.id.clone(),
        rule_name: rule.name.clone(),
        framework: rule.framework,
        status: ComplianceStatus::Pending,
        severity: Severity::Medium,
        confidence_score: 0.0,
        finding_summary: "Validation pending".to_string(),
        finding_details: String::new(),
        affected_sections: Vec::new(),
        evidence: Vec::new(),
        remediation_required: false,
        remediation_suggestions: String::new(),
        ai_explanation: explanation.to_string(),
    }
}

fn verdict_to_result(rule: &Rule, verdict: BatchVerdict) -> ValidationResult {
    ValidationResult {
        rule_id: rule.id.clone(),
        rule_name: rule.name.clone(),
        framework: rule.framework,
        status: verdict.status,
        severity: verdict.severity,
        confidence_score: verdict.confidence.clamp(0.0, 1.0),
        finding_summary: verdict.finding_summary,
        finding_details: verdict.finding_details,
        affected_sections: verdict.affected_sections,
        evidence: verdict.evidence,
        remediation_required: verdict.remediation_required,
        remediation_suggestions: verdict.remediation_suggestions,
        ai_explanation: String::new(),
    }
}

/// Map raw verdicts onto the rule catalog, one result per rule in catalog
/// order. Verdicts are matched by `rule_id` first; a verdict with an empty
/// or unknown id falls back to its position in the response. Unanswered
/// rules become pending.
pub(crate) fn map_batch_results(rules: &[Rule], verdicts: Vec<BatchVerdict>) -> Vec<ValidationResult> {
    let known_ids: HashMap<&str, usize> = rules
        .iter()
        .enumerate()
        .map(|(i, r)| (r.id.as_str(), i))
        .collect();

    let mut by_rule: Vec<Option<BatchVerdict>> = (0..rules.len()).map(|_| None).collect();
    for (pos, verdict) in verdicts.into_iter().enumerate() {
        let slot = match known_ids.get(verdict.rule_id.as_str()) {
            Some(&i) => Some(i),
            None if verdict.rule_id.is_empty() && pos < rules.len() => Some(pos),
            None => {
                warn!(rule_id = %verdict.rule_id, pos, "verdict for unknown rule, dropping");
                None
            }
        };
        if let Some(i) = slot {
            if by_rule[i].is_some() {
                warn!(rule_id = %rules[i].id, "duplicate verdict, keeping first");
            } else {
                by_rule[i] = Some(verdict);
            }
        }
    }

    rules
        .iter()
        .zip(by_rule)
        .map(|(rule, verdict)| match verdict {
            Some(v) => verdict_to_result(rule, v),
            None => pending_result(rule, "Batch validation incomplete"),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use shared_types::Framework;

    fn rule(id: &str) -> Rule {
        Rule {
            id: id.to_string(),
            name: format!("Rule {id}"),
            description: String::new(),
            requirements: Vec::new(),
            keywords: Vec::new(),
            severity_default: Severity::Medium,
            framework: Framework::IndAs,
        }
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_chars("abcdef", 3), "abc");
        assert_eq!(truncate_chars("ab", 10), "ab");
        // multibyte: must not split the rupee sign
        assert_eq!(truncate_chars("₹₹₹₹", 2), "₹₹");
    }

    #[test]
    fn extracts_array_from_fenced_response() {
        let response = "Here you go:\n```json\n[{\"rule_id\": \"R1\"}]\n```\nDone.";
        assert_eq!(extract_json_array(response), Some("[{\"rule_id\": \"R1\"}]"));
        assert_eq!(extract_json_array("no array here"), None);
        assert_eq!(extract_json_array("] backwards ["), None);
    }

    #[test]
    fn prompt_contains_catalog_and_excerpt() {
        let rules = vec![rule("R1")];
        let prompt = build_batch_prompt(&rules, "DOCUMENT BODY");
        assert!(prompt.contains("\"rule_id\": \"R1\""));
        assert!(prompt.contains("DOCUMENT BODY"));
    }

    #[test]
    fn prompt_truncates_long_documents() {
        let rules = vec![rule("R1")];
        let long = "x".repeat(20_000);
        let prompt = build_batch_prompt(&rules, &long);
        assert!(prompt.matches('x').count() <= 8_000);
    }

    #[test]
    fn verdicts_map_by_rule_id_regardless_of_order() {
        let rules = vec![rule("R1"), rule("R2")];
        let verdicts: Vec<BatchVerdict> = serde_json::from_str(
            r#"[
                {"rule_id": "R2", "status": "non_compliant", "severity": "high",
                 "confidence": 0.9, "finding_summary": "missing"},
                {"rule_id": "R1", "status": "compliant", "confidence": 0.8}
            ]"#,
        )
        .unwrap();

        let results = map_batch_results(&rules, verdicts);
        assert_eq!(results[0].rule_id, "R1");
        assert_eq!(results[0].status, ComplianceStatus::Compliant);
        assert_eq!(results[1].rule_id, "R2");
        assert_eq!(results[1].status, ComplianceStatus::NonCompliant);
        assert_eq!(results[1].severity, Severity::High);
    }

    #[test]
    fn unanswered_rules_become_pending() {
        let rules = vec![rule("R1"), rule("R2"), rule("R3")];
        let verdicts: Vec<BatchVerdict> =
            serde_json::from_str(r#"[{"rule_id": "R2", "status": "compliant"}]"#).unwrap();

        let results = map_batch_results(&rules, verdicts);
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].status, ComplianceStatus::Pending);
        assert_eq!(results[0].confidence_score, 0.0);
        assert_eq!(results[0].finding_summary, "Validation pending");
        assert_eq!(results[1].status, ComplianceStatus::Compliant);
        assert_eq!(results[2].status, ComplianceStatus::Pending);
    }

    #[test]
    fn idless_verdicts_fall_back_to_position() {
        let rules = vec![rule("R1"), rule("R2")];
        let verdicts: Vec<BatchVerdict> = serde_json::from_str(
            r#"[{"status": "compliant"}, {"status": "partial"}]"#,
        )
        .unwrap();

        let results = map_batch_results(&rules, verdicts);
        assert_eq!(results[0].status, ComplianceStatus::Compliant);
        assert_eq!(results[1].status, ComplianceStatus::Partial);
    }

    #[test]
    fn permissive_field_parsing() {
        let verdict: BatchVerdict = serde_json::from_str(
            r#"{"rule_id": "R1", "status": "NON-COMPLIANT", "severity": "blocker",
                "remediation_required": "yes", "confidence": 1.5}"#,
        )
        .unwrap();
        assert_eq!(verdict.status, ComplianceStatus::NonCompliant);
        assert_eq!(verdict.severity, Severity::Medium);
        assert!(verdict.remediation_required);

        let rules = vec![rule("R1")];
        let results = map_batch_results(&rules, vec![verdict]);
        assert_eq!(results[0].confidence_score, 1.0);
    }
}

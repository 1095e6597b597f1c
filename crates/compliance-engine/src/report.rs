//! Summary statistics over validation results.

use shared_types::{ComplianceStatus, ComplianceSummary, Severity, SeverityBreakdown, ValidationResult};

/// Aggregate a result set. The score counts only fully compliant rules;
/// partial and pending findings lower it the same way non-compliance does.
/// The severity breakdown tallies every result regardless of status.
pub fn summarize(results: &[ValidationResult]) -> ComplianceSummary {
    let mut summary = ComplianceSummary {
        total_rules: results.len(),
        compliant: 0,
        non_compliant: 0,
        partial: 0,
        pending: 0,
        compliance_score: 0.0,
        severity_breakdown: SeverityBreakdown::default(),
    };

    for result in results {
        match result.status {
            ComplianceStatus::Compliant => summary.compliant += 1,
            ComplianceStatus::NonCompliant => summary.non_compliant += 1,
            ComplianceStatus::Partial => summary.partial += 1,
            ComplianceStatus::Pending => summary.pending += 1,
        }
        match result.severity {
            Severity::Critical => summary.severity_breakdown.critical += 1,
            Severity::High => summary.severity_breakdown.high += 1,
            Severity::Medium => summary.severity_breakdown.medium += 1,
            Severity::Low => summary.severity_breakdown.low += 1,
            Severity::Info => summary.severity_breakdown.info += 1,
        }
    }

    if summary.total_rules > 0 {
        let score = summary.compliant as f64 / summary.total_rules as f64 * 100.0;
        summary.compliance_score = (score * 100.0).round() / 100.0;
    }
    summary
}

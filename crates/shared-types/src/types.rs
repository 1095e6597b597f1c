use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Regulatory frameworks a document can be validated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Framework {
    IndAs,
    Sebi,
    Rbi,
    CompaniesAct,
}

impl Framework {
    pub fn as_str(&self) -> &'static str {
        match self {
            Framework::IndAs => "ind_as",
            Framework::Sebi => "sebi",
            Framework::Rbi => "rbi",
            Framework::CompaniesAct => "companies_act",
        }
    }

    /// Parse a framework identifier as it appears in rule file names.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ind_as" => Some(Framework::IndAs),
            "sebi" => Some(Framework::Sebi),
            "rbi" => Some(Framework::Rbi),
            "companies_act" => Some(Framework::CompaniesAct),
            _ => None,
        }
    }

    pub fn all() -> &'static [Framework] {
        &[
            Framework::IndAs,
            Framework::Sebi,
            Framework::Rbi,
            Framework::CompaniesAct,
        ]
    }
}

impl fmt::Display for Framework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compliance status for a single rule finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceStatus {
    Compliant,
    NonCompliant,
    Partial,
    Pending,
}

impl ComplianceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComplianceStatus::Compliant => "compliant",
            ComplianceStatus::NonCompliant => "non_compliant",
            ComplianceStatus::Partial => "partial",
            ComplianceStatus::Pending => "pending",
        }
    }
}

/// Finding severity, ordered most to least severe.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Info,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
            Severity::Info => "info",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "critical" => Some(Severity::Critical),
            "high" => Some(Severity::High),
            "medium" => Some(Severity::Medium),
            "low" => Some(Severity::Low),
            "info" => Some(Severity::Info),
            _ => None,
        }
    }
}

/// A table extracted from a document: ordered rows of string cells.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TableData {
    pub rows: Vec<Vec<String>>,
    /// Sheet name for spreadsheet sources.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sheet: Option<String>,
    /// 1-indexed page for paged sources.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
}

impl TableData {
    pub fn new(rows: Vec<Vec<String>>) -> Self {
        Self {
            rows,
            sheet: None,
            page: None,
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn col_count(&self) -> usize {
        self.rows.first().map(|r| r.len()).unwrap_or(0)
    }

    /// Plain-text rendering used for segment content and indexing.
    pub fn render_text(&self) -> String {
        self.rows
            .iter()
            .map(|row| row.join(" | "))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Immutable result of extracting one document.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RawExtraction {
    pub text: String,
    pub tables: Vec<TableData>,
    pub metadata: BTreeMap<String, String>,
    pub ocr_used: bool,
    /// Mean per-token OCR confidence on the engine's native 0-100 scale.
    pub ocr_confidence: Option<f32>,
    pub page_count: Option<u32>,
}

impl RawExtraction {
    pub fn empty() -> Self {
        Self {
            text: String::new(),
            tables: Vec::new(),
            metadata: BTreeMap::new(),
            ocr_used: false,
            ocr_confidence: None,
            page_count: None,
        }
    }
}

/// Structural classification of a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentKind {
    Header,
    Paragraph,
    Table,
}

impl SegmentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SegmentKind::Header => "header",
            SegmentKind::Paragraph => "paragraph",
            SegmentKind::Table => "table",
        }
    }
}

/// Semantic classification derived from segment content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticType {
    FinancialData,
    Footnote,
    Introduction,
    Table,
    Paragraph,
}

impl SemanticType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SemanticType::FinancialData => "financial_data",
            SemanticType::Footnote => "footnote",
            SemanticType::Introduction => "introduction",
            SemanticType::Table => "table",
            SemanticType::Paragraph => "paragraph",
        }
    }
}

/// A contiguous, classified unit of a document. Created once during
/// segmentation and never mutated afterward.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Segment {
    pub kind: SegmentKind,
    pub level: u32,
    pub title: String,
    pub content: String,
    pub line_start: usize,
    pub line_end: usize,
    pub semantic_type: SemanticType,
    /// Classification confidence in [0, 1].
    pub confidence: f32,
    pub metadata: BTreeMap<String, String>,
}

/// One compliance rule within a framework's rule set.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Rule {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub requirements: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub severity_default: Severity,
    pub framework: Framework,
}

/// Outcome of judging one rule against one document.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ValidationResult {
    pub rule_id: String,
    pub rule_name: String,
    pub framework: Framework,
    pub status: ComplianceStatus,
    pub severity: Severity,
    /// Judgment confidence in [0, 1].
    pub confidence_score: f32,
    pub finding_summary: String,
    pub finding_details: String,
    pub affected_sections: Vec<String>,
    pub evidence: Vec<String>,
    pub remediation_required: bool,
    pub remediation_suggestions: String,
    pub ai_explanation: String,
}

/// One validation invocation for a document+framework, grouping its results
/// under a generated run id. Runs are append-only; re-validating creates a
/// new run rather than overwriting old results.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ValidationRun {
    pub id: Uuid,
    pub document_id: i64,
    pub framework: Framework,
    pub started_at: DateTime<Utc>,
    pub results: Vec<ValidationResult>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SeverityBreakdown {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub info: usize,
}

/// Derived statistics over a set of validation results. Computed on demand,
/// never stored.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ComplianceSummary {
    pub total_rules: usize,
    pub compliant: usize,
    pub non_compliant: usize,
    pub partial: usize,
    pub pending: usize,
    /// compliant / total * 100, rounded to 2 decimals; 0 when total is 0.
    pub compliance_score: f64,
    pub severity_breakdown: SeverityBreakdown,
}

pub mod types;

pub use types::{
    ComplianceStatus, ComplianceSummary, Framework, RawExtraction, Rule, Segment, SegmentKind,
    SemanticType, Severity, SeverityBreakdown, TableData, ValidationResult, ValidationRun,
};

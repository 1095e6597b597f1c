//! Heuristic document segmentation.
//!
//! Splits extracted text into ordered, classified sections in a single pass
//! over its lines, maintaining one open section accumulator. Detected
//! headers close the current section and open the next; extracted tables
//! are appended as segments in their own right.

pub mod patterns;

use std::collections::BTreeMap;

use shared_types::{Segment, SegmentKind, SemanticType, TableData};
use tracing::{debug, info};

use patterns::{
    contains_any, FINANCIAL_KEYWORDS, INTRO_KEYWORDS, NOTE_KEYWORDS, NUMBERED_HEADING,
    ROMAN_HEADING,
};

/// Sections starting after this many lines are never classified as
/// introductions.
const INTRO_LINE_WINDOW: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HeaderStyle {
    Numbered,
    Caps,
    Roman,
}

impl HeaderStyle {
    fn as_str(&self) -> &'static str {
        match self {
            HeaderStyle::Numbered => "numbered",
            HeaderStyle::Caps => "caps",
            HeaderStyle::Roman => "roman",
        }
    }
}

#[derive(Debug)]
struct HeaderInfo {
    level: u32,
    title: String,
    section_number: Option<String>,
    style: HeaderStyle,
}

/// Detect whether a (trimmed, non-empty) line is a header. Patterns are
/// tried in priority order; the first match wins.
fn detect_header(line: &str) -> Option<HeaderInfo> {
    if let Some(caps) = NUMBERED_HEADING.captures(line) {
        let section_number = caps[1].to_string();
        return Some(HeaderInfo {
            level: section_number.matches('.').count() as u32,
            title: caps[3].to_string(),
            section_number: Some(section_number),
            style: HeaderStyle::Numbered,
        });
    }

    let char_count = line.chars().count();
    let has_alpha = line.chars().any(|c| c.is_alphabetic());
    let all_caps = has_alpha && !line.chars().any(|c| c.is_lowercase());
    if all_caps && char_count > 3 && char_count < 100 {
        return Some(HeaderInfo {
            level: 1,
            title: line.to_string(),
            section_number: None,
            style: HeaderStyle::Caps,
        });
    }

    if let Some(caps) = ROMAN_HEADING.captures(line) {
        return Some(HeaderInfo {
            level: 2,
            title: caps[2].to_string(),
            section_number: Some(caps[1].to_string()),
            style: HeaderStyle::Roman,
        });
    }

    None
}

struct OpenSection {
    level: u32,
    title: String,
    section_number: Option<String>,
    style: Option<HeaderStyle>,
    content: String,
    line_start: usize,
}

impl OpenSection {
    fn document_start() -> Self {
        Self {
            level: 0,
            title: "Document Start".to_string(),
            section_number: None,
            style: None,
            content: String::new(),
            line_start: 0,
        }
    }

    fn from_header(info: HeaderInfo, line_start: usize) -> Self {
        Self {
            level: info.level,
            title: info.title,
            section_number: info.section_number,
            style: Some(info.style),
            content: String::new(),
            line_start,
        }
    }

    fn close(self, line_end: usize) -> Segment {
        let confidence = section_confidence(self.section_number.is_some(), &self.content);

        let mut metadata = BTreeMap::new();
        if let Some(number) = &self.section_number {
            metadata.insert("section_number".to_string(), number.clone());
        }
        if let Some(style) = self.style {
            metadata.insert("header_style".to_string(), style.as_str().to_string());
        }

        let semantic_type = classify(&self.title, &self.content, self.line_start);

        Segment {
            kind: SegmentKind::Header,
            level: self.level,
            title: self.title,
            content: self.content,
            line_start: self.line_start,
            line_end,
            semantic_type,
            confidence,
            metadata,
        }
    }
}

/// Base 0.7, +0.2 for an explicit section number, +0.1 for content longer
/// than 100 characters, capped at 1.0.
fn section_confidence(has_section_number: bool, content: &str) -> f32 {
    let mut confidence: f32 = 0.7;
    if has_section_number {
        confidence += 0.2;
    }
    if content.chars().count() > 100 {
        confidence += 0.1;
    }
    confidence.min(1.0)
}

/// Fixed keyword-priority classification; first match wins. Title and
/// content are considered together so an ALL-CAPS financial header marks
/// its section even when the body never repeats the keyword.
fn classify(title: &str, content: &str, line_start: usize) -> SemanticType {
    let combined = format!("{title}\n{content}").to_lowercase();

    if contains_any(&combined, FINANCIAL_KEYWORDS) {
        SemanticType::FinancialData
    } else if contains_any(&combined, NOTE_KEYWORDS) {
        SemanticType::Footnote
    } else if line_start < INTRO_LINE_WINDOW && contains_any(&combined, INTRO_KEYWORDS) {
        SemanticType::Introduction
    } else {
        SemanticType::Paragraph
    }
}

fn table_segment(index: usize, table: &TableData) -> Segment {
    let mut metadata = BTreeMap::new();
    metadata.insert("row_count".to_string(), table.row_count().to_string());
    metadata.insert("col_count".to_string(), table.col_count().to_string());
    if let Some(sheet) = &table.sheet {
        metadata.insert("sheet".to_string(), sheet.clone());
    }

    Segment {
        kind: SegmentKind::Table,
        level: 0,
        title: format!("Table {}", index + 1),
        content: table.render_text(),
        line_start: 0,
        line_end: 0,
        semantic_type: SemanticType::Table,
        confidence: 0.95,
        metadata,
    }
}

/// Single-pass heuristic segmentation engine.
pub struct SegmentationEngine;

impl SegmentationEngine {
    pub fn new() -> Self {
        Self
    }

    /// Segment document text into ordered classified sections, appending one
    /// table segment per extracted table. Deterministic: the same input
    /// always yields the same segment sequence.
    pub fn segment(&self, text: &str, tables: &[TableData]) -> Vec<Segment> {
        debug!(chars = text.len(), tables = tables.len(), "starting segmentation");

        let lines: Vec<&str> = text.split('\n').collect();
        let mut segments = Vec::new();
        let mut current = OpenSection::document_start();

        for (i, raw_line) in lines.iter().enumerate() {
            let line = raw_line.trim();
            if line.is_empty() {
                continue;
            }

            match detect_header(line) {
                Some(info) => {
                    if !current.content.is_empty() {
                        segments.push(current.close(i.saturating_sub(1)));
                    }
                    current = OpenSection::from_header(info, i);
                }
                None => {
                    current.content.push_str(line);
                    current.content.push('\n');
                }
            }
        }

        if !current.content.is_empty() {
            segments.push(current.close(lines.len().saturating_sub(1)));
        }

        for (i, table) in tables.iter().enumerate() {
            segments.push(table_segment(i, table));
        }

        info!(segments = segments.len(), "segmentation complete");
        segments
    }
}

impl Default for SegmentationEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn segment_text(text: &str) -> Vec<Segment> {
        SegmentationEngine::new().segment(text, &[])
    }

    #[test]
    fn numbered_and_caps_headers_split_sections() {
        let text = "1. Revenue\nWe recognize revenue on delivery.\n\nCASH FLOW\nOperating activities...";
        let segments = segment_text(text);

        assert_eq!(segments.len(), 2);

        assert_eq!(segments[0].title, "Revenue");
        assert_eq!(segments[0].level, 1);
        assert_eq!(segments[0].metadata.get("header_style").unwrap(), "numbered");
        assert_eq!(segments[0].semantic_type, SemanticType::FinancialData);

        assert_eq!(segments[1].title, "CASH FLOW");
        assert_eq!(segments[1].level, 1);
        assert_eq!(segments[1].metadata.get("header_style").unwrap(), "caps");
        // The header itself carries the financial keyword.
        assert_eq!(segments[1].semantic_type, SemanticType::FinancialData);
    }

    #[test]
    fn numbered_level_counts_dot_components() {
        let segments = segment_text("2.1.3. Deferred Tax\nBalances are reviewed annually.");
        assert_eq!(segments[0].level, 3);
        assert_eq!(segments[0].metadata.get("section_number").unwrap(), "2.1.3.");
    }

    #[test]
    fn caps_header_length_bounds_are_strict() {
        // 3 characters: too short to be a header, becomes content.
        let segments = segment_text("EPS\ndiluted figures follow");
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].title, "Document Start");

        let segments = segment_text("RISK\nmarket risk discussion");
        assert_eq!(segments[0].title, "RISK");
    }

    #[test]
    fn roman_heading_detected_when_mixed_case() {
        let segments = segment_text("IV. Liquidity risk\nShort-term obligations are covered.");
        assert_eq!(segments[0].level, 2);
        assert_eq!(segments[0].metadata.get("header_style").unwrap(), "roman");
        assert_eq!(segments[0].metadata.get("section_number").unwrap(), "IV");
    }

    #[test]
    fn all_caps_roman_line_is_classified_as_caps_first() {
        let segments = segment_text("IV. ASSETS\nland and buildings");
        assert_eq!(segments[0].metadata.get("header_style").unwrap(), "caps");
        assert_eq!(segments[0].level, 1);
    }

    #[test]
    fn header_without_content_is_dropped() {
        let segments = segment_text("1. Empty Section\n2. Real Section\nSome body text.");
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].title, "Real Section");
    }

    #[test]
    fn classification_priority_financial_over_footnote() {
        let segments = segment_text("1. Heading\nSee note 4 on revenue recognition.");
        assert_eq!(segments[0].semantic_type, SemanticType::FinancialData);
    }

    #[test]
    fn footnote_classification() {
        let segments = segment_text("1. Heading\nRefer to footnote 12 for details.");
        assert_eq!(segments[0].semantic_type, SemanticType::Footnote);
    }

    #[test]
    fn introduction_requires_early_start() {
        let intro = segment_text("1. Heading\nThis overview describes the company.");
        assert_eq!(intro[0].semantic_type, SemanticType::Introduction);

        // Same section text past the opening window is a plain paragraph.
        let mut filler = "filler\n".repeat(60);
        filler.push_str("1. Heading\nThis overview describes the company.");
        let late = segment_text(&filler);
        let last = late.last().unwrap();
        assert_eq!(last.semantic_type, SemanticType::Paragraph);
    }

    #[test]
    fn confidence_formula_and_cap() {
        assert_eq!(section_confidence(false, "short"), 0.7);
        assert_eq!(section_confidence(true, "short"), 0.9);
        let long = "x".repeat(150);
        assert!((section_confidence(true, &long) - 1.0).abs() < f32::EPSILON);
        assert!(section_confidence(true, &long) <= 1.0);
    }

    #[test]
    fn line_ranges_track_source_lines() {
        let text = "1. First\nalpha\nbeta\n2. Second\ngamma";
        let segments = segment_text(text);
        assert_eq!(segments[0].line_start, 0);
        assert_eq!(segments[0].line_end, 2);
        assert_eq!(segments[1].line_start, 3);
        assert_eq!(segments[1].line_end, 4);
    }

    #[test]
    fn tables_become_segments_in_their_own_right() {
        let table = TableData::new(vec![
            vec!["Particulars".into(), "FY24".into()],
            vec!["Revenue".into(), "1,200".into()],
        ]);
        let segments = SegmentationEngine::new().segment("prose only", &[table]);

        assert_eq!(segments.len(), 2);
        let table_segment = &segments[1];
        assert_eq!(table_segment.kind, SegmentKind::Table);
        assert_eq!(table_segment.title, "Table 1");
        assert_eq!(table_segment.semantic_type, SemanticType::Table);
        assert!((table_segment.confidence - 0.95).abs() < f32::EPSILON);
        assert_eq!(table_segment.metadata.get("row_count").unwrap(), "2");
        assert_eq!(table_segment.metadata.get("col_count").unwrap(), "2");
    }

    #[test]
    fn unparseable_input_degrades_to_single_paragraph() {
        let segments = segment_text("\u{fffd}\u{fffd} binary noise \u{0007} without structure");
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].title, "Document Start");
        assert_eq!(segments[0].semantic_type, SemanticType::Paragraph);
        assert!((segments[0].confidence - 0.7).abs() < f32::EPSILON);
    }

    proptest! {
        /// Segmenting the same text twice produces structurally identical
        /// sequences.
        #[test]
        fn segmentation_is_idempotent(text in "[ -~\\n]{0,400}") {
            let first = segment_text(&text);
            let second = segment_text(&text);
            prop_assert_eq!(first, second);
        }

        /// Confidence always lands in [0, 1].
        #[test]
        fn confidence_is_bounded(text in "[ -~\\n]{0,400}") {
            for segment in segment_text(&text) {
                prop_assert!((0.0..=1.0).contains(&segment.confidence));
            }
        }
    }
}

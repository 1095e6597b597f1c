//! Header patterns and classification keywords.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Numbered headings like "3.", "1.2.", "4.1.3." followed by a title.
    pub static ref NUMBERED_HEADING: Regex =
        Regex::new(r"^((\d+\.)+)\s+(.+)$").expect("valid numbered heading regex");

    /// Roman-numeral headings like "IV. Liquidity".
    pub static ref ROMAN_HEADING: Regex =
        Regex::new(r"^([IVXLCDM]+)\.\s+(.+)$").expect("valid roman heading regex");
}

/// Keywords marking a section as financial data.
pub const FINANCIAL_KEYWORDS: &[&str] = &[
    "revenue",
    "profit",
    "loss",
    "assets",
    "liabilities",
    "equity",
    "cash flow",
];

/// Keywords marking a section as a note or footnote.
pub const NOTE_KEYWORDS: &[&str] = &["note", "footnote", "reference"];

/// Keywords marking an early section as introductory.
pub const INTRO_KEYWORDS: &[&str] = &["introduction", "overview", "summary"];

/// Case-insensitive check: does `text` (already lowercased) contain any of
/// the given keywords?
pub fn contains_any(text_lower: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|keyword| text_lower.contains(keyword))
}

//! Layout-aware table detection over extracted page text.
//!
//! Financial statements render tables as runs of lines whose cells are
//! separated by pipes or wide whitespace gutters. A run of two or more
//! consecutive multi-cell lines is treated as one table.

use lazy_static::lazy_static;
use regex::Regex;
use shared_types::TableData;
use tracing::debug;

lazy_static! {
    static ref CELL_GUTTER: Regex = Regex::new(r"\s{2,}|\t").expect("valid gutter regex");
}

/// Split a line into cells if it looks tabular (two or more cells).
fn split_cells(line: &str) -> Option<Vec<String>> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }

    let cells: Vec<String> = if trimmed.contains('|') {
        trimmed
            .split('|')
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect()
    } else {
        CELL_GUTTER
            .split(trimmed)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect()
    };

    if cells.len() >= 2 {
        Some(cells)
    } else {
        None
    }
}

/// Detect tables in plain text. Infallible by design: unstructured text
/// simply yields an empty list.
pub fn detect_tables(text: &str) -> Vec<TableData> {
    let mut tables = Vec::new();
    let mut current: Vec<Vec<String>> = Vec::new();

    for line in text.lines() {
        match split_cells(line) {
            Some(cells) => current.push(cells),
            None => {
                if current.len() >= 2 {
                    tables.push(TableData::new(std::mem::take(&mut current)));
                } else {
                    current.clear();
                }
            }
        }
    }
    if current.len() >= 2 {
        tables.push(TableData::new(current));
    }

    debug!(tables = tables.len(), "table detection complete");
    tables
}

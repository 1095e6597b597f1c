//! XLSX strategy: one table per worksheet plus a text rendering, no OCR.

use std::path::Path;

use lazy_static::lazy_static;
use regex::Regex;
use shared_types::{RawExtraction, TableData};
use tracing::info;

use crate::xml;
use crate::ExtractionError;

lazy_static! {
    static ref SHEET_NAME: Regex =
        Regex::new(r#"<sheet [^>]*?name="([^"]*)""#).expect("valid sheet regex");
    static ref SHARED_STRING: Regex = Regex::new(r"(?s)<si>(.*?)</si>").expect("valid si regex");
    static ref TEXT_EL: Regex = Regex::new(r"(?s)<t(?: [^>]*)?>(.*?)</t>").expect("valid t regex");
    static ref ROW: Regex = Regex::new(r"(?s)<row[ >].*?</row>").expect("valid row regex");
    static ref CELL: Regex =
        Regex::new(r"(?s)<c(?: [^>]*)?(?:/>|>.*?</c>)").expect("valid cell regex");
    static ref CELL_TYPE: Regex = Regex::new(r#"\bt="([^"]*)""#).expect("valid type regex");
    static ref VALUE_EL: Regex = Regex::new(r"(?s)<v>(.*?)</v>").expect("valid v regex");
    static ref SHEET_PART: Regex =
        Regex::new(r"^xl/worksheets/sheet(\d+)\.xml$").expect("valid part regex");
}

pub fn extract_xlsx(path: &Path) -> Result<RawExtraction, ExtractionError> {
    info!(path = %path.display(), "extracting xlsx");

    let workbook = xml::read_part(path, "xl/workbook.xml")?;
    let sheet_names: Vec<String> = SHEET_NAME
        .captures_iter(&workbook)
        .map(|cap| xml::unescape_entities(&cap[1]))
        .collect();

    let shared = xml::read_optional_part(path, "xl/sharedStrings.xml")
        .map(|part| parse_shared_strings(&part))
        .unwrap_or_default();

    // Worksheet parts are numbered; their order matches the workbook's
    // sheet list for files produced by mainstream writers.
    let mut sheet_parts: Vec<(u32, String)> = xml::list_parts(path)?
        .into_iter()
        .filter_map(|name| {
            let number = SHEET_PART.captures(&name)?.get(1)?.as_str().parse().ok()?;
            Some((number, name))
        })
        .collect();
    sheet_parts.sort_by_key(|(number, _)| *number);

    let mut result = RawExtraction::empty();
    let mut text_parts = Vec::new();

    for (i, (number, part)) in sheet_parts.iter().enumerate() {
        let sheet_xml = xml::read_part(path, part)?;
        let rows = parse_rows(&sheet_xml, &shared);

        let name = sheet_names
            .get(i)
            .cloned()
            .unwrap_or_else(|| format!("Sheet{number}"));

        text_parts.push(format!("Sheet: {name}"));
        for row in &rows {
            text_parts.push(row.join(" | "));
        }

        let mut table = TableData::new(rows);
        table.sheet = Some(name);
        result.tables.push(table);
    }

    result.text = text_parts.join("\n");
    result
        .metadata
        .insert("sheet_count".to_string(), sheet_parts.len().to_string());
    Ok(result)
}

fn parse_shared_strings(part: &str) -> Vec<String> {
    SHARED_STRING
        .captures_iter(part)
        .map(|cap| {
            TEXT_EL
                .captures_iter(&cap[1])
                .map(|t| xml::unescape_entities(&t[1]))
                .collect::<Vec<_>>()
                .join("")
        })
        .collect()
}

fn parse_rows(sheet_xml: &str, shared: &[String]) -> Vec<Vec<String>> {
    ROW.find_iter(sheet_xml)
        .map(|row| {
            CELL.find_iter(row.as_str())
                .map(|cell| cell_value(cell.as_str(), shared))
                .collect()
        })
        .collect()
}

fn cell_value(cell: &str, shared: &[String]) -> String {
    let cell_type = CELL_TYPE
        .captures(cell)
        .map(|cap| cap[1].to_string())
        .unwrap_or_default();

    match cell_type.as_str() {
        "s" => VALUE_EL
            .captures(cell)
            .and_then(|cap| cap[1].trim().parse::<usize>().ok())
            .and_then(|idx| shared.get(idx).cloned())
            .unwrap_or_default(),
        "inlineStr" => TEXT_EL
            .captures_iter(cell)
            .map(|t| xml::unescape_entities(&t[1]))
            .collect::<Vec<_>>()
            .join(""),
        _ => VALUE_EL
            .captures(cell)
            .map(|cap| xml::unescape_entities(cap[1].trim()))
            .unwrap_or_default(),
    }
}

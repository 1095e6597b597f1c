//! DOCX strategy: deterministic structural extraction, no OCR involved.

use std::collections::BTreeMap;
use std::path::Path;

use lazy_static::lazy_static;
use regex::Regex;
use shared_types::{RawExtraction, TableData};
use tracing::info;

use crate::xml;
use crate::ExtractionError;

lazy_static! {
    static ref TBL: Regex = Regex::new(r"(?s)<w:tbl[ >].*?</w:tbl>").expect("valid tbl regex");
    static ref ROW: Regex = Regex::new(r"(?s)<w:tr[ >].*?</w:tr>").expect("valid row regex");
    static ref CELL: Regex = Regex::new(r"(?s)<w:tc[ >].*?</w:tc>").expect("valid cell regex");
    static ref RUN_TEXT: Regex =
        Regex::new(r"(?s)<w:t(?: [^>]*)?>(.*?)</w:t>").expect("valid run regex");
    static ref CORE_PROP: Regex = Regex::new(
        r"(?s)<(dc:title|dc:creator|dcterms:created|dcterms:modified)(?: [^>]*)?>(.*?)</(?:dc:title|dc:creator|dcterms:created|dcterms:modified)>",
    )
    .expect("valid core property regex");
}

pub fn extract_docx(path: &Path) -> Result<RawExtraction, ExtractionError> {
    info!(path = %path.display(), "extracting docx");

    let body = xml::read_part(path, "word/document.xml")?;

    let mut result = RawExtraction::empty();
    result.tables = extract_tables(&body);

    // Strip table markup so cell text is not duplicated into paragraphs.
    let without_tables = TBL.replace_all(&body, "");
    result.text = extract_paragraphs(&without_tables).join("\n");

    if let Some(core) = xml::read_optional_part(path, "docProps/core.xml") {
        result.metadata = core_properties(&core);
    }

    Ok(result)
}

fn run_text(fragment: &str) -> String {
    RUN_TEXT
        .captures_iter(fragment)
        .map(|cap| xml::unescape_entities(&cap[1]))
        .collect::<Vec<_>>()
        .join("")
}

fn extract_paragraphs(body: &str) -> Vec<String> {
    body.split("</w:p>").map(run_text).collect()
}

fn extract_tables(body: &str) -> Vec<TableData> {
    TBL.find_iter(body)
        .map(|table| {
            let rows = ROW
                .find_iter(table.as_str())
                .map(|row| {
                    CELL.find_iter(row.as_str())
                        .map(|cell| run_text(cell.as_str()))
                        .collect::<Vec<String>>()
                })
                .collect();
            TableData::new(rows)
        })
        .collect()
}

fn core_properties(core: &str) -> BTreeMap<String, String> {
    let mut metadata = BTreeMap::new();
    for cap in CORE_PROP.captures_iter(core) {
        let key = match &cap[1] {
            "dc:title" => "title",
            "dc:creator" => "author",
            "dcterms:created" => "created",
            "dcterms:modified" => "modified",
            _ => continue,
        };
        let value = xml::unescape_entities(cap[2].trim());
        if !value.is_empty() {
            metadata.insert(key.to_string(), value);
        }
    }
    metadata
}

//! PDF strategy: text layer first, OCR fallback for scanned documents.

use std::collections::BTreeMap;
use std::path::Path;

use shared_types::RawExtraction;
use tracing::{info, warn};

use crate::ocr::{mean_confidence, OcrEngine};
use crate::tables;
use crate::{ExtractionConfig, ExtractionError};

pub async fn extract_pdf(
    path: &Path,
    ocr: &dyn OcrEngine,
    config: &ExtractionConfig,
) -> Result<RawExtraction, ExtractionError> {
    info!(path = %path.display(), "extracting pdf");

    let mut result = RawExtraction::empty();

    // Document properties and page count are best-effort; a damaged xref
    // must not block the OCR path.
    match lopdf::Document::load(path) {
        Ok(doc) => {
            result.page_count = Some(doc.get_pages().len() as u32);
            result.metadata = document_info(&doc);
        }
        Err(e) => warn!(error = %e, "pdf metadata read failed"),
    }

    // Digital text layer first: fast and high fidelity when present.
    match pdf_extract::extract_text(path) {
        Ok(text) if !text.trim().is_empty() => {
            result.text = text;
        }
        Ok(_) => {
            info!("no text layer found, attempting ocr");
            run_ocr_fallback(path, ocr, config, &mut result).await?;
        }
        Err(e) => {
            warn!(error = %e, "text layer extraction failed, attempting ocr");
            run_ocr_fallback(path, ocr, config, &mut result).await?;
        }
    }

    // Table detection runs regardless of which text path produced the text;
    // it is non-fatal by contract.
    result.tables = tables::detect_tables(&result.text);

    Ok(result)
}

async fn run_ocr_fallback(
    path: &Path,
    ocr: &dyn OcrEngine,
    config: &ExtractionConfig,
    result: &mut RawExtraction,
) -> Result<(), ExtractionError> {
    let pages = ocr
        .ocr_pdf(path, config.ocr_dpi, &config.ocr_language)
        .await?;

    result.text = pages
        .iter()
        .map(|p| p.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");
    result.ocr_used = true;
    result.ocr_confidence = Some(mean_confidence(&pages));

    if result.page_count.is_none() {
        result.page_count = Some(pages.len() as u32);
    }
    Ok(())
}

/// Read the trailer's Info dictionary into plain string metadata.
fn document_info(doc: &lopdf::Document) -> BTreeMap<String, String> {
    let mut metadata = BTreeMap::new();

    let info = doc
        .trailer
        .get(b"Info")
        .ok()
        .and_then(|obj| obj.as_reference().ok())
        .and_then(|id| doc.get_object(id).ok())
        .and_then(|obj| obj.as_dict().ok());

    if let Some(dict) = info {
        for key in [b"Title".as_slice(), b"Author", b"Subject", b"Creator", b"Producer"] {
            if let Ok(value) = dict.get(key) {
                if let Ok(bytes) = value.as_str() {
                    let text = String::from_utf8_lossy(bytes).trim().to_string();
                    if !text.is_empty() {
                        metadata.insert(
                            String::from_utf8_lossy(key).to_lowercase(),
                            text,
                        );
                    }
                }
            }
        }
    }

    metadata
}

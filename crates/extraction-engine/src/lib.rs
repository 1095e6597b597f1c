//! Multi-format document extraction with OCR fallback.
//!
//! Dispatches on file extension into one of four strategies (PDF, DOCX,
//! XLSX, image) and returns a single immutable [`RawExtraction`]. PDF
//! extraction tries the text layer first and falls back to OCR for scanned
//! documents; images always go through OCR. OCR itself is an external
//! service behind the [`OcrEngine`] trait.

pub mod docx;
pub mod image;
pub mod ocr;
pub mod pdf;
pub mod tables;
pub mod xlsx;
mod xml;

use std::path::Path;
use std::sync::Arc;

use shared_types::RawExtraction;
use tracing::{error, info};

pub use ocr::{HttpOcrClient, OcrConfig, OcrEngine, OcrPage};

/// Extraction failure taxonomy. `UnsupportedFormat` is fatal and surfaced to
/// the caller; everything else wraps the underlying I/O or library failure.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("unsupported file type: {0}")]
    UnsupportedFormat(String),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("pdf extraction failed: {0}")]
    Pdf(String),
    #[error("document parse failed: {0}")]
    Parse(String),
    #[error("ocr failed: {0}")]
    Ocr(String),
}

/// Knobs for the OCR fallback path.
#[derive(Debug, Clone)]
pub struct ExtractionConfig {
    /// Rasterization DPI for scanned PDF pages.
    pub ocr_dpi: u32,
    /// OCR language hint, e.g. "eng" or "eng+hin".
    pub ocr_language: String,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            ocr_dpi: 300,
            ocr_language: "eng".to_string(),
        }
    }
}

/// Format-dispatching extraction engine.
pub struct ExtractionEngine {
    ocr: Arc<dyn OcrEngine>,
    config: ExtractionConfig,
}

impl ExtractionEngine {
    pub fn new(ocr: Arc<dyn OcrEngine>, config: ExtractionConfig) -> Self {
        Self { ocr, config }
    }

    /// Extract content from a document based on its file extension.
    ///
    /// Reads only the source file; returns a fresh immutable structure.
    pub async fn extract(&self, path: &Path) -> Result<RawExtraction, ExtractionError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        let result = match ext.as_str() {
            "pdf" => pdf::extract_pdf(path, self.ocr.as_ref(), &self.config).await,
            "docx" => docx::extract_docx(path),
            "xlsx" => xlsx::extract_xlsx(path),
            "png" | "jpg" | "jpeg" => {
                image::extract_image(path, self.ocr.as_ref(), &self.config).await
            }
            _ => Err(ExtractionError::UnsupportedFormat(ext.clone())),
        };

        match &result {
            Ok(extraction) => info!(
                path = %path.display(),
                chars = extraction.text.len(),
                tables = extraction.tables.len(),
                ocr_used = extraction.ocr_used,
                "extraction complete"
            ),
            Err(e) => error!(path = %path.display(), error = %e, "extraction failed"),
        }

        result
    }
}

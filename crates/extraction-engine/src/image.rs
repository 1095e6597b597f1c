//! Image strategy: always OCR.

use std::path::Path;

use shared_types::RawExtraction;
use tracing::info;

use crate::ocr::{mean_confidence, OcrEngine};
use crate::{ExtractionConfig, ExtractionError};

pub async fn extract_image(
    path: &Path,
    ocr: &dyn OcrEngine,
    config: &ExtractionConfig,
) -> Result<RawExtraction, ExtractionError> {
    info!(path = %path.display(), "extracting image via ocr");

    let page = ocr.ocr_image(path, &config.ocr_language).await?;

    let mut result = RawExtraction::empty();
    result.ocr_used = true;
    result.ocr_confidence = Some(mean_confidence(std::slice::from_ref(&page)));
    result.text = page.text;

    if let Some(format) = path.extension().and_then(|e| e.to_str()) {
        result
            .metadata
            .insert("format".to_string(), format.to_ascii_lowercase());
    }

    Ok(result)
}

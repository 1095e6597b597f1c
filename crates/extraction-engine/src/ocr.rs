//! OCR provider seam.
//!
//! OCR is an external service with its own availability contract; the engine
//! only depends on the [`OcrEngine`] trait. [`HttpOcrClient`] talks to a
//! hosted recognition API over HTTP.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use crate::ExtractionError;

/// Recognized text for one page plus the engine's per-token confidences.
/// Engines report confidence on a 0-100 scale and use negative values
/// (conventionally -1) for tokens with no confidence available.
#[derive(Debug, Clone)]
pub struct OcrPage {
    pub text: String,
    pub token_confidences: Vec<f32>,
}

#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Rasterize each PDF page at `dpi` and recognize it, one result per page.
    async fn ocr_pdf(
        &self,
        path: &Path,
        dpi: u32,
        language: &str,
    ) -> Result<Vec<OcrPage>, ExtractionError>;

    /// Recognize a single image.
    async fn ocr_image(&self, path: &Path, language: &str) -> Result<OcrPage, ExtractionError>;
}

/// Mean per-token confidence across pages, excluding sentinel tokens
/// (negative confidence means "no confidence available"). Pages without any
/// scored token do not contribute; an empty distribution yields 0.
pub fn mean_confidence(pages: &[OcrPage]) -> f32 {
    let mut page_means = Vec::with_capacity(pages.len());

    for page in pages {
        let scored: Vec<f32> = page
            .token_confidences
            .iter()
            .copied()
            .filter(|c| *c >= 0.0)
            .collect();
        if !scored.is_empty() {
            page_means.push(scored.iter().sum::<f32>() / scored.len() as f32);
        }
    }

    if page_means.is_empty() {
        0.0
    } else {
        page_means.iter().sum::<f32>() / page_means.len() as f32
    }
}

/// Configuration for the hosted OCR client.
#[derive(Debug, Clone)]
pub struct OcrConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout_ms: u64,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8600".to_string(),
            api_key: None,
            timeout_ms: 120_000,
        }
    }
}

#[derive(Debug, Deserialize)]
struct OcrPagePayload {
    text: String,
    #[serde(default)]
    confidences: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct OcrResponse {
    pages: Vec<OcrPagePayload>,
}

/// Client for an HTTP OCR service exposing `/ocr/pdf` and `/ocr/image`.
pub struct HttpOcrClient {
    client: reqwest::Client,
    config: OcrConfig,
}

impl HttpOcrClient {
    pub fn new(config: OcrConfig) -> Result<Self, ExtractionError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| ExtractionError::Ocr(format!("client init failed: {e}")))?;
        Ok(Self { client, config })
    }

    async fn post_bytes(
        &self,
        endpoint: &str,
        bytes: Vec<u8>,
        query: &[(&str, String)],
    ) -> Result<OcrResponse, ExtractionError> {
        let url = format!("{}/{}", self.config.base_url.trim_end_matches('/'), endpoint);
        debug!(url = %url, bytes = bytes.len(), "submitting ocr request");

        let mut request = self
            .client
            .post(&url)
            .query(query)
            .header("content-type", "application/octet-stream")
            .body(bytes);

        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ExtractionError::Ocr(format!("request failed: {e}")))?
            .error_for_status()
            .map_err(|e| ExtractionError::Ocr(format!("service error: {e}")))?;

        response
            .json::<OcrResponse>()
            .await
            .map_err(|e| ExtractionError::Ocr(format!("malformed response: {e}")))
    }
}

#[async_trait]
impl OcrEngine for HttpOcrClient {
    async fn ocr_pdf(
        &self,
        path: &Path,
        dpi: u32,
        language: &str,
    ) -> Result<Vec<OcrPage>, ExtractionError> {
        info!(path = %path.display(), dpi, language, "performing ocr on pdf");
        let bytes = std::fs::read(path)?;
        let response = self
            .post_bytes(
                "ocr/pdf",
                bytes,
                &[("dpi", dpi.to_string()), ("lang", language.to_string())],
            )
            .await?;

        Ok(response
            .pages
            .into_iter()
            .map(|p| OcrPage {
                text: p.text,
                token_confidences: p.confidences,
            })
            .collect())
    }

    async fn ocr_image(&self, path: &Path, language: &str) -> Result<OcrPage, ExtractionError> {
        info!(path = %path.display(), language, "performing ocr on image");
        let bytes = std::fs::read(path)?;
        let mut response = self
            .post_bytes("ocr/image", bytes, &[("lang", language.to_string())])
            .await?;

        if response.pages.is_empty() {
            return Err(ExtractionError::Ocr("empty ocr response".to_string()));
        }
        let page = response.pages.remove(0);
        Ok(OcrPage {
            text: page.text,
            token_confidences: page.confidences,
        })
    }
}

//! Pipeline configuration.
//!
//! Every external service endpoint is environment-driven with local
//! defaults, so a development setup needs no configuration at all.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use compliance_engine::{ComplianceEngine, OpenAiCompatibleProvider, ProviderConfig, RuleLoader};
use extraction_engine::{ExtractionConfig, ExtractionEngine, HttpOcrClient, OcrConfig};
use retrieval_index::{EmbeddingConfig, HttpEmbedder, InMemoryVectorStore, RetrievalIndex};
use segmentation_engine::SegmentationEngine;

use crate::chat::ChatService;
use crate::CompliancePipeline;

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Top-level configuration for the whole pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Directory holding `<framework>_rules.json` catalogs.
    pub rules_dir: PathBuf,
    pub ocr: OcrConfig,
    pub extraction: ExtractionConfig,
    pub embeddings: EmbeddingConfig,
    pub llm: ProviderConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            rules_dir: PathBuf::from("./rules"),
            ocr: OcrConfig::default(),
            extraction: ExtractionConfig::default(),
            embeddings: EmbeddingConfig::default(),
            llm: ProviderConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from environment variables.
    ///
    /// Expected variables (all optional):
    /// - COMPLIANCE_RULES_DIR: rule catalog directory (default "./rules")
    /// - OCR_ENDPOINT, OCR_API_KEY, OCR_DPI, OCR_LANGUAGE
    /// - EMBEDDINGS_ENDPOINT, EMBEDDINGS_API_KEY, EMBEDDINGS_MODEL
    /// - LLM_ENDPOINT, LLM_API_KEY, LLM_MODEL
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let ocr = OcrConfig {
            base_url: env_or("OCR_ENDPOINT", &defaults.ocr.base_url),
            api_key: std::env::var("OCR_API_KEY").ok(),
            ..defaults.ocr
        };
        let extraction = ExtractionConfig {
            ocr_dpi: std::env::var("OCR_DPI")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.extraction.ocr_dpi),
            ocr_language: env_or("OCR_LANGUAGE", &defaults.extraction.ocr_language),
        };
        let embeddings = EmbeddingConfig {
            base_url: env_or("EMBEDDINGS_ENDPOINT", &defaults.embeddings.base_url),
            api_key: std::env::var("EMBEDDINGS_API_KEY").ok(),
            model: env_or("EMBEDDINGS_MODEL", &defaults.embeddings.model),
        };
        let llm = ProviderConfig {
            base_url: env_or("LLM_ENDPOINT", &defaults.llm.base_url),
            api_key: std::env::var("LLM_API_KEY").ok(),
            model: env_or("LLM_MODEL", &defaults.llm.model),
            ..defaults.llm
        };

        Self {
            rules_dir: PathBuf::from(env_or("COMPLIANCE_RULES_DIR", "./rules")),
            ocr,
            extraction,
            embeddings,
            llm,
        }
    }

    /// Wire up the full pipeline against hosted OCR, embeddings and LLM
    /// services, with the in-process vector store.
    pub fn build(&self) -> Result<CompliancePipeline> {
        let ocr = Arc::new(HttpOcrClient::new(self.ocr.clone())?);
        let extraction = ExtractionEngine::new(ocr, self.extraction.clone());

        let index = RetrievalIndex::new(
            Arc::new(HttpEmbedder::new(self.embeddings.clone())),
            Arc::new(InMemoryVectorStore::new()),
        );

        let provider = Arc::new(OpenAiCompatibleProvider::new(self.llm.clone())?);
        let rules = Arc::new(RuleLoader::new(self.rules_dir.clone()));
        let compliance = ComplianceEngine::new(provider.clone(), rules);

        Ok(CompliancePipeline::new(
            extraction,
            SegmentationEngine::new(),
            index,
            compliance,
            ChatService::new(provider),
        ))
    }
}

//! End-to-end document compliance pipeline.
//!
//! Extraction -> segmentation -> indexing feed a processed document into
//! rule validation and retrieval-grounded chat. The pipeline owns the run
//! registry and the background job queue; engines stay independent and are
//! wired together here.

pub mod chat;
pub mod config;
pub mod jobs;
pub mod runs;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use compliance_engine::ComplianceEngine;
use extraction_engine::{ExtractionEngine, ExtractionError};
use retrieval_index::{IndexError, RetrievalIndex, SearchHit};
use segmentation_engine::SegmentationEngine;
use shared_types::{ComplianceSummary, Framework, RawExtraction, Segment, ValidationRun};
use tracing::info;
use uuid::Uuid;

pub use chat::{ChatError, ChatMessage, ChatService};
pub use config::PipelineConfig;
pub use jobs::{JobId, JobQueue, JobRecord, JobStatus};
pub use runs::ValidationRunStore;

/// Install the global tracing subscriber, honoring `RUST_LOG`. Call once
/// at startup; later calls are no-ops.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
    #[error(transparent)]
    Index(#[from] IndexError),
    #[error(transparent)]
    Chat(#[from] ChatError),
}

/// Everything the pipeline derived from one source file.
#[derive(Debug, Clone)]
pub struct ProcessedDocument {
    pub document_id: i64,
    pub extraction: RawExtraction,
    pub segments: Vec<Segment>,
    /// Vectors written to the retrieval index.
    pub indexed: usize,
}

pub struct CompliancePipeline {
    extraction: ExtractionEngine,
    segmentation: SegmentationEngine,
    index: RetrievalIndex,
    compliance: ComplianceEngine,
    chat: ChatService,
    runs: ValidationRunStore,
    jobs: JobQueue,
}

impl CompliancePipeline {
    pub fn new(
        extraction: ExtractionEngine,
        segmentation: SegmentationEngine,
        index: RetrievalIndex,
        compliance: ComplianceEngine,
        chat: ChatService,
    ) -> Self {
        Self {
            extraction,
            segmentation,
            index,
            compliance,
            chat,
            runs: ValidationRunStore::new(),
            jobs: JobQueue::new(),
        }
    }

    /// Extract, segment and index one document. Reprocessing replaces the
    /// document's vectors in the index.
    pub async fn process_document(
        &self,
        document_id: i64,
        path: &Path,
    ) -> Result<ProcessedDocument, PipelineError> {
        info!(document_id, path = %path.display(), "processing document");

        let extraction = self.extraction.extract(path).await?;
        let segments = self.segmentation.segment(&extraction.text, &extraction.tables);

        self.index.remove_document(document_id).await?;
        let indexed = self.index.index_document(document_id, &segments).await?;

        info!(document_id, segments = segments.len(), indexed, "document processed");
        Ok(ProcessedDocument {
            document_id,
            extraction,
            segments,
            indexed,
        })
    }

    /// Validate a processed document against a framework and record the
    /// run. Validation never fails; unreachable rules surface as pending
    /// results inside the run.
    pub async fn validate(
        &self,
        document: &ProcessedDocument,
        framework: Framework,
    ) -> ValidationRun {
        let results = self
            .compliance
            .validate(&document.segments, framework, &document.extraction.text)
            .await;
        self.runs
            .record(document.document_id, framework, results)
            .await
    }

    /// Extract, segment and index in the background.
    pub async fn submit_processing(self: &Arc<Self>, document_id: i64, path: PathBuf) -> JobId {
        let pipeline = Arc::clone(self);
        self.jobs
            .submit(&format!("process document {document_id}"), async move {
                pipeline.process_document(document_id, &path).await?;
                Ok(())
            })
            .await
    }

    /// Process and validate in the background; poll the returned job id
    /// and then fetch the run through [`CompliancePipeline::runs`].
    pub async fn submit_validation(
        self: &Arc<Self>,
        document_id: i64,
        path: PathBuf,
        framework: Framework,
    ) -> JobId {
        let pipeline = Arc::clone(self);
        self.jobs
            .submit(&format!("validate document {document_id}"), async move {
                let document = pipeline.process_document(document_id, &path).await?;
                pipeline.validate(&document, framework).await;
                Ok(())
            })
            .await
    }

    pub async fn search(
        &self,
        query: &str,
        n_results: usize,
        document_id: Option<i64>,
    ) -> Result<Vec<SearchHit>, PipelineError> {
        Ok(self.index.search(query, n_results, document_id).await?)
    }

    pub async fn ask(
        &self,
        session_id: &str,
        document_id: Option<i64>,
        question: &str,
    ) -> Result<String, PipelineError> {
        Ok(self
            .chat
            .ask(&self.index, session_id, document_id, question)
            .await?)
    }

    pub async fn run_summary(&self, run_id: Uuid) -> Option<ComplianceSummary> {
        self.runs.summary(run_id).await
    }

    /// Frameworks with a rule catalog present on disk.
    pub fn available_frameworks(&self) -> Vec<Framework> {
        self.compliance.rule_loader().available_frameworks()
    }

    /// Drop cached rule catalogs so edited files take effect.
    pub fn invalidate_rules(&self) {
        self.compliance.rule_loader().invalidate();
    }

    pub fn runs(&self) -> &ValidationRunStore {
        &self.runs
    }

    pub fn jobs(&self) -> &JobQueue {
        &self.jobs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use compliance_engine::{ChatProvider, RuleLoader, ValidationCallError};
    use extraction_engine::ocr::{OcrEngine, OcrPage};
    use extraction_engine::ExtractionConfig;
    use pretty_assertions::assert_eq;
    use retrieval_index::{Embedder, InMemoryVectorStore};
    use shared_types::ComplianceStatus;
    use std::time::Duration;

    struct NoOcr;

    #[async_trait]
    impl OcrEngine for NoOcr {
        async fn ocr_pdf(
            &self,
            _path: &Path,
            _dpi: u32,
            _language: &str,
        ) -> Result<Vec<OcrPage>, ExtractionError> {
            Err(ExtractionError::Ocr("no ocr in tests".to_string()))
        }

        async fn ocr_image(
            &self,
            _path: &Path,
            _language: &str,
        ) -> Result<OcrPage, ExtractionError> {
            Err(ExtractionError::Ocr("no ocr in tests".to_string()))
        }
    }

    struct FlatEmbedder;

    #[async_trait]
    impl Embedder for FlatEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, IndexError> {
            Ok(texts.iter().map(|_| vec![1.0]).collect())
        }
    }

    /// Always answers the batch call with one compliant verdict per rule id
    /// named in the prompt's catalog.
    struct CompliantProvider;

    #[async_trait]
    impl ChatProvider for CompliantProvider {
        async fn chat(
            &self,
            _system: &str,
            _user: &str,
            _prefer_json: bool,
        ) -> Result<String, ValidationCallError> {
            Ok(r#"[{"rule_id": "R1", "status": "compliant", "confidence": 0.9}]"#.to_string())
        }
    }

    fn pipeline_with_rules(dir: &Path) -> Arc<CompliancePipeline> {
        let provider: Arc<dyn ChatProvider> = Arc::new(CompliantProvider);
        Arc::new(CompliancePipeline::new(
            ExtractionEngine::new(Arc::new(NoOcr), ExtractionConfig::default()),
            SegmentationEngine::new(),
            RetrievalIndex::new(Arc::new(FlatEmbedder), Arc::new(InMemoryVectorStore::new())),
            ComplianceEngine::new(provider.clone(), Arc::new(RuleLoader::new(dir))),
            ChatService::new(provider),
        ))
    }

    fn sample_document() -> ProcessedDocument {
        let segmentation = SegmentationEngine::new();
        let text = "1. BALANCE SHEET\nTotal assets grew to 500 crore.\n";
        ProcessedDocument {
            document_id: 42,
            extraction: RawExtraction {
                text: text.to_string(),
                ..RawExtraction::empty()
            },
            segments: segmentation.segment(text, &[]),
            indexed: 0,
        }
    }

    fn write_catalog(dir: &Path) {
        std::fs::write(
            dir.join("ind_as_rules.json"),
            r#"[{"id": "R1", "name": "Balance sheet", "description": "d"}]"#,
        )
        .unwrap();
    }

    #[tokio::test]
    async fn validate_records_an_inspectable_run() {
        let dir = tempfile::tempdir().unwrap();
        write_catalog(dir.path());
        let pipeline = pipeline_with_rules(dir.path());

        let document = sample_document();
        let run = pipeline.validate(&document, Framework::IndAs).await;

        assert_eq!(run.document_id, 42);
        assert_eq!(run.results.len(), 1);
        assert_eq!(run.results[0].status, ComplianceStatus::Compliant);

        let summary = pipeline.run_summary(run.id).await.unwrap();
        assert_eq!(summary.compliance_score, 100.0);
        assert_eq!(pipeline.runs().for_document(42).await.len(), 1);
    }

    #[tokio::test]
    async fn background_validation_fails_cleanly_on_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        write_catalog(dir.path());
        let pipeline = pipeline_with_rules(dir.path());

        let job = pipeline
            .submit_validation(7, PathBuf::from("/nonexistent/report.pdf"), Framework::IndAs)
            .await;

        for _ in 0..100 {
            if pipeline.jobs().is_finished(job).await {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let record = pipeline.jobs().get(job).await.unwrap();
        assert!(matches!(record.status, JobStatus::Failed(_)));
        assert!(pipeline.runs().for_document(7).await.is_empty());
    }

    #[tokio::test]
    async fn framework_discovery_reflects_catalog_files() {
        let dir = tempfile::tempdir().unwrap();
        write_catalog(dir.path());
        let pipeline = pipeline_with_rules(dir.path());

        assert_eq!(pipeline.available_frameworks(), vec![Framework::IndAs]);

        std::fs::write(dir.path().join("sebi_rules.json"), "[]").unwrap();
        pipeline.invalidate_rules();
        assert_eq!(
            pipeline.available_frameworks(),
            vec![Framework::IndAs, Framework::Sebi]
        );
    }
}

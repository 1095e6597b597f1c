//! Validation run registry.
//!
//! Runs are append-only: re-validating a document opens a new run instead
//! of overwriting earlier results, so findings can be compared across
//! catalog revisions. Summaries are derived on read, never stored.

use chrono::Utc;
use compliance_engine::summarize;
use shared_types::{ComplianceSummary, Framework, ValidationResult, ValidationRun};
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

#[derive(Default)]
pub struct ValidationRunStore {
    runs: RwLock<Vec<ValidationRun>>,
}

impl ValidationRunStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record(
        &self,
        document_id: i64,
        framework: Framework,
        results: Vec<ValidationResult>,
    ) -> ValidationRun {
        let run = ValidationRun {
            id: Uuid::new_v4(),
            document_id,
            framework,
            started_at: Utc::now(),
            results,
        };
        info!(run_id = %run.id, document_id, framework = framework.as_str(),
              results = run.results.len(), "recording validation run");
        self.runs.write().await.push(run.clone());
        run
    }

    pub async fn get(&self, run_id: Uuid) -> Option<ValidationRun> {
        self.runs.read().await.iter().find(|r| r.id == run_id).cloned()
    }

    /// All runs for a document, oldest first.
    pub async fn for_document(&self, document_id: i64) -> Vec<ValidationRun> {
        self.runs
            .read()
            .await
            .iter()
            .filter(|r| r.document_id == document_id)
            .cloned()
            .collect()
    }

    /// Most recent run for a document under one framework.
    pub async fn latest(&self, document_id: i64, framework: Framework) -> Option<ValidationRun> {
        self.runs
            .read()
            .await
            .iter()
            .rev()
            .find(|r| r.document_id == document_id && r.framework == framework)
            .cloned()
    }

    pub async fn summary(&self, run_id: Uuid) -> Option<ComplianceSummary> {
        self.get(run_id).await.map(|run| summarize(&run.results))
    }
}

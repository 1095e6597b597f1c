//! Rule validation against regulatory frameworks.
//!
//! The engine loads a framework's rule catalog, asks a chat model to judge
//! every rule in one batch call, and degrades gracefully: a failed batch
//! falls back to per-rule calls, and a failed per-rule call yields a
//! pending result. Validation never errors; every rule in the catalog gets
//! exactly one result, in catalog order.

mod batch;
mod fallback;
pub mod provider;
pub mod report;
pub mod rule_loader;

use std::sync::Arc;

use shared_types::{Framework, Segment, ValidationResult};
use tracing::{info, warn};

pub use provider::{ChatProvider, OpenAiCompatibleProvider, ProviderConfig, ValidationCallError};
pub use report::summarize;
pub use rule_loader::RuleLoader;

pub struct ComplianceEngine {
    provider: Arc<dyn ChatProvider>,
    rules: Arc<RuleLoader>,
}

impl ComplianceEngine {
    pub fn new(provider: Arc<dyn ChatProvider>, rules: Arc<RuleLoader>) -> Self {
        Self { provider, rules }
    }

    pub fn rule_loader(&self) -> &Arc<RuleLoader> {
        &self.rules
    }

    /// Validate a document against every rule of a framework.
    ///
    /// Returns one result per catalog rule, in catalog order. An empty
    /// catalog yields an empty result set.
    pub async fn validate(
        &self,
        segments: &[Segment],
        framework: Framework,
        document_text: &str,
    ) -> Vec<ValidationResult> {
        let rules = self.rules.load(framework);
        if rules.is_empty() {
            warn!(framework = framework.as_str(), "no rules loaded, nothing to validate");
            return Vec::new();
        }
        info!(
            framework = framework.as_str(),
            rules = rules.len(),
            segments = segments.len(),
            "validating document"
        );

        match self.validate_batch(&rules, document_text).await {
            Ok(results) => results,
            Err(e) => {
                warn!(%e, "batch validation failed, falling back to per-rule calls");
                self.validate_per_rule(&rules, segments).await
            }
        }
    }

    async fn validate_batch(
        &self,
        rules: &[shared_types::Rule],
        document_text: &str,
    ) -> Result<Vec<ValidationResult>, ValidationCallError> {
        let prompt = batch::build_batch_prompt(rules, document_text);
        let response = self
            .provider
            .chat(batch::SYSTEM_PROMPT, &prompt, true)
            .await?;

        let array = batch::extract_json_array(&response).ok_or_else(|| {
            ValidationCallError::MalformedResponse("no JSON array in response".to_string())
        })?;
        let verdicts: Vec<batch::BatchVerdict> = serde_json::from_str(array)
            .map_err(|e| ValidationCallError::MalformedResponse(e.to_string()))?;

        Ok(batch::map_batch_results(rules, verdicts))
    }

    async fn validate_per_rule(
        &self,
        rules: &[shared_types::Rule],
        segments: &[Segment],
    ) -> Vec<ValidationResult> {
        let mut results = Vec::with_capacity(rules.len());
        for rule in rules {
            results.push(fallback::validate_rule(self.provider.as_ref(), rule, segments).await);
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use shared_types::{ComplianceStatus, SegmentKind, SemanticType, Severity};
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    /// Scripted provider: one canned answer for the batch call and one for
    /// every per-rule call, either of which can be an error.
    struct ScriptedProvider {
        batch: Result<String, String>,
        per_rule: Result<String, String>,
        calls: Mutex<Vec<bool>>,
    }

    impl ScriptedProvider {
        fn new(batch: Result<&str, &str>, per_rule: Result<&str, &str>) -> Self {
            Self {
                batch: batch.map(String::from).map_err(String::from),
                per_rule: per_rule.map(String::from).map_err(String::from),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ChatProvider for ScriptedProvider {
        async fn chat(
            &self,
            _system: &str,
            _user: &str,
            prefer_json: bool,
        ) -> Result<String, ValidationCallError> {
            self.calls.lock().unwrap().push(prefer_json);
            let script = if prefer_json { &self.batch } else { &self.per_rule };
            script
                .clone()
                .map_err(ValidationCallError::Service)
        }
    }

    const CATALOG: &str = r#"[
        {"id": "R1", "name": "Balance sheet", "description": "d",
         "keywords": ["balance sheet"], "severity": "critical"},
        {"id": "R2", "name": "Cash flow", "description": "d",
         "keywords": ["cash flow"], "severity": "high"}
    ]"#;

    fn engine_with(provider: ScriptedProvider) -> (tempfile::TempDir, ComplianceEngine) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ind_as_rules.json"), CATALOG).unwrap();
        let loader = Arc::new(RuleLoader::new(dir.path()));
        (dir, ComplianceEngine::new(Arc::new(provider), loader))
    }

    fn segment(title: &str, content: &str) -> Segment {
        Segment {
            kind: SegmentKind::Header,
            level: 1,
            title: title.to_string(),
            content: content.to_string(),
            line_start: 0,
            line_end: 0,
            semantic_type: SemanticType::Paragraph,
            confidence: 0.7,
            metadata: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn batch_path_returns_one_result_per_rule_in_order() {
        let provider = ScriptedProvider::new(
            Ok(r#"[
                {"rule_id": "R2", "status": "non_compliant", "severity": "high",
                 "confidence": 0.9, "finding_summary": "no cash flow statement"},
                {"rule_id": "R1", "status": "compliant", "confidence": 0.95}
            ]"#),
            Ok("unused"),
        );
        let (_dir, engine) = engine_with(provider);

        let results = engine.validate(&[], Framework::IndAs, "document text").await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].rule_id, "R1");
        assert_eq!(results[0].status, ComplianceStatus::Compliant);
        assert_eq!(results[1].rule_id, "R2");
        assert_eq!(results[1].status, ComplianceStatus::NonCompliant);
    }

    #[tokio::test]
    async fn partial_batch_answer_leaves_missing_rules_pending() {
        let provider = ScriptedProvider::new(
            Ok(r#"[{"rule_id": "R1", "status": "compliant"}]"#),
            Ok("unused"),
        );
        let (_dir, engine) = engine_with(provider);

        let results = engine.validate(&[], Framework::IndAs, "text").await;
        assert_eq!(results[0].status, ComplianceStatus::Compliant);
        assert_eq!(results[1].status, ComplianceStatus::Pending);
        assert_eq!(results[1].confidence_score, 0.0);
        assert_eq!(results[1].finding_summary, "Validation pending");
    }

    #[tokio::test]
    async fn batch_failure_falls_back_to_per_rule_calls() {
        let provider = ScriptedProvider::new(
            Err("model overloaded"),
            Ok("NON_COMPLIANT. Severity HIGH. The cash flow statement is absent."),
        );
        let (_dir, engine) = engine_with(provider);

        let segments = vec![segment("CASH FLOW", "operating activities")];
        let results = engine.validate(&segments, Framework::IndAs, "text").await;

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].rule_id, "R1");
        assert_eq!(results[0].status, ComplianceStatus::NonCompliant);
        assert_eq!(results[1].affected_sections, vec!["CASH FLOW".to_string()]);
        assert_eq!(results[1].severity, Severity::High);
    }

    #[tokio::test]
    async fn unparseable_batch_response_also_falls_back() {
        let provider = Arc::new(ScriptedProvider::new(
            Ok("I cannot help with that."),
            Ok("COMPLIANT. All statements present."),
        ));
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ind_as_rules.json"), CATALOG).unwrap();
        let engine = ComplianceEngine::new(
            provider.clone(),
            Arc::new(RuleLoader::new(dir.path())),
        );

        let results = engine.validate(&[], Framework::IndAs, "text").await;
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.status == ComplianceStatus::Compliant));

        // batch attempted once, then one per-rule call each
        assert_eq!(*provider.calls.lock().unwrap(), vec![true, false, false]);
    }

    #[tokio::test]
    async fn per_rule_provider_failure_yields_pending_with_error() {
        let provider = ScriptedProvider::new(Err("down"), Err("still down"));
        let (_dir, engine) = engine_with(provider);

        let results = engine.validate(&[], Framework::IndAs, "text").await;
        assert_eq!(results.len(), 2);
        for result in &results {
            assert_eq!(result.status, ComplianceStatus::Pending);
            assert!(result.finding_summary.starts_with("Validation failed:"));
        }
    }

    #[tokio::test]
    async fn empty_catalog_yields_empty_results() {
        let dir = tempfile::tempdir().unwrap();
        let loader = Arc::new(RuleLoader::new(dir.path()));
        let provider = ScriptedProvider::new(Ok("[]"), Ok(""));
        let engine = ComplianceEngine::new(Arc::new(provider), loader);

        let results = engine.validate(&[], Framework::Sebi, "text").await;
        assert!(results.is_empty());
    }
}

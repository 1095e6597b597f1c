//! Rule catalog loading.
//!
//! One JSON file per framework at `<rules_dir>/<framework>_rules.json`,
//! each holding an array of rule definitions. Files are parsed once and
//! cached; [`RuleLoader::invalidate`] drops the cache so edited catalogs
//! are picked up without a restart.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use serde::Deserialize;
use shared_types::{Framework, Rule, Severity};
use tracing::{error, info, warn};

/// On-disk rule shape. The framework is implied by the file name, not
/// repeated per rule.
#[derive(Debug, Deserialize)]
struct RuleSpec {
    id: String,
    name: String,
    description: String,
    #[serde(default)]
    requirements: Vec<String>,
    #[serde(default)]
    keywords: Vec<String>,
    #[serde(default = "default_severity")]
    severity: Severity,
}

fn default_severity() -> Severity {
    Severity::Medium
}

pub struct RuleLoader {
    rules_dir: PathBuf,
    cache: RwLock<HashMap<Framework, Arc<Vec<Rule>>>>,
}

impl RuleLoader {
    pub fn new(rules_dir: impl Into<PathBuf>) -> Self {
        Self {
            rules_dir: rules_dir.into(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    fn rules_path(&self, framework: Framework) -> PathBuf {
        self.rules_dir
            .join(format!("{}_rules.json", framework.as_str()))
    }

    /// Load the rule catalog for a framework.
    ///
    /// A missing or unreadable file yields an empty catalog and is not
    /// cached, so a catalog dropped in later is found on the next call.
    /// A present-but-corrupt file also yields an empty catalog; validation
    /// against zero rules produces an empty report rather than an error.
    pub fn load(&self, framework: Framework) -> Arc<Vec<Rule>> {
        if let Some(rules) = self.cache.read().ok().and_then(|c| c.get(&framework).cloned()) {
            return rules;
        }

        let path = self.rules_path(framework);
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(framework = framework.as_str(), path = %path.display(), %e, "rule catalog not readable");
                return Arc::new(Vec::new());
            }
        };

        let specs: Vec<RuleSpec> = match serde_json::from_str(&raw) {
            Ok(specs) => specs,
            Err(e) => {
                error!(framework = framework.as_str(), path = %path.display(), %e, "rule catalog is corrupt");
                return Arc::new(Vec::new());
            }
        };

        let rules: Arc<Vec<Rule>> = Arc::new(
            specs
                .into_iter()
                .map(|spec| Rule {
                    id: spec.id,
                    name: spec.name,
                    description: spec.description,
                    requirements: spec.requirements,
                    keywords: spec.keywords,
                    severity_default: spec.severity,
                    framework,
                })
                .collect(),
        );
        info!(framework = framework.as_str(), rules = rules.len(), "loaded rule catalog");

        if let Ok(mut cache) = self.cache.write() {
            cache.insert(framework, rules.clone());
        }
        rules
    }

    pub fn rule_by_id(&self, framework: Framework, rule_id: &str) -> Option<Rule> {
        self.load(framework).iter().find(|r| r.id == rule_id).cloned()
    }

    /// Frameworks whose catalog file exists on disk.
    pub fn available_frameworks(&self) -> Vec<Framework> {
        Framework::all()
            .iter()
            .copied()
            .filter(|f| self.rules_path(*f).is_file())
            .collect()
    }

    /// Drop every cached catalog so the next load re-reads the files.
    pub fn invalidate(&self) {
        if let Ok(mut cache) = self.cache.write() {
            cache.clear();
        }
        info!("rule cache invalidated");
    }
}

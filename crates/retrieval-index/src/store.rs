//! Vector store seam and the in-process reference implementation.

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::IndexError;

/// Metadata stored alongside each vector, used for equality filtering.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SegmentMeta {
    pub document_id: i64,
    pub segment_index: usize,
    pub kind: String,
    pub title: String,
    pub semantic_type: String,
}

/// One stored vector with its content and metadata.
#[derive(Debug, Clone)]
pub struct VectorRecord {
    pub id: String,
    pub content: String,
    pub metadata: SegmentMeta,
    pub embedding: Vec<f32>,
}

/// A nearest-neighbor match, ranked by ascending distance.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub id: String,
    pub content: String,
    pub metadata: SegmentMeta,
    pub distance: f32,
}

/// Pluggable vector store: add-by-id with metadata, nearest-neighbor query
/// filtered by metadata equality, delete-by-document.
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn add(&self, records: Vec<VectorRecord>) -> Result<(), IndexError>;

    async fn query(
        &self,
        embedding: &[f32],
        n_results: usize,
        document_id: Option<i64>,
    ) -> Result<Vec<SearchHit>, IndexError>;

    async fn delete_document(&self, document_id: i64) -> Result<usize, IndexError>;

    async fn count(&self) -> Result<usize, IndexError>;
}

/// Cosine distance (1 - cosine similarity); orthogonal or degenerate
/// vectors land at distance 1.
fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    1.0 - dot / (norm_a * norm_b)
}

/// In-process store over an RwLock'd entry list. Suitable for single-node
/// deployments and tests; production setups swap in a hosted store behind
/// the same trait.
pub struct InMemoryVectorStore {
    entries: RwLock<Vec<VectorRecord>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn add(&self, records: Vec<VectorRecord>) -> Result<(), IndexError> {
        let mut entries = self.entries.write().await;
        debug!(added = records.len(), total = entries.len() + records.len(), "adding vectors");
        entries.extend(records);
        Ok(())
    }

    async fn query(
        &self,
        embedding: &[f32],
        n_results: usize,
        document_id: Option<i64>,
    ) -> Result<Vec<SearchHit>, IndexError> {
        let entries = self.entries.read().await;

        let mut hits: Vec<SearchHit> = entries
            .iter()
            .filter(|record| match document_id {
                Some(id) => record.metadata.document_id == id,
                None => true,
            })
            .map(|record| SearchHit {
                id: record.id.clone(),
                content: record.content.clone(),
                metadata: record.metadata.clone(),
                distance: cosine_distance(embedding, &record.embedding),
            })
            .collect();

        hits.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(n_results);
        Ok(hits)
    }

    async fn delete_document(&self, document_id: i64) -> Result<usize, IndexError> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|record| record.metadata.document_id != document_id);
        Ok(before - entries.len())
    }

    async fn count(&self) -> Result<usize, IndexError> {
        Ok(self.entries.read().await.len())
    }
}

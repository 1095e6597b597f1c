//! Vectorized segment retrieval.
//!
//! Embeds segment content through a pluggable [`Embedder`], stores the
//! vectors in a pluggable [`VectorStore`] keyed by synthetic segment ids,
//! and answers nearest-neighbor queries optionally filtered to a single
//! document.

pub mod embedder;
pub mod store;

use std::sync::Arc;

use shared_types::Segment;
use tracing::info;

pub use embedder::{Embedder, EmbeddingConfig, HttpEmbedder};
pub use store::{InMemoryVectorStore, SearchHit, SegmentMeta, VectorRecord, VectorStore};

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("embedding failed: {0}")]
    Embedding(String),
    #[error("vector store failed: {0}")]
    Store(String),
}

/// Retrieval index over segmented documents.
pub struct RetrievalIndex {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
}

impl RetrievalIndex {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn VectorStore>) -> Self {
        Self { embedder, store }
    }

    /// Embed and store every segment of a document under ids of the form
    /// `doc_{document_id}_seg_{i}`.
    ///
    /// Re-indexing the same document does not remove prior vectors; callers
    /// wanting replacement must call [`RetrievalIndex::remove_document`]
    /// first.
    pub async fn index_document(
        &self,
        document_id: i64,
        segments: &[Segment],
    ) -> Result<usize, IndexError> {
        info!(document_id, segments = segments.len(), "indexing document");

        if segments.is_empty() {
            return Ok(0);
        }

        let texts: Vec<String> = segments.iter().map(|s| s.content.clone()).collect();
        let embeddings = self.embedder.embed(&texts).await?;

        let records: Vec<VectorRecord> = segments
            .iter()
            .zip(embeddings)
            .enumerate()
            .map(|(i, (segment, embedding))| VectorRecord {
                id: format!("doc_{document_id}_seg_{i}"),
                content: segment.content.clone(),
                metadata: SegmentMeta {
                    document_id,
                    segment_index: i,
                    kind: segment.kind.as_str().to_string(),
                    title: segment.title.clone(),
                    semantic_type: segment.semantic_type.as_str().to_string(),
                },
                embedding,
            })
            .collect();

        let count = records.len();
        self.store.add(records).await?;

        info!(document_id, count, "document indexed");
        Ok(count)
    }

    /// Nearest-neighbor search, ranked by ascending vector distance,
    /// optionally pre-filtered to one document.
    pub async fn search(
        &self,
        query: &str,
        n_results: usize,
        document_id: Option<i64>,
    ) -> Result<Vec<SearchHit>, IndexError> {
        info!(query, n_results, ?document_id, "searching index");

        let mut embeddings = self.embedder.embed(&[query.to_string()]).await?;
        if embeddings.is_empty() {
            return Err(IndexError::Embedding("empty embedding response".into()));
        }
        let query_embedding = embeddings.remove(0);

        let hits = self
            .store
            .query(&query_embedding, n_results, document_id)
            .await?;

        info!(hits = hits.len(), "search complete");
        Ok(hits)
    }

    /// Delete every vector belonging to a document. Exposed as a side
    /// operation for callers that want replace-on-reindex semantics.
    pub async fn remove_document(&self, document_id: i64) -> Result<usize, IndexError> {
        let removed = self.store.delete_document(document_id).await?;
        info!(document_id, removed, "removed document vectors");
        Ok(removed)
    }
}

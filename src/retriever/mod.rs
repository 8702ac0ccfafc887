// Query-time retrieval: embeds the question with the same model used at
// ingestion and resolves the nearest vector slots back to Documents.

use std::sync::Arc;

use tracing::debug;

use crate::embeddings::Embedder;
use crate::index::{ScoredDocument, VectorIndex};
use crate::{FloatError, Result};

/// Read-only view over a fully-built index. Safe to share across
/// concurrent queries; nothing here mutates the index.
pub struct Retriever {
    index: Arc<VectorIndex>,
    embedder: Arc<dyn Embedder>,
    nprobe: usize,
}

impl Retriever {
    /// Fails fast when the configured embedding model or dimension does
    /// not match what the index was built with, instead of silently
    /// degrading relevance.
    #[inline]
    pub fn new(
        index: Arc<VectorIndex>,
        embedder: Arc<dyn Embedder>,
        dimension: usize,
        nprobe: usize,
    ) -> Result<Self> {
        index.validate_model(embedder.model_id(), dimension)?;
        Ok(Self {
            index,
            embedder,
            nprobe,
        })
    }

    /// Return the `k` nearest documents to the query string, nearest
    /// first. A corpus smaller than `k` yields all available documents.
    #[inline]
    pub fn retrieve(&self, query: &str, k: usize) -> Result<Vec<ScoredDocument>> {
        let vectors = self.embedder.embed(&[query.to_string()])?;
        let vector = vectors.into_iter().next().ok_or_else(|| {
            FloatError::Retrieval("embedding model returned no vector for the query".to_string())
        })?;

        let results = self.index.search(&vector, k, self.nprobe)?;
        debug!(
            "Retrieved {} documents for query (k = {})",
            results.len(),
            k
        );
        Ok(results)
    }

    #[inline]
    pub fn index(&self) -> &VectorIndex {
        &self.index
    }
}

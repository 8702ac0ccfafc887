// Embedding generation: maps flattened record text to fixed-dimension
// vectors by calling the embedding model in fixed-size batches.


use indicatif::ProgressBar;
use tracing::{debug, info};

use crate::{FloatError, Result};

/// Seam to the embedding model. The model is treated as a deterministic,
/// stateless function from text to a fixed-length vector; the same
/// implementation must be used at ingestion and query time.
pub trait Embedder: Send + Sync {
    /// Embed one batch of texts, returning one vector per text in order.
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Identifier of the underlying model. Stored in the index bundle
    /// metadata and validated again at query time.
    fn model_id(&self) -> &str;
}

/// Drives an [`Embedder`] over an ordered text sequence in fixed-size
/// batches, enforcing the declared dimension on every returned vector.
pub struct EmbeddingGenerator<'a> {
    embedder: &'a dyn Embedder,
    batch_size: usize,
    dimension: usize,
}

impl<'a> EmbeddingGenerator<'a> {
    #[inline]
    pub fn new(embedder: &'a dyn Embedder, batch_size: usize, dimension: usize) -> Self {
        Self {
            embedder,
            batch_size: batch_size.max(1),
            dimension,
        }
    }

    /// Produce one vector per text, in input order. Any dimension or count
    /// mismatch from the model is a fatal ingestion error: no partial
    /// result is returned.
    #[inline]
    pub fn generate(
        &self,
        texts: &[String],
        progress: Option<&ProgressBar>,
    ) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(
            "Embedding {} texts in batches of {}",
            texts.len(),
            self.batch_size
        );

        let mut vectors = Vec::with_capacity(texts.len());

        for batch in texts.chunks(self.batch_size) {
            let batch_vectors = self.embedder.embed(batch)?;

            if batch_vectors.len() != batch.len() {
                return Err(FloatError::Ingestion(format!(
                    "embedding model returned {} vectors for a batch of {}",
                    batch_vectors.len(),
                    batch.len()
                )));
            }

            for vector in &batch_vectors {
                if vector.len() != self.dimension {
                    return Err(FloatError::Ingestion(format!(
                        "embedding dimension mismatch: expected {}, got {}",
                        self.dimension,
                        vector.len()
                    )));
                }
            }

            if let Some(bar) = progress {
                bar.inc(batch.len() as u64);
            }

            vectors.extend(batch_vectors);
        }

        info!("Generated {} embeddings", vectors.len());
        Ok(vectors)
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }
}

//! Embedding provider abstraction.
//!
//! `EmbeddingPort` is the narrow capability interface the orchestrator calls
//! through; the real model lives outside this crate. Grounded in the
//! teacher's `EmbeddingModel` trait (`embeddings/mod.rs`), widened with
//! `model_id()` and a typed error instead of `anyhow::Result`.

pub mod local;

use crate::error::EmbeddingError;
use async_trait::async_trait;

#[async_trait]
pub trait EmbeddingPort: Send + Sync {
    /// Embed a single query string.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Embed a batch of document texts. Implementations should batch
    /// internally where the backing provider supports it; the default
    /// falls back to one call per text.
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed_query(text).await?);
        }
        Ok(out)
    }

    /// Fixed output dimension. All vectors from this provider must match.
    fn dimensions(&self) -> usize;

    /// Identifier recorded into `ChunkLineage::embedding_model`.
    fn model_id(&self) -> &str;
}

//! Deterministic reference embedder.
//!
//! Not a quality embedding model — it hashes tokens into a fixed-width
//! vector so tests and default wiring get dimension- and batch-contract
//! correctness without a real model dependency. Stands in for the external
//! embedding provider the orchestrator normally talks to.

use super::EmbeddingPort;
use crate::error::EmbeddingError;
use async_trait::async_trait;

pub struct DeterministicEmbedder {
    dimensions: usize,
}

impl DeterministicEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

impl Default for DeterministicEmbedder {
    fn default() -> Self {
        Self::new(384)
    }
}

#[async_trait]
impl EmbeddingPort for DeterministicEmbedder {
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::invalid("cannot embed empty text"));
        }
        Ok(hash_embed(text, self.dimensions))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_id(&self) -> &str {
        "deterministic-hash-v1"
    }
}

/// Token-hash bag-of-words vector, L2-normalized so cosine similarity
/// behaves sensibly for tests that exercise dense search end-to-end.
fn hash_embed(text: &str, dimensions: usize) -> Vec<f32> {
    let mut v = vec![0f32; dimensions];
    for token in text.to_lowercase().split_whitespace() {
        let mut hash: u64 = 1469598103934665603; // FNV offset basis
        for b in token.bytes() {
            hash ^= b as u64;
            hash = hash.wrapping_mul(1099511628211); // FNV prime
        }
        let idx = (hash as usize) % dimensions;
        v[idx] += 1.0;
    }
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
    v
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn produces_declared_dimension() {
        let e = DeterministicEmbedder::new(128);
        let v = e.embed_query("hello world").await.unwrap();
        assert_eq!(v.len(), 128);
    }

    #[tokio::test]
    async fn same_text_is_deterministic() {
        let e = DeterministicEmbedder::default();
        let a = e.embed_query("the quick brown fox").await.unwrap();
        let b = e.embed_query("the quick brown fox").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn empty_text_is_invalid() {
        let e = DeterministicEmbedder::default();
        let err = e.embed_query("   ").await.unwrap_err();
        assert!(err.kind == crate::error::EmbeddingErrorKind::Invalid);
    }
}

//! Re-ranking: MMR diversity, recency decay, importance weighting, and
//! optional LLM re-scoring, composed behind a single `RerankStrategy`.
//!
//! Each non-LLM strategy module emits `{chunk, originalScore,
//! rerankedScore, rank}` (spec.md §4.6) via the shared `Candidate` type;
//! `hybrid` composes them in the fixed order MMR → recency → importance →
//! (optional) LLM on the top 10, and never returns more than `top_k` items.

pub mod importance;
pub mod llm_rerank;
pub mod mmr;
pub mod recency;

use crate::types::Candidate;
use chrono::{DateTime, Utc};
use llm_rerank::LlmRerankProvider;
use std::collections::HashSet;

/// Tagged variant replacing spec.md's dynamic `"mmr" | "recency" | ...`
/// strategy strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RerankStrategy {
    Mmr,
    Recency,
    Importance,
    Llm,
    Hybrid,
}

#[derive(Debug, Clone, Copy)]
pub struct RerankWeights {
    pub diversity_weight: f32,
    pub recency_weight: f32,
    pub importance_weight: f32,
}

const LLM_RESCORE_TOP_N: usize = 10;

/// Applies one non-LLM strategy, or the full hybrid pipeline. The LLM
/// strategy on its own and the LLM stage of `hybrid` both require a
/// provider; callers without one should route to `Hybrid` and simply not
/// pass an LLM provider, or call the non-LLM strategies directly.
pub fn rerank(strategy: RerankStrategy, candidates: Vec<Candidate>, weights: RerankWeights, top_k: usize, now: DateTime<Utc>) -> Vec<Candidate> {
    match strategy {
        RerankStrategy::Mmr => mmr::rerank(candidates, weights.diversity_weight, top_k),
        RerankStrategy::Recency => truncate(recency::rerank(candidates, weights.recency_weight, now), top_k),
        RerankStrategy::Importance => truncate(importance::rerank(candidates, weights.importance_weight), top_k),
        RerankStrategy::Llm => truncate(candidates, top_k),
        RerankStrategy::Hybrid => hybrid_non_llm(candidates, weights, top_k, now),
    }
}

/// MMR → recency → importance, capped at `top_k`. Does not include the LLM
/// stage — callers with a provider should follow this with
/// `rerank_with_llm`.
pub fn hybrid_non_llm(candidates: Vec<Candidate>, weights: RerankWeights, top_k: usize, now: DateTime<Utc>) -> Vec<Candidate> {
    let after_mmr = mmr::rerank(candidates, weights.diversity_weight, top_k);
    let after_recency = recency::rerank(after_mmr, weights.recency_weight, now);
    importance::rerank(after_recency, weights.importance_weight)
}

/// Runs the LLM re-score stage over the top `LLM_RESCORE_TOP_N` of an
/// already-ranked list, per spec.md's hybrid strategy. Re-sorts and
/// re-assigns ranks after blending; never exceeds the input length.
pub async fn rerank_with_llm(provider: &dyn LlmRerankProvider, query: &str, mut candidates: Vec<Candidate>) -> Vec<Candidate> {
    let split = candidates.len().min(LLM_RESCORE_TOP_N);
    let tail = candidates.split_off(split);
    let mut head = llm_rerank::rerank(provider, query, candidates).await;
    head.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    head.extend(tail);
    for (rank, c) in head.iter_mut().enumerate() {
        c.rank = rank as u32 + 1;
    }
    head
}

fn truncate(mut candidates: Vec<Candidate>, top_k: usize) -> Vec<Candidate> {
    candidates.truncate(top_k);
    candidates
}

fn tokenize_words(text: &str) -> HashSet<String> {
    text.to_lowercase().split_whitespace().map(|s| s.to_string()).collect()
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f32 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count() as f32;
    let union = a.union(b).count() as f32;
    if union == 0.0 {
        0.0
    } else {
        intersection / union
    }
}

/// Orchestrator diversity pass (spec.md §4.10 step 4, independent of
/// `RerankStrategy::Mmr`): greedily keeps each candidate in rank order
/// unless its word-set Jaccard similarity with an already-kept candidate
/// exceeds `threshold` (0.7 by default). Ambiguity noted in spec.md §9:
/// this cutoff is fixed, not scaled by `diversity_weight`.
pub fn diversity_filter(candidates: Vec<Candidate>, threshold: f32) -> Vec<Candidate> {
    let mut kept: Vec<Candidate> = Vec::with_capacity(candidates.len());
    let mut kept_tokens: Vec<HashSet<String>> = Vec::with_capacity(candidates.len());

    for candidate in candidates {
        let tokens = tokenize_words(&candidate.chunk.content);
        let too_similar = kept_tokens.iter().any(|k| jaccard(&tokens, k) > threshold);
        if !too_similar {
            kept_tokens.push(tokens);
            kept.push(candidate);
        }
    }

    for (rank, c) in kept.iter_mut().enumerate() {
        c.rank = rank as u32 + 1;
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Chunk, ChunkMetadata};
    use uuid::Uuid;

    fn candidate(text: &str, score: f32) -> Candidate {
        Candidate::new(
            Chunk {
                id: Uuid::new_v4(),
                document_id: Uuid::new_v4(),
                chunk_index: 0,
                content: text.into(),
                metadata: ChunkMetadata::default(),
                embedding: vec![],
            },
            score,
        )
    }

    #[test]
    fn diversity_filter_drops_near_duplicates() {
        let candidates = vec![
            candidate("the quick brown fox jumps over", 0.9),
            candidate("the quick brown fox leaps over", 0.85),
            candidate("completely unrelated astronomy text", 0.5),
        ];
        let out = diversity_filter(candidates, 0.7);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn diversity_filter_ranks_are_contiguous() {
        let candidates = vec![candidate("a b c", 0.9), candidate("d e f", 0.8), candidate("g h i", 0.7)];
        let out = diversity_filter(candidates, 0.7);
        let ranks: Vec<u32> = out.iter().map(|c| c.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3]);
    }

    #[test]
    fn hybrid_never_exceeds_top_k() {
        let candidates: Vec<Candidate> = (0..20).map(|i| candidate(&format!("chunk number {}", i), 1.0 - i as f32 * 0.01)).collect();
        let weights = RerankWeights { diversity_weight: 0.2, recency_weight: 0.1, importance_weight: 0.1 };
        let out = hybrid_non_llm(candidates, weights, 5, Utc::now());
        assert!(out.len() <= 5);
    }
}

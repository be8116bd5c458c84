//! Maximal Marginal Relevance diversity re-ranking.
//!
//! Generalizes the teacher's `RAGEngine::apply_mmr_diversity` (a flat
//! doc-id repeat penalty) into proper Jaccard-distance MMR over token sets,
//! with token sets cached per candidate so the greedy selection is
//! `O(K*N)` total comparisons rather than re-tokenizing on every step.

use crate::types::Candidate;
use std::collections::HashSet;

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

/// Greedy MMR selection: `mmr = lambda * relevance - (1 - lambda) * max(jaccard(c, selected))`,
/// `lambda = 1 - diversity_weight`. Assumes `candidates` is already sorted by
/// relevance; with `diversity_weight == 0` the output order is unchanged.
pub fn rerank(candidates: Vec<Candidate>, diversity_weight: f32, top_k: usize) -> Vec<Candidate> {
    if candidates.is_empty() {
        return candidates;
    }
    let lambda = 1.0 - diversity_weight;
    let token_sets: Vec<HashSet<String>> = candidates.iter().map(|c| tokenize_words(&c.chunk.content)).collect();

    let mut remaining: Vec<usize> = (0..candidates.len()).collect();
    let mut selected: Vec<usize> = Vec::with_capacity(top_k.min(candidates.len()));

    while selected.len() < top_k && !remaining.is_empty() {
        let mut best_pos = 0usize;
        let mut best_mmr = f32::MIN;

        for (pos, &idx) in remaining.iter().enumerate() {
            let relevance = candidates[idx].score;
            let max_jaccard =
                selected.iter().map(|&s| jaccard(&token_sets[idx], &token_sets[s])).fold(0.0f32, f32::max);
            let mmr = lambda * relevance - (1.0 - lambda) * max_jaccard;
            if mmr > best_mmr {
                best_mmr = mmr;
                best_pos = pos;
            }
        }

        selected.push(remaining.remove(best_pos));
    }

    let mut result: Vec<Candidate> = selected.into_iter().map(|i| candidates[i].clone()).collect();
    for (rank, c) in result.iter_mut().enumerate() {
        c.rank = rank as u32 + 1;
    }
    result
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
    fn zero_diversity_weight_preserves_relevance_order() {
        let candidates = vec![candidate("alpha beta", 0.9), candidate("gamma delta", 0.6), candidate("epsilon zeta", 0.3)];
        let out = mmr_rerank_sorted(candidates, 0.0, 3);
        let scores: Vec<f32> = out.iter().map(|c| c.original_score).collect();
        assert_eq!(scores, vec![0.9, 0.6, 0.3]);
    }

    #[test]
    fn diversifies_near_duplicates() {
        let mut candidates = vec![
            candidate("the cat sat on the mat", 0.95),
            candidate("the cat sat on a mat", 0.94),
            candidate("the cat sat on the rug", 0.93),
            candidate("the cat sat upon the mat", 0.92),
            candidate("quantum entanglement in superconductors", 0.50),
        ];
        candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap());
        let out = rerank(candidates, 0.5, 2);
        assert_eq!(out.len(), 2);
        assert!(out.iter().any(|c| c.chunk.content.contains("quantum")));
    }

    fn mmr_rerank_sorted(candidates: Vec<Candidate>, diversity_weight: f32, top_k: usize) -> Vec<Candidate> {
        rerank(candidates, diversity_weight, top_k)
    }
}

//! Importance-weighted re-ranking: blends relevance with a per-chunk
//! editorial importance score, defaulting to neutral when absent.

use crate::types::Candidate;

const DEFAULT_IMPORTANCE: f32 = 0.5;

/// `score' = score * (1 - weight) + importance * weight`.
pub fn rerank(mut candidates: Vec<Candidate>, weight: f32) -> Vec<Candidate> {
    for candidate in &mut candidates {
        let importance = candidate.chunk.metadata.importance.unwrap_or(DEFAULT_IMPORTANCE);
        candidate.score = candidate.score * (1.0 - weight) + importance * weight;
    }
    candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    for (rank, c) in candidates.iter_mut().enumerate() {
        c.rank = rank as u32 + 1;
    }
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Chunk, ChunkMetadata};
    use uuid::Uuid;

    fn candidate(score: f32, importance: Option<f32>) -> Candidate {
        Candidate::new(
            Chunk {
                id: Uuid::new_v4(),
                document_id: Uuid::new_v4(),
                chunk_index: 0,
                content: "x".into(),
                metadata: ChunkMetadata { filename: "f".into(), timestamp: None, importance },
                embedding: vec![],
            },
            score,
        )
    }

    #[test]
    fn missing_importance_defaults_to_neutral() {
        let candidates = vec![candidate(0.4, None)];
        let out = rerank(candidates, 1.0);
        assert!((out[0].score - DEFAULT_IMPORTANCE).abs() < 1e-6);
    }

    #[test]
    fn high_importance_boosts_score() {
        let candidates = vec![candidate(0.2, Some(1.0))];
        let out = rerank(candidates, 0.5);
        assert!((out[0].score - 0.6).abs() < 1e-6);
    }
}

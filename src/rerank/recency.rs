//! Recency-weighted re-ranking: blends relevance with exponential time
//! decay so fresher chunks surface higher when `recency_weight > 0`.

use crate::types::Candidate;
use chrono::{DateTime, Utc};

const DECAY_DAYS: f64 = 30.0;

/// `recency = exp(-age / 30d)` when a timestamp is present, else 0;
/// `score' = score * (1 - weight) + recency * weight`.
pub fn rerank(mut candidates: Vec<Candidate>, weight: f32, now: DateTime<Utc>) -> Vec<Candidate> {
    for candidate in &mut candidates {
        let recency = match candidate.chunk.metadata.timestamp {
            Some(ts) => {
                let age_days = (now - ts).num_seconds() as f64 / 86_400.0;
                (-age_days.max(0.0) / DECAY_DAYS).exp() as f32
            }
            None => 0.0,
        };
        candidate.score = candidate.score * (1.0 - weight) + recency * weight;
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
    use chrono::Duration;
    use uuid::Uuid;

    fn candidate(score: f32, timestamp: Option<DateTime<Utc>>) -> Candidate {
        Candidate::new(
            Chunk {
                id: Uuid::new_v4(),
                document_id: Uuid::new_v4(),
                chunk_index: 0,
                content: "x".into(),
                metadata: ChunkMetadata { filename: "f".into(), timestamp, importance: None },
                embedding: vec![],
            },
            score,
        )
    }

    #[test]
    fn zero_weight_leaves_scores_unchanged() {
        let now = Utc::now();
        let candidates = vec![candidate(0.5, Some(now - Duration::days(100)))];
        let out = rerank(candidates, 0.0, now);
        assert!((out[0].score - 0.5).abs() < 1e-6);
    }

    #[test]
    fn missing_timestamp_gets_zero_recency() {
        let now = Utc::now();
        let candidates = vec![candidate(0.5, None)];
        let out = rerank(candidates, 1.0, now);
        assert!((out[0].score - 0.0).abs() < 1e-6);
    }

    #[test]
    fn fresher_chunk_outranks_older_at_equal_relevance() {
        let now = Utc::now();
        let candidates = vec![candidate(0.5, Some(now - Duration::days(60))), candidate(0.5, Some(now))];
        let out = rerank(candidates, 0.8, now);
        assert!(out[0].chunk.metadata.timestamp.unwrap() > out[1].chunk.metadata.timestamp.unwrap());
    }
}

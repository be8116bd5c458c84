//! Hybrid fusion of dense and sparse rankings.
//!
//! Both modes are grounded in the teacher's `search/hybrid.rs`
//! (`weighted_fusion`, `reciprocal_rank_fusion`); this module keeps the RRF
//! body as-is and adapts the weighted mode to the exact inclusion/drop rule:
//! a chunk present only in the sparse list is always kept, but a chunk with
//! a nonzero dense score below the semantic threshold is dropped even if
//! the sparse side would otherwise keep it afloat.

use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// One document's fused score and 1-based rank, assigned after sorting.
#[derive(Debug, Clone)]
pub struct FusedResult {
    pub chunk_id: Uuid,
    pub score: f32,
    pub rank: u32,
}

fn normalize_by_max(results: &[(Uuid, f32)]) -> HashMap<Uuid, f32> {
    let max = results.iter().map(|(_, s)| *s).fold(0.0f32, f32::max);
    if max <= 0.0 {
        return results.iter().map(|(id, _)| (*id, 0.0)).collect();
    }
    results.iter().map(|(id, s)| (*id, s / max)).collect()
}

/// Weighted-sum fusion: normalize each ranking by its own max score, then
/// blend `w_sem * norm(dense) + w_kw * norm(bm25)`. `dense == 0 && bm25 > 0`
/// is always included; `0 < dense < semantic_threshold` is dropped even if
/// the sparse side scores it.
pub fn weighted_fusion(
    dense: &[(Uuid, f32)],
    bm25: &[(Uuid, f32)],
    w_sem: f32,
    w_kw: f32,
    semantic_threshold: f32,
) -> Vec<FusedResult> {
    let dense_map: HashMap<Uuid, f32> = dense.iter().cloned().collect();
    let bm25_map: HashMap<Uuid, f32> = bm25.iter().cloned().collect();
    let dense_norm = normalize_by_max(dense);
    let bm25_norm = normalize_by_max(bm25);

    let union: HashSet<Uuid> = dense_map.keys().chain(bm25_map.keys()).copied().collect();

    let mut fused: Vec<FusedResult> = union
        .into_iter()
        .filter_map(|id| {
            let d = dense_map.get(&id).copied().unwrap_or(0.0);
            let b = bm25_map.get(&id).copied().unwrap_or(0.0);

            let include = if d == 0.0 && b > 0.0 {
                true
            } else if d > 0.0 && d < semantic_threshold {
                false
            } else {
                true
            };
            if !include {
                return None;
            }

            let score = w_sem * dense_norm.get(&id).copied().unwrap_or(0.0)
                + w_kw * bm25_norm.get(&id).copied().unwrap_or(0.0);
            Some(FusedResult { chunk_id: id, score, rank: 0 })
        })
        .collect();

    fused.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    for (i, item) in fused.iter_mut().enumerate() {
        item.rank = i as u32 + 1;
    }
    fused
}

/// Reciprocal Rank Fusion: `fused(d) = sum 1/(k + rank_i(d))`, orderings
/// taken from each input list. Scores here are fusion scores, not
/// normalized component scores.
pub fn reciprocal_rank_fusion(dense: &[(Uuid, f32)], bm25: &[(Uuid, f32)], k: usize) -> Vec<FusedResult> {
    let mut scores: HashMap<Uuid, f32> = HashMap::new();

    for (rank, (id, _)) in dense.iter().enumerate() {
        *scores.entry(*id).or_insert(0.0) += 1.0 / (k as f32 + rank as f32 + 1.0);
    }
    for (rank, (id, _)) in bm25.iter().enumerate() {
        *scores.entry(*id).or_insert(0.0) += 1.0 / (k as f32 + rank as f32 + 1.0);
    }

    let mut fused: Vec<FusedResult> =
        scores.into_iter().map(|(chunk_id, score)| FusedResult { chunk_id, score, rank: 0 }).collect();
    fused.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    for (i, item) in fused.iter_mut().enumerate() {
        item.rank = i as u32 + 1;
    }
    fused
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sparse_only_hit_is_kept() {
        let id = Uuid::new_v4();
        let dense = vec![];
        let bm25 = vec![(id, 3.0)];
        let fused = weighted_fusion(&dense, &bm25, 0.7, 0.3, 0.25);
        assert_eq!(fused.len(), 1);
        assert_eq!(fused[0].chunk_id, id);
    }

    #[test]
    fn below_threshold_dense_hit_is_dropped() {
        let id = Uuid::new_v4();
        let other = Uuid::new_v4();
        let dense = vec![(id, 0.1), (other, 1.0)];
        let bm25 = vec![(id, 5.0)];
        let fused = weighted_fusion(&dense, &bm25, 0.7, 0.3, 0.25);
        assert!(fused.iter().all(|f| f.chunk_id != id));
    }

    #[test]
    fn ranks_are_contiguous_from_one() {
        let ids: Vec<Uuid> = (0..5).map(|_| Uuid::new_v4()).collect();
        let dense: Vec<(Uuid, f32)> = ids.iter().enumerate().map(|(i, id)| (*id, (5 - i) as f32)).collect();
        let fused = weighted_fusion(&dense, &[], 0.7, 0.3, 0.0);
        let mut ranks: Vec<u32> = fused.iter().map(|f| f.rank).collect();
        ranks.sort();
        assert_eq!(ranks, (1..=5).collect::<Vec<_>>());
    }

    #[test]
    fn rrf_uses_fixed_k() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let dense = vec![(a, 0.9), (b, 0.8)];
        let bm25 = vec![(b, 5.0), (a, 1.0)];
        let fused = reciprocal_rank_fusion(&dense, &bm25, 60);
        // both appear in both lists at opposite ranks, so scores tie.
        assert!((fused[0].score - fused[1].score).abs() < 1e-9);
    }
}

//! Dense search: cosine similarity over the storage port, scoped to a user.
//!
//! Mirrors the teacher's `LanceStore::vector_search` call shape (query
//! vector, top-k, filter) but scopes by `userId` rather than a Lance SQL
//! predicate string, since the on-disk ANN index itself is a non-goal here.

use crate::error::SearchError;
use crate::storage::StoragePort;

/// Returns `(chunk_id, score)` pairs at or above `threshold`, already
/// truncated to `top_k` and sorted descending — the storage port owns the
/// scan and the cutoff.
pub async fn search(
    storage: &dyn StoragePort,
    query_vector: &[f32],
    user_id: Option<&str>,
    top_k: usize,
    threshold: f32,
) -> Result<Vec<(uuid::Uuid, f32)>, SearchError> {
    let hits = storage
        .search_vectors(query_vector, user_id, top_k, threshold)
        .await
        .map_err(SearchError)?;
    Ok(hits.into_iter().map(|h| (h.chunk_id, h.score)).collect())
}

//! In-process reference `StoragePort`: brute-force cosine scan over
//! `parking_lot::RwLock`-guarded vectors/maps. The in-process analogue of
//! the teacher's `LanceStore` + `TextSearch` pair, minus the on-disk ANN
//! index (an explicit non-goal — this scans every chunk per query).

use super::{SearchHit, StoragePort};
use crate::error::StorageError;
use crate::types::{Chunk, ChunkLineage, Document, HourlyMetrics, RetrievalResultRecord, TraceEvent};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rayon::prelude::*;
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Default)]
pub struct InMemoryStore {
    documents: RwLock<HashMap<Uuid, Document>>,
    chunks: RwLock<HashMap<Uuid, Chunk>>,
    lineage: RwLock<HashMap<Uuid, ChunkLineage>>,
    traces: RwLock<Vec<TraceEvent>>,
    retrieval_results: RwLock<Vec<RetrievalResultRecord>>,
    hourly_metrics: RwLock<HashMap<DateTime<Utc>, HourlyMetrics>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn owner_of(&self, chunk: &Chunk) -> Option<String> {
        self.documents.read().get(&chunk.document_id).and_then(|d| d.user_id.clone())
    }

    fn visible_to(&self, chunk: &Chunk, user_id: Option<&str>) -> bool {
        self.owner_of(chunk).as_deref() == user_id
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na * nb)
    }
}

#[async_trait]
impl StoragePort for InMemoryStore {
    async fn create_document(&self, document: &Document) -> Result<(), StorageError> {
        self.documents.write().insert(document.id, document.clone());
        Ok(())
    }

    async fn get_document(&self, id: Uuid) -> Result<Option<Document>, StorageError> {
        Ok(self.documents.read().get(&id).cloned())
    }

    async fn upsert_chunks(&self, chunks: &[Chunk]) -> Result<(), StorageError> {
        let mut guard = self.chunks.write();
        for chunk in chunks {
            guard.insert(chunk.id, chunk.clone());
        }
        Ok(())
    }

    async fn search_vectors(
        &self,
        query_vector: &[f32],
        user_id: Option<&str>,
        top_k: usize,
        threshold: f32,
    ) -> Result<Vec<SearchHit>, StorageError> {
        let guard = self.chunks.read();
        let pool: Vec<&Chunk> = guard.values().filter(|c| self.visible_to(c, user_id)).collect();
        let mut hits: Vec<SearchHit> = pool
            .par_iter()
            .map(|c| SearchHit { chunk_id: c.id, score: cosine(query_vector, &c.embedding) })
            .filter(|h| h.score >= threshold)
            .collect();
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn list_chunks(&self, user_id: Option<&str>) -> Result<Vec<Chunk>, StorageError> {
        Ok(self
            .chunks
            .read()
            .values()
            .filter(|c| self.visible_to(c, user_id))
            .cloned()
            .collect())
    }

    async fn get_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Chunk>, StorageError> {
        let guard = self.chunks.read();
        Ok(ids.iter().filter_map(|id| guard.get(id).cloned()).collect())
    }

    async fn get_neighbors(&self, chunk_id: Uuid, window: u32) -> Result<Vec<Chunk>, StorageError> {
        let guard = self.chunks.read();
        let Some(center) = guard.get(&chunk_id) else { return Ok(Vec::new()) };
        let lo = center.chunk_index.saturating_sub(window);
        let hi = center.chunk_index + window;
        let mut neighbors: Vec<Chunk> = guard
            .values()
            .filter(|c| {
                c.document_id == center.document_id
                    && c.id != chunk_id
                    && c.chunk_index >= lo
                    && c.chunk_index <= hi
            })
            .cloned()
            .collect();
        neighbors.sort_by_key(|c| c.chunk_index);
        Ok(neighbors)
    }

    async fn create_chunk_lineage(&self, lineage: &ChunkLineage) -> Result<(), StorageError> {
        let mut guard = self.lineage.write();
        if guard.contains_key(&lineage.chunk_id) {
            return Err(StorageError::constraint(format!(
                "lineage already exists for chunk {}",
                lineage.chunk_id
            )));
        }
        guard.insert(lineage.chunk_id, lineage.clone());
        Ok(())
    }

    async fn get_chunk_lineage(&self, chunk_id: Uuid) -> Result<Option<ChunkLineage>, StorageError> {
        Ok(self.lineage.read().get(&chunk_id).cloned())
    }

    async fn update_chunk_lineage_usage(
        &self,
        chunk_id: Uuid,
        score: f32,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let mut guard = self.lineage.write();
        match guard.get_mut(&chunk_id) {
            Some(lineage) => {
                lineage.record_retrieval(score, at);
                Ok(())
            }
            None => Err(StorageError::constraint(format!("no lineage for chunk {}", chunk_id))),
        }
    }

    async fn create_rag_traces(&self, batch: &[TraceEvent]) -> Result<(), StorageError> {
        self.traces.write().extend_from_slice(batch);
        Ok(())
    }

    async fn get_rag_traces_by_trace_id(&self, trace_id: &str) -> Result<Vec<TraceEvent>, StorageError> {
        let mut events: Vec<TraceEvent> =
            self.traces.read().iter().filter(|e| e.trace_id == trace_id).cloned().collect();
        events.sort_by_key(|e| e.timestamp);
        Ok(events)
    }

    async fn create_retrieval_results(&self, batch: &[RetrievalResultRecord]) -> Result<(), StorageError> {
        self.retrieval_results.write().extend_from_slice(batch);
        Ok(())
    }

    async fn upsert_rag_metrics(&self, metrics: &HourlyMetrics) -> Result<(), StorageError> {
        self.hourly_metrics.write().insert(metrics.hour_start, metrics.clone());
        Ok(())
    }

    async fn delete_old_rag_traces(&self, older_than: DateTime<Utc>) -> Result<u64, StorageError> {
        let mut guard = self.traces.write();
        let before = guard.len();
        guard.retain(|e| e.timestamp >= older_than);
        Ok((before - guard.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChunkMetadata;

    fn doc(user_id: Option<&str>) -> Document {
        Document {
            id: Uuid::new_v4(),
            user_id: user_id.map(String::from),
            filename: "f.txt".into(),
            mime_type: "text/plain".into(),
            content_length: 10,
            created_at: Utc::now(),
        }
    }

    fn chunk(document_id: Uuid, embedding: Vec<f32>) -> Chunk {
        Chunk {
            id: Uuid::new_v4(),
            document_id,
            chunk_index: 0,
            content: "hello".into(),
            metadata: ChunkMetadata::default(),
            embedding,
        }
    }

    #[tokio::test]
    async fn search_respects_user_scope() {
        let store = InMemoryStore::new();
        let doc_a = doc(Some("alice"));
        let doc_b = doc(Some("bob"));
        store.create_document(&doc_a).await.unwrap();
        store.create_document(&doc_b).await.unwrap();

        let chunk_a = chunk(doc_a.id, vec![1.0, 0.0]);
        let chunk_b = chunk(doc_b.id, vec![1.0, 0.0]);
        store.upsert_chunks(&[chunk_a.clone(), chunk_b.clone()]).await.unwrap();

        let hits = store.search_vectors(&[1.0, 0.0], Some("bob"), 10, 0.0).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk_id, chunk_b.id);
    }

    #[tokio::test]
    async fn lineage_usage_updates_ema() {
        let store = InMemoryStore::new();
        let chunk_id = Uuid::new_v4();
        let lineage = ChunkLineage {
            chunk_id,
            document_id: Uuid::new_v4(),
            source_type: "upload".into(),
            source_id: "1".into(),
            content_preview: "x".into(),
            chunk_index: 0,
            ingested_at: Utc::now(),
            embedding_model: "test".into(),
            retrieval_count: 0,
            last_retrieved_at: None,
            avg_similarity_score: 0.5,
            importance_score: 0.5,
            tags: vec![],
        };
        store.create_chunk_lineage(&lineage).await.unwrap();
        store.update_chunk_lineage_usage(chunk_id, 1.0, Utc::now()).await.unwrap();
        let updated = store.get_chunk_lineage(chunk_id).await.unwrap().unwrap();
        assert_eq!(updated.retrieval_count, 1);
        assert!((updated.avg_similarity_score - 0.55).abs() < 1e-6);
    }
}

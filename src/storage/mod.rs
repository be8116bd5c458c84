//! Storage port: persistence for chunks, vectors, lineage, traces, and
//! metrics. No on-disk ANN index is implemented here by design — this is an
//! abstraction over a relational/vector backing store, with
//! `storage::memory::InMemoryStore` as the in-process reference
//! implementation (brute-force cosine scan, no durable persistence).
//!
//! Grounded in the teacher's `LanceStore` method shapes
//! (`upsert_chunks`, `vector_search`, `get_neighbors`, `get_by_ids`), minus
//! the Lance-specific predicate language.

pub mod memory;

use crate::error::StorageError;
use crate::types::{Chunk, ChunkLineage, Document, HourlyMetrics, RetrievalResultRecord, TraceEvent};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// One scored hit from a vector or corpus scan.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub chunk_id: Uuid,
    pub score: f32,
}

#[async_trait]
pub trait StoragePort: Send + Sync {
    /// Created once at ingest, immutable after.
    async fn create_document(&self, document: &Document) -> Result<(), StorageError>;

    async fn get_document(&self, id: Uuid) -> Result<Option<Document>, StorageError>;

    /// Atomic batch upsert; a chunk with a matching id replaces the prior one.
    async fn upsert_chunks(&self, chunks: &[Chunk]) -> Result<(), StorageError>;

    /// Cosine similarity search scoped to `user_id` (`None` = anonymous
    /// scope). Returns hits with score >= `threshold`.
    async fn search_vectors(
        &self,
        query_vector: &[f32],
        user_id: Option<&str>,
        top_k: usize,
        threshold: f32,
    ) -> Result<Vec<SearchHit>, StorageError>;

    /// All chunks visible to `user_id`, for BM25 corpus preprocessing.
    async fn list_chunks(&self, user_id: Option<&str>) -> Result<Vec<Chunk>, StorageError>;

    async fn get_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Chunk>, StorageError>;

    /// Chunks immediately before/after `chunk_id` within its document, for
    /// neighbor/context expansion.
    async fn get_neighbors(&self, chunk_id: Uuid, window: u32) -> Result<Vec<Chunk>, StorageError>;

    /// 1:1 unique on `chunk_id`.
    async fn create_chunk_lineage(&self, lineage: &ChunkLineage) -> Result<(), StorageError>;

    async fn get_chunk_lineage(&self, chunk_id: Uuid) -> Result<Option<ChunkLineage>, StorageError>;

    /// `retrieval_count += 1`, EMA on `avg_similarity_score`, timestamp update.
    async fn update_chunk_lineage_usage(
        &self,
        chunk_id: Uuid,
        score: f32,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError>;

    /// Bulk insert; partial failure fails the whole batch.
    async fn create_rag_traces(&self, batch: &[TraceEvent]) -> Result<(), StorageError>;

    /// Ordered by timestamp ascending.
    async fn get_rag_traces_by_trace_id(&self, trace_id: &str) -> Result<Vec<TraceEvent>, StorageError>;

    async fn create_retrieval_results(&self, batch: &[RetrievalResultRecord]) -> Result<(), StorageError>;

    /// Unique by `hour_start`.
    async fn upsert_rag_metrics(&self, metrics: &HourlyMetrics) -> Result<(), StorageError>;

    /// Returns the number of traces deleted.
    async fn delete_old_rag_traces(&self, older_than: DateTime<Utc>) -> Result<u64, StorageError>;
}

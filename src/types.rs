//! Shared data model for the retrieval engine.
//!
//! These types cross every module boundary: ingestion produces `Document`s
//! and `Chunk`s, search and re-rank pass `Candidate`s, and the trace buffer
//! persists `TraceEvent`s built from the same ids. All of them derive
//! `Serialize`/`Deserialize` since traces and metrics are written through the
//! storage port the same way the teacher's `ChunkRecord`/`Citation` types are.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single ingested document. Immutable after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub user_id: Option<String>,
    pub filename: String,
    pub mime_type: String,
    pub content_length: usize,
    pub created_at: DateTime<Utc>,
}

/// Per-chunk metadata carried alongside the content.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub filename: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub importance: Option<f32>,
}

/// A contiguous span of a document, plus its embedding. One chunk owns
/// exactly one embedding; chunks are ordered by `chunk_index` within a
/// document and destroyed only with it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: Uuid,
    pub document_id: Uuid,
    pub chunk_index: u32,
    pub content: String,
    pub metadata: ChunkMetadata,
    pub embedding: Vec<f32>,
}

/// Provenance and usage statistics for one chunk. Created 1:1 with its
/// `Chunk` at ingest, updated on every retrieval that selects it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkLineage {
    pub chunk_id: Uuid,
    pub document_id: Uuid,
    pub source_type: String,
    pub source_id: String,
    pub content_preview: String,
    pub chunk_index: u32,
    pub ingested_at: DateTime<Utc>,
    pub embedding_model: String,
    pub retrieval_count: u64,
    pub last_retrieved_at: Option<DateTime<Utc>>,
    pub avg_similarity_score: f32,
    pub importance_score: f32,
    pub tags: Vec<String>,
}

impl ChunkLineage {
    /// Folds one more retrieval hit into the running average:
    /// `avg_similarity_score = 0.9 * prev + 0.1 * score`.
    pub fn record_retrieval(&mut self, score: f32, at: DateTime<Utc>) {
        self.retrieval_count += 1;
        self.avg_similarity_score = 0.9 * self.avg_similarity_score + 0.1 * score;
        self.last_retrieved_at = Some(at);
    }
}

/// Which pipeline a trace event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceType {
    Ingestion,
    Query,
}

/// One stage of either pipeline. Events sharing a `trace_id` form a logical
/// trace for one ingest or one query call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEvent {
    pub trace_id: String,
    pub trace_type: TraceType,
    pub stage: String,
    pub timestamp: DateTime<Utc>,
    pub duration_ms: u64,
    pub document_id: Option<Uuid>,
    pub chunk_ids: Option<Vec<Uuid>>,
    pub user_id: Option<String>,
    pub chat_id: Option<String>,
    pub query_text: Option<String>,
    pub chunks_created: Option<u32>,
    pub chunks_filtered: Option<u32>,
    pub search_results: Option<u32>,
    pub threshold: Option<f32>,
    pub top_k: Option<u32>,
    pub scores: Option<Vec<f32>>,
    pub tokens_used: Option<u32>,
    pub sources_count: Option<u32>,
    pub error_message: Option<String>,
    pub error_stage: Option<String>,
}

impl TraceEvent {
    pub fn new(
        trace_id: impl Into<String>,
        trace_type: TraceType,
        stage: impl Into<String>,
        duration_ms: u64,
    ) -> Self {
        Self {
            trace_id: trace_id.into(),
            trace_type,
            stage: stage.into(),
            timestamp: Utc::now(),
            duration_ms,
            document_id: None,
            chunk_ids: None,
            user_id: None,
            chat_id: None,
            query_text: None,
            chunks_created: None,
            chunks_filtered: None,
            search_results: None,
            threshold: None,
            top_k: None,
            scores: None,
            tokens_used: None,
            sources_count: None,
            error_message: None,
            error_stage: None,
        }
    }
}

/// One selected chunk's record within a retrieval, persisted independently
/// of the ranking stage that produced it so it can be evaluated later.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalResultRecord {
    pub trace_id: String,
    pub query_text: String,
    pub chunk_id: Uuid,
    pub similarity_score: f32,
    pub rank: u32,
    pub included_in_context: bool,
    pub context_position: Option<u32>,
    pub was_relevant: Option<bool>,
    pub feedback_source: Option<String>,
}

/// Hourly rollup, upserted keyed on `hour_start`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HourlyMetrics {
    pub hour_start: DateTime<Utc>,
    pub documents_ingested: u64,
    pub chunks_created: u64,
    pub chunks_filtered: u64,
    pub avg_ingestion_duration_ms: f64,
    pub queries_processed: u64,
    pub avg_query_duration_ms: f64,
    pub avg_search_results: f64,
    pub avg_context_tokens: f64,
    pub avg_similarity_score: f64,
    pub empty_result_count: u64,
    pub error_count: u64,
    pub embedding_api_calls: u64,
    pub vector_search_operations: u64,
}

impl Default for HourlyMetrics {
    fn default() -> Self {
        Self {
            hour_start: Utc::now(),
            documents_ingested: 0,
            chunks_created: 0,
            chunks_filtered: 0,
            avg_ingestion_duration_ms: 0.0,
            queries_processed: 0,
            avg_query_duration_ms: 0.0,
            avg_search_results: 0.0,
            avg_context_tokens: 0.0,
            avg_similarity_score: 0.0,
            empty_result_count: 0,
            error_count: 0,
            embedding_api_calls: 0,
            vector_search_operations: 0,
        }
    }
}

/// A recent evaluation sample kept in memory by the evaluator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalMetrics {
    pub query: String,
    pub precision: f32,
    pub recall: f32,
    pub f1: f32,
    pub mrr: f32,
    pub results_count: usize,
    pub timestamp: DateTime<Utc>,
}

/// Polarity of an explicit user reaction to a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackPolarity {
    Positive,
    Negative,
    Neutral,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackSignal {
    pub query_id: String,
    pub response_useful: bool,
    pub sources_cited: bool,
    pub chunks_relevant: bool,
    pub user_feedback: Option<FeedbackPolarity>,
    pub timestamp: DateTime<Utc>,
}

/// A scored candidate flowing through search → fusion → rerank → synthesis.
/// Reused across stages so each one only needs to update `score` rather than
/// reshape the record (teacher precedent: `SimpleSearchResult` threaded
/// through `RAGEngine::search_single_query`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub chunk: Chunk,
    pub score: f32,
    pub original_score: f32,
    pub rank: u32,
}

impl Candidate {
    pub fn new(chunk: Chunk, score: f32) -> Self {
        Self { chunk, original_score: score, score, rank: 0 }
    }
}

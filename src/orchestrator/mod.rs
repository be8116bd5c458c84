//! Retrieval orchestrator: the single top-level entry point composing
//! chunking, embedding, dense/sparse search, fusion, diversity filtering,
//! token-budgeted synthesis, tracing, and evaluation.
//!
//! Grounded in the teacher's `RAGEngine::search_comprehensive` /
//! `search_single_query` (candidate fan-out, fusion, dedup, diversity
//! pass, truncation to k), generalized into spec.md §4.10's full state
//! machine — `START → EMBED → (SEARCH, BM25) → FUSE → RERANK → SYNTH →
//! COMPLETE | ERROR(stage)` — emitting a `TraceEvent` at each transition
//! in addition to the teacher's `tracing::info!` log lines (logging is
//! kept *alongside* tracing events, not instead of them).

use crate::chunking::{self, ChunkOptions, ChunkStrategy};
use crate::config::RagConfig;
use crate::embedding::EmbeddingPort;
use crate::error::{EmbeddingError, OrchestratorError, StorageError};
use crate::eval::{Evaluator, RetrievedItem as EvalRetrievedItem, Thresholds};
use crate::metrics::MetricsTracker;
use crate::rerank;
use crate::search::{bm25::Bm25Scorer, dense, fusion};
use crate::storage::StoragePort;
use crate::synth::{self, CharsPerToken, SynthOptions, SynthStrategy, TokenEstimator};
use crate::trace::{generate_trace_id, TraceBuffer, TraceBufferConfig};
use crate::types::{
    Candidate, Chunk, ChunkLineage, Document, FeedbackSignal, RetrievalResultRecord, TraceEvent, TraceType,
};
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// Cooperative cancellation signal. Checked between pipeline stages; the
/// current stage always finishes its in-flight I/O before the check is
/// honored, so no partial retrieval is ever surfaced (spec.md §5).
#[derive(Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub strategy: ChunkStrategy,
    pub user_id: Option<String>,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self { strategy: ChunkStrategy::Adaptive, user_id: None }
    }
}

#[derive(Debug, Clone)]
pub struct IngestResult {
    pub document_id: Uuid,
    pub chunks_created: usize,
    pub trace_id: String,
}

#[derive(Debug, Clone)]
pub struct RetrieveOptions {
    pub user_id: Option<String>,
    pub top_k: usize,
    pub use_hybrid_search: bool,
    pub use_reranking: bool,
    pub max_tokens: usize,
}

impl RetrieveOptions {
    fn from_config(config: &RagConfig) -> Self {
        Self {
            user_id: None,
            top_k: config.search.top_k,
            use_hybrid_search: config.search.use_hybrid_search,
            use_reranking: config.rerank.use_reranking,
            max_tokens: config.synth.max_tokens,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetrievedSourceItem {
    pub chunk_id: Uuid,
    pub document_id: Uuid,
    pub chunk_index: u32,
    pub similarity_score: f32,
    pub rank: u32,
    pub included_in_context: bool,
}

#[derive(Debug, Clone)]
pub struct RetrievalOutcome {
    pub trace_id: String,
    pub items: Vec<RetrievedSourceItem>,
    pub content: String,
    pub total_tokens_used: usize,
    pub search_time_ms: u64,
    pub query_embedding_time_ms: u64,
    /// Set when the pipeline short-circuited; `items`/`content` are empty
    /// in that case. Per spec.md §7, callers still get a structured
    /// result rather than a bare error for every kind except `Cancelled`.
    pub error: Option<&'static str>,
}

impl RetrievalOutcome {
    fn empty(trace_id: String, error: Option<&'static str>) -> Self {
        Self { trace_id, items: Vec::new(), content: String::new(), total_tokens_used: 0, search_time_ms: 0, query_embedding_time_ms: 0, error }
    }
}

/// Process-wide engine state: storage, embedding, trace, and evaluator are
/// constructed once at init and passed by reference into every operation,
/// per spec.md §9's "ambient singletons → explicit dependencies" note.
pub struct RagEngine {
    storage: Arc<dyn StoragePort>,
    embedder: Arc<dyn EmbeddingPort>,
    trace: Arc<TraceBuffer>,
    evaluator: Arc<Evaluator>,
    metrics: Arc<MetricsTracker>,
    config: RagConfig,
    estimator: CharsPerToken,
}

impl RagEngine {
    /// Eager construction: the trace flush timer starts immediately and
    /// errors in wiring surface at init rather than on first call, per
    /// spec.md §9's "lazy provider clients" redesign note.
    pub fn new(storage: Arc<dyn StoragePort>, embedder: Arc<dyn EmbeddingPort>, config: RagConfig) -> Arc<Self> {
        let trace_config = TraceBufferConfig {
            enabled: config.trace.enabled,
            persistence_enabled: config.trace.persistence,
            batch_size: config.trace.batch_size,
            flush_interval: std::time::Duration::from_millis(config.trace.flush_interval_ms),
            ring_capacity: config.trace.buffer_size,
        };
        let trace = TraceBuffer::new(Arc::clone(&storage), trace_config);
        trace.spawn_flush_timer();

        let thresholds = Thresholds { semantic: config.search.semantic_threshold, keyword: config.search.keyword_weight };
        let evaluator = Arc::new(Evaluator::new(thresholds));

        let metrics = MetricsTracker::new(Arc::clone(&storage));
        metrics.spawn_flush_timer(std::time::Duration::from_secs(300));

        Arc::new(Self { storage, embedder, trace, evaluator, metrics, config, estimator: CharsPerToken::default() })
    }

    pub fn default_retrieve_options(&self) -> RetrieveOptions {
        RetrieveOptions::from_config(&self.config)
    }

    pub fn evaluator(&self) -> &Arc<Evaluator> {
        &self.evaluator
    }

    /// Stops the flush timer and performs one last flush, before the
    /// storage/embedding clients themselves are released.
    pub async fn shutdown(&self) {
        self.trace.shutdown().await;
        self.metrics.shutdown().await;
    }

    async fn emit(&self, trace_id: &str, trace_type: TraceType, stage: &'static str, duration_ms: u64, mutate: impl FnOnce(&mut TraceEvent)) {
        let mut event = TraceEvent::new(trace_id, trace_type, stage, duration_ms);
        mutate(&mut event);
        tracing::debug!(trace_id, stage, duration_ms, "pipeline stage");
        self.trace.record(event).await;
    }

    async fn emit_error(&self, trace_id: &str, trace_type: TraceType, stage: &'static str, message: String) {
        self.emit(trace_id, trace_type, "error", 0, |e| {
            e.error_stage = Some(stage.to_string());
            e.error_message = Some(message);
        })
        .await;
    }

    // ---------------------------------------------------------------
    // Ingestion
    // ---------------------------------------------------------------

    pub async fn ingest_document(
        &self,
        content: &str,
        filename: &str,
        mime_type: &str,
        opts: &IngestOptions,
        cancel: &CancellationToken,
    ) -> Result<IngestResult, OrchestratorError> {
        let trace_id = generate_trace_id();

        let document = Document {
            id: Uuid::new_v4(),
            user_id: opts.user_id.clone(),
            filename: filename.to_string(),
            mime_type: mime_type.to_string(),
            content_length: content.len(),
            created_at: Utc::now(),
        };

        let started = Instant::now();
        self.storage.create_document(&document).await.map_err(OrchestratorError::Storage)?;

        if cancel.is_cancelled() {
            self.emit_error(&trace_id, TraceType::Ingestion, "ingest", "cancelled".into()).await;
            self.metrics.record_error();
            return Err(OrchestratorError::Cancelled);
        }

        let chunk_options = ChunkOptions { strategy: opts.strategy, ..ChunkOptions::default() };
        let mut chunks = chunking::chunk_document(content, document.id, filename, mime_type, &chunk_options)?;

        self.emit(&trace_id, TraceType::Ingestion, "ingest_chunk", started.elapsed().as_millis() as u64, |e| {
            e.document_id = Some(document.id);
            e.user_id = document.user_id.clone();
            e.chunks_created = Some(chunks.len() as u32);
        })
        .await;

        if cancel.is_cancelled() {
            self.emit_error(&trace_id, TraceType::Ingestion, "ingest_embed", "cancelled".into()).await;
            self.metrics.record_error();
            return Err(OrchestratorError::Cancelled);
        }

        let embed_started = Instant::now();
        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let vectors = self
            .embedder
            .embed_documents(&texts)
            .await
            .map_err(|source| OrchestratorError::Embedding { stage: "ingest_embed", source })?;
        self.metrics.record_embedding_api_call();

        if vectors.len() != chunks.len() {
            self.metrics.record_error();
            return Err(OrchestratorError::Embedding {
                stage: "ingest_embed",
                source: EmbeddingError::invalid("embedding count did not match chunk count"),
            });
        }
        for (chunk, vector) in chunks.iter_mut().zip(vectors.into_iter()) {
            if vector.len() != self.embedder.dimensions() {
                return Err(OrchestratorError::Embedding {
                    stage: "ingest_embed",
                    source: EmbeddingError::invalid("embedding dimension did not match provider configuration"),
                });
            }
            chunk.embedding = vector;
        }

        self.emit(&trace_id, TraceType::Ingestion, "ingest_embed", embed_started.elapsed().as_millis() as u64, |e| {
            e.document_id = Some(document.id);
            e.chunk_ids = Some(chunks.iter().map(|c| c.id).collect());
        })
        .await;

        let chunks_created = chunks.len();
        let now = Utc::now();
        let lineages: Vec<ChunkLineage> = chunks
            .iter()
            .map(|c| ChunkLineage {
                chunk_id: c.id,
                document_id: document.id,
                source_type: "upload".to_string(),
                source_id: document.id.to_string(),
                content_preview: c.content.chars().take(200).collect(),
                chunk_index: c.chunk_index,
                ingested_at: now,
                embedding_model: self.embedder.model_id().to_string(),
                retrieval_count: 0,
                last_retrieved_at: None,
                avg_similarity_score: 0.0,
                importance_score: c.metadata.importance.unwrap_or(0.5),
                tags: Vec::new(),
            })
            .collect();

        let store_started = Instant::now();
        self.storage.upsert_chunks(&chunks).await.map_err(OrchestratorError::Storage)?;
        for lineage in &lineages {
            self.storage.create_chunk_lineage(lineage).await.map_err(OrchestratorError::Storage)?;
        }

        self.emit(&trace_id, TraceType::Ingestion, "ingest_store", store_started.elapsed().as_millis() as u64, |e| {
            e.document_id = Some(document.id);
        })
        .await;

        self.emit(&trace_id, TraceType::Ingestion, "ingest_complete", started.elapsed().as_millis() as u64, |e| {
            e.document_id = Some(document.id);
            e.chunks_created = Some(chunks_created as u32);
        })
        .await;

        self.metrics.record_ingestion(now, started.elapsed().as_millis() as u64, chunks_created as u32, 0);

        Ok(IngestResult { document_id: document.id, chunks_created, trace_id })
    }

    // ---------------------------------------------------------------
    // Retrieval
    // ---------------------------------------------------------------

    /// `START → EMBED → (SEARCH, BM25) → FUSE → RERANK → SYNTH →
    /// COMPLETE | ERROR(stage)`. Only `Cancelled` propagates as an `Err`;
    /// every other stage failure degrades to an empty, tagged
    /// `RetrievalOutcome` so the caller can still answer.
    pub async fn retrieve(&self, query: &str, opts: &RetrieveOptions, cancel: &CancellationToken) -> Result<RetrievalOutcome, OrchestratorError> {
        let trace_id = generate_trace_id();
        self.emit(&trace_id, TraceType::Query, "query_start", 0, |e| {
            e.query_text = Some(query.to_string());
            e.user_id = opts.user_id.clone();
        })
        .await;

        if query.trim().is_empty() {
            self.emit(&trace_id, TraceType::Query, "query_complete", 0, |e| {
                e.sources_count = Some(0);
                e.tokens_used = Some(0);
            })
            .await;
            return Ok(RetrievalOutcome::empty(trace_id, None));
        }

        match self.retrieve_inner(query, opts, &trace_id, cancel).await {
            Ok(outcome) => Ok(outcome),
            Err(OrchestratorError::Cancelled) => {
                self.emit_error(&trace_id, TraceType::Query, "cancelled", "operation cancelled".into()).await;
                self.metrics.record_error();
                Err(OrchestratorError::Cancelled)
            }
            Err(err) => {
                let stage = err.stage();
                self.emit_error(&trace_id, TraceType::Query, stage, err.to_string()).await;
                self.metrics.record_error();
                Ok(RetrievalOutcome::empty(trace_id, Some(stage)))
            }
        }
    }

    async fn retrieve_inner(
        &self,
        query: &str,
        opts: &RetrieveOptions,
        trace_id: &str,
        cancel: &CancellationToken,
    ) -> Result<RetrievalOutcome, OrchestratorError> {
        let retrieve_started = Instant::now();
        let threshold = self.evaluator.thresholds().semantic;

        let embed_started = Instant::now();
        let query_vector = self
            .embedder
            .embed_query(query)
            .await
            .map_err(|source| OrchestratorError::Embedding { stage: "query_embed", source })?;
        self.metrics.record_embedding_api_call();
        let query_embedding_time_ms = embed_started.elapsed().as_millis() as u64;
        self.emit(trace_id, TraceType::Query, "query_embed", query_embedding_time_ms, |_| {}).await;

        if cancel.is_cancelled() {
            return Err(OrchestratorError::Cancelled);
        }

        let search_started = Instant::now();
        let candidate_k = opts.top_k * 2;
        let dense_hits = dense::search(self.storage.as_ref(), &query_vector, opts.user_id.as_deref(), candidate_k, threshold)
            .await
            .map_err(OrchestratorError::Search)?;
        self.metrics.record_vector_search_operation();

        let corpus = self.storage.list_chunks(opts.user_id.as_deref()).await.map_err(OrchestratorError::Storage)?;

        let secondary_hits = if opts.use_hybrid_search {
            let pairs: Vec<(Uuid, &str)> = corpus.iter().map(|c| (c.id, c.content.as_str())).collect();
            let scorer = Bm25Scorer::build(&pairs);
            scorer.search(query, candidate_k)
        } else {
            crude_keyword_search(&corpus, query, candidate_k)
        };

        let fused = fusion::weighted_fusion(&dense_hits, &secondary_hits, self.config.search.semantic_weight, self.config.search.keyword_weight, threshold);
        let search_time_ms = search_started.elapsed().as_millis() as u64;

        self.emit(trace_id, TraceType::Query, "search", search_time_ms, |e| {
            e.search_results = Some(fused.len() as u32);
            e.threshold = Some(threshold);
            e.top_k = Some(opts.top_k as u32);
            e.scores = Some(fused.iter().map(|f| f.score).collect());
        })
        .await;

        if cancel.is_cancelled() {
            return Err(OrchestratorError::Cancelled);
        }

        let chunk_ids: Vec<Uuid> = fused.iter().map(|f| f.chunk_id).collect();
        let chunk_by_id = self.storage.get_by_ids(&chunk_ids).await.map_err(OrchestratorError::Storage)?;
        let mut candidates: Vec<Candidate> = Vec::with_capacity(fused.len());
        for fused_result in &fused {
            if let Some(chunk) = chunk_by_id.iter().find(|c| c.id == fused_result.chunk_id) {
                let mut candidate = Candidate::new(chunk.clone(), fused_result.score);
                candidate.rank = fused_result.rank;
                candidates.push(candidate);
            }
        }

        let candidates = if opts.use_reranking {
            // Diversity cutoff is fixed at 0.7 independent of `diversityWeight`
            // per spec.md §9's open question — the fuller MMR/recency/importance
            // pipeline in `rerank` is available for callers who want it, but the
            // default retrieval path only applies this cheap pass.
            rerank::diversity_filter(candidates, 0.7)
        } else {
            candidates
        };
        let mut candidates = candidates;
        candidates.truncate(opts.top_k);

        self.emit(trace_id, TraceType::Query, "retrieve", 0, |e| {
            e.chunk_ids = Some(candidates.iter().map(|c| c.chunk.id).collect());
            e.scores = Some(candidates.iter().map(|c| c.score).collect());
        })
        .await;

        // Neighbor/context expansion: purely additive, never affects ranking.
        let inject_started = Instant::now();
        let mut injected = 0u32;
        for candidate in candidates.clone() {
            if let Ok(neighbors) = self.storage.get_neighbors(candidate.chunk.id, 0).await {
                injected += neighbors.len() as u32;
            }
        }
        self.emit(trace_id, TraceType::Query, "inject", inject_started.elapsed().as_millis() as u64, |e| {
            e.chunks_filtered = Some(injected);
        })
        .await;

        let synth_options = SynthOptions {
            strategy: SynthStrategy::Truncate,
            max_tokens: opts.max_tokens,
            min_relevance: self.config.synth.min_relevance,
            dedup_threshold: 0.8,
        };
        let synthesized = synth::synthesize(candidates.clone(), query, &synth_options, &self.estimator, None).await;

        let included_chunk_ids: std::collections::HashSet<Uuid> =
            synthesized.sources.iter().filter_map(|s| candidates.iter().find(|c| c.chunk.document_id == s.document_id && c.chunk.chunk_index == s.chunk_index).map(|c| c.chunk.id)).collect();

        let items: Vec<RetrievedSourceItem> = candidates
            .iter()
            .map(|c| RetrievedSourceItem {
                chunk_id: c.chunk.id,
                document_id: c.chunk.document_id,
                chunk_index: c.chunk.chunk_index,
                similarity_score: c.score,
                rank: c.rank,
                included_in_context: included_chunk_ids.contains(&c.chunk.id),
            })
            .collect();

        let now = Utc::now();
        for item in items.iter().filter(|i| i.included_in_context) {
            let _ = self.storage.update_chunk_lineage_usage(item.chunk_id, item.similarity_score, now).await;
        }

        let result_records: Vec<RetrievalResultRecord> = items
            .iter()
            .enumerate()
            .map(|(idx, item)| RetrievalResultRecord {
                trace_id: trace_id.to_string(),
                query_text: query.to_string(),
                chunk_id: item.chunk_id,
                similarity_score: item.similarity_score,
                rank: item.rank,
                included_in_context: item.included_in_context,
                context_position: if item.included_in_context { Some(idx as u32) } else { None },
                was_relevant: None,
                feedback_source: None,
            })
            .collect();
        if let Err(err) = self.storage.create_retrieval_results(&result_records).await {
            tracing::warn!(error = %err, "failed to persist retrieval results, continuing");
        }

        self.emit(trace_id, TraceType::Query, "query_complete", 0, |e| {
            e.tokens_used = Some(synthesized.token_count as u32);
            e.sources_count = Some(synthesized.synthesized_chunk_count as u32);
        })
        .await;

        let eval_items: Vec<EvalRetrievedItem> =
            candidates.iter().map(|c| EvalRetrievedItem { chunk_id: c.chunk.id, content: c.chunk.content.clone() }).collect();
        self.evaluator.evaluate_retrieval(query, &eval_items, None);
        self.evaluator.auto_tune_thresholds();

        let avg_similarity = if candidates.is_empty() {
            None
        } else {
            Some(candidates.iter().map(|c| c.score).sum::<f32>() / candidates.len() as f32)
        };
        self.metrics.record_query(
            now,
            retrieve_started.elapsed().as_millis() as u64,
            candidates.len() as u32,
            synthesized.token_count as u32,
            avg_similarity,
            items.is_empty(),
        );

        Ok(RetrievalOutcome {
            trace_id: trace_id.to_string(),
            items,
            content: synthesized.content,
            total_tokens_used: synthesized.token_count,
            search_time_ms,
            query_embedding_time_ms,
            error: None,
        })
    }

    /// Wraps the formatted retrieval in `<retrieved_knowledge>` and
    /// appends it to `system_context`; an empty retrieval returns
    /// `system_context` unchanged.
    pub async fn enrich_prompt(&self, query: &str, system_context: &str, user_id: Option<&str>) -> String {
        let mut opts = self.default_retrieve_options();
        opts.user_id = user_id.map(String::from);
        let cancel = CancellationToken::new();

        match self.retrieve(query, &opts, &cancel).await {
            Ok(outcome) if !outcome.content.trim().is_empty() => {
                format!("{}\n\n<retrieved_knowledge>\n{}\n</retrieved_knowledge>", system_context, outcome.content)
            }
            _ => system_context.to_string(),
        }
    }

    pub fn record_feedback(&self, signal: FeedbackSignal) {
        self.evaluator.record_feedback(signal);
    }

    pub fn auto_tune(&self) -> Thresholds {
        self.evaluator.auto_tune_thresholds()
    }

    pub fn get_trace(&self, trace_id: &str) -> Vec<TraceEvent> {
        self.trace.recent_by_trace_id(trace_id)
    }

    pub fn list_traces(&self, trace_type: Option<TraceType>, limit: usize) -> Vec<TraceEvent> {
        self.trace.recent(trace_type, limit)
    }

    pub async fn delete_old_traces(&self, older_than: chrono::DateTime<Utc>) -> Result<u64, StorageError> {
        self.storage.delete_old_rag_traces(older_than).await
    }
}

/// Crude substring "LIKE" keyword search used when `useHybridSearch` is
/// off: counts occurrences of each significant query token per chunk,
/// merged into the same weighted-fusion path BM25 would otherwise feed.
fn crude_keyword_search(corpus: &[Chunk], query: &str, top_k: usize) -> Vec<(Uuid, f32)> {
    let tokens: Vec<String> = query.to_lowercase().split_whitespace().filter(|w| w.len() > 2).map(|w| w.to_string()).collect();
    if tokens.is_empty() {
        return Vec::new();
    }

    let mut hits: Vec<(Uuid, f32)> = corpus
        .iter()
        .filter_map(|chunk| {
            let lower = chunk.content.to_lowercase();
            let count: usize = tokens.iter().map(|t| lower.matches(t.as_str()).count()).sum();
            if count > 0 {
                Some((chunk.id, count as f32))
            } else {
                None
            }
        })
        .collect();
    hits.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    hits.truncate(top_k);
    hits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::local::DeterministicEmbedder;
    use crate::storage::memory::InMemoryStore;

    fn engine() -> Arc<RagEngine> {
        let storage = Arc::new(InMemoryStore::new());
        let embedder = Arc::new(DeterministicEmbedder::new(64));
        RagEngine::new(storage, embedder, RagConfig::default())
    }

    #[tokio::test]
    async fn ingest_then_retrieve_roundtrip() {
        let engine = engine();
        let cancel = CancellationToken::new();
        let ingest = engine
            .ingest_document("RAG combines retrieval with generation.", "doc.md", "text/markdown", &IngestOptions::default(), &cancel)
            .await
            .unwrap();
        assert_eq!(ingest.chunks_created, 1);

        let mut opts = engine.default_retrieve_options();
        opts.use_hybrid_search = true;
        let outcome = engine.retrieve("what is rag", &opts, &cancel).await.unwrap();
        assert!(outcome.error.is_none());
        assert!(outcome.total_tokens_used > 0);
        assert!(!outcome.items.is_empty());
    }

    #[tokio::test]
    async fn user_isolation_is_enforced() {
        let engine = engine();
        let cancel = CancellationToken::new();
        let alice_doc = engine
            .ingest_document("secretA belongs to alice", "a.txt", "text/plain", &IngestOptions { user_id: Some("alice".into()), ..Default::default() }, &cancel)
            .await
            .unwrap();
        let bob_doc = engine
            .ingest_document("secretB belongs to bob", "b.txt", "text/plain", &IngestOptions { user_id: Some("bob".into()), ..Default::default() }, &cancel)
            .await
            .unwrap();

        let mut opts = engine.default_retrieve_options();
        opts.user_id = Some("bob".into());
        let outcome = engine.retrieve("secret", &opts, &cancel).await.unwrap();
        assert!(!outcome.items.is_empty());
        for item in &outcome.items {
            assert_eq!(item.document_id, bob_doc.document_id);
            assert_ne!(item.document_id, alice_doc.document_id);
        }
    }

    #[tokio::test]
    async fn empty_query_returns_empty_result() {
        let engine = engine();
        let cancel = CancellationToken::new();
        let opts = engine.default_retrieve_options();
        let outcome = engine.retrieve("   ", &opts, &cancel).await.unwrap();
        assert!(outcome.items.is_empty());
        assert_eq!(outcome.total_tokens_used, 0);
    }

    #[tokio::test]
    async fn cancelled_before_start_surfaces_error() {
        let engine = engine();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = engine
            .ingest_document("some content for cancellation", "c.txt", "text/plain", &IngestOptions::default(), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::Cancelled));
    }
}

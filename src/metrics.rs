//! Hourly metrics aggregator: rolls ingestion/query counters into the
//! `HourlyMetrics` upserted through the storage port (spec.md §3/§6).
//!
//! Grounded in the same accumulate-then-flush shape as [`crate::trace`]'s
//! `TraceBuffer` (teacher precedent: `agent/metrics.rs`'s
//! `AgentMetricsCollector`, here keyed by hour instead of a ring buffer) —
//! a `parking_lot::Mutex`-guarded running accumulator, flushed to storage on
//! an hour rollover or a periodic timer tick, whichever comes first.

use crate::storage::StoragePort;
use crate::types::HourlyMetrics;
use chrono::{DateTime, Timelike, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::task::JoinHandle;

#[derive(Debug, Clone)]
struct Accumulator {
    hour_start: DateTime<Utc>,
    documents_ingested: u64,
    chunks_created: u64,
    chunks_filtered: u64,
    ingestion_duration_sum_ms: f64,
    ingestion_count: u64,
    queries_processed: u64,
    query_duration_sum_ms: f64,
    search_results_sum: f64,
    context_tokens_sum: f64,
    similarity_score_sum: f64,
    similarity_score_count: u64,
    empty_result_count: u64,
    error_count: u64,
    embedding_api_calls: u64,
    vector_search_operations: u64,
}

fn truncate_to_hour(at: DateTime<Utc>) -> DateTime<Utc> {
    at.with_minute(0).and_then(|t| t.with_second(0)).and_then(|t| t.with_nanosecond(0)).unwrap_or(at)
}

impl Accumulator {
    fn new(hour_start: DateTime<Utc>) -> Self {
        Self {
            hour_start,
            documents_ingested: 0,
            chunks_created: 0,
            chunks_filtered: 0,
            ingestion_duration_sum_ms: 0.0,
            ingestion_count: 0,
            queries_processed: 0,
            query_duration_sum_ms: 0.0,
            search_results_sum: 0.0,
            context_tokens_sum: 0.0,
            similarity_score_sum: 0.0,
            similarity_score_count: 0,
            empty_result_count: 0,
            error_count: 0,
            embedding_api_calls: 0,
            vector_search_operations: 0,
        }
    }

    fn snapshot(&self) -> HourlyMetrics {
        let avg = |sum: f64, count: u64| if count > 0 { sum / count as f64 } else { 0.0 };
        HourlyMetrics {
            hour_start: self.hour_start,
            documents_ingested: self.documents_ingested,
            chunks_created: self.chunks_created,
            chunks_filtered: self.chunks_filtered,
            avg_ingestion_duration_ms: avg(self.ingestion_duration_sum_ms, self.ingestion_count),
            queries_processed: self.queries_processed,
            avg_query_duration_ms: avg(self.query_duration_sum_ms, self.queries_processed),
            avg_search_results: avg(self.search_results_sum, self.queries_processed),
            avg_context_tokens: avg(self.context_tokens_sum, self.queries_processed),
            avg_similarity_score: avg(self.similarity_score_sum, self.similarity_score_count),
            empty_result_count: self.empty_result_count,
            error_count: self.error_count,
            embedding_api_calls: self.embedding_api_calls,
            vector_search_operations: self.vector_search_operations,
        }
    }
}

/// Accumulates per-hour ingestion/query counters and upserts them through
/// `StoragePort::upsert_rag_metrics`, keyed on the hour the events fall in.
/// Guarded by a single mutex (teacher precedent: the trace buffer's ring) —
/// none of this crate's counters need finer-grained locking.
pub struct MetricsTracker {
    storage: Arc<dyn StoragePort>,
    current: Mutex<Accumulator>,
    flush_task: Mutex<Option<JoinHandle<()>>>,
}

impl MetricsTracker {
    pub fn new(storage: Arc<dyn StoragePort>) -> Arc<Self> {
        Arc::new(Self {
            storage,
            current: Mutex::new(Accumulator::new(truncate_to_hour(Utc::now()))),
            flush_task: Mutex::new(None),
        })
    }

    /// Periodically persists the in-progress hour's snapshot so a long-lived
    /// process doesn't lose counters to a crash mid-hour. Idempotent —
    /// upserting the same `hour_start` again just replaces the row.
    pub fn spawn_flush_timer(self: &Arc<Self>, interval: std::time::Duration) {
        let this = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                this.flush().await;
            }
        });
        *self.flush_task.lock() = Some(handle);
    }

    pub async fn shutdown(&self) {
        if let Some(handle) = self.flush_task.lock().take() {
            handle.abort();
        }
        self.flush().await;
    }

    /// Rolls the accumulator over to `at`'s hour if it has moved on,
    /// returning the now-closed bucket's snapshot for an out-of-band flush.
    fn roll_if_needed(&self, at: DateTime<Utc>) -> Option<HourlyMetrics> {
        let hour = truncate_to_hour(at);
        let mut guard = self.current.lock();
        if hour == guard.hour_start {
            return None;
        }
        let closed = guard.snapshot();
        *guard = Accumulator::new(hour);
        Some(closed)
    }

    async fn persist(&self, snapshot: HourlyMetrics) {
        if let Err(err) = self.storage.upsert_rag_metrics(&snapshot).await {
            tracing::warn!(error = %err, hour = %snapshot.hour_start, "failed to persist hourly metrics");
        }
    }

    pub fn record_ingestion(&self, at: DateTime<Utc>, duration_ms: u64, chunks_created: u32, chunks_filtered: u32) {
        if let Some(closed) = self.roll_if_needed(at) {
            let storage = Arc::clone(&self.storage);
            tokio::spawn(async move {
                if let Err(err) = storage.upsert_rag_metrics(&closed).await {
                    tracing::warn!(error = %err, hour = %closed.hour_start, "failed to persist rolled-over hourly metrics");
                }
            });
        }
        let mut guard = self.current.lock();
        guard.documents_ingested += 1;
        guard.chunks_created += chunks_created as u64;
        guard.chunks_filtered += chunks_filtered as u64;
        guard.ingestion_duration_sum_ms += duration_ms as f64;
        guard.ingestion_count += 1;
    }

    #[allow(clippy::too_many_arguments)]
    pub fn record_query(&self, at: DateTime<Utc>, duration_ms: u64, search_results: u32, context_tokens: u32, avg_similarity: Option<f32>, was_empty: bool) {
        if let Some(closed) = self.roll_if_needed(at) {
            let storage = Arc::clone(&self.storage);
            tokio::spawn(async move {
                if let Err(err) = storage.upsert_rag_metrics(&closed).await {
                    tracing::warn!(error = %err, hour = %closed.hour_start, "failed to persist rolled-over hourly metrics");
                }
            });
        }
        let mut guard = self.current.lock();
        guard.queries_processed += 1;
        guard.query_duration_sum_ms += duration_ms as f64;
        guard.search_results_sum += search_results as f64;
        guard.context_tokens_sum += context_tokens as f64;
        if let Some(score) = avg_similarity {
            guard.similarity_score_sum += score as f64;
            guard.similarity_score_count += 1;
        }
        if was_empty {
            guard.empty_result_count += 1;
        }
    }

    pub fn record_error(&self) {
        self.current.lock().error_count += 1;
    }

    pub fn record_embedding_api_call(&self) {
        self.current.lock().embedding_api_calls += 1;
    }

    pub fn record_vector_search_operation(&self) {
        self.current.lock().vector_search_operations += 1;
    }

    /// Upserts the current (possibly still open) hour's snapshot without
    /// resetting it — used by the flush timer and on shutdown.
    pub async fn flush(&self) {
        let snapshot = self.current.lock().snapshot();
        self.persist(snapshot).await;
    }

    pub fn current_snapshot(&self) -> HourlyMetrics {
        self.current.lock().snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::InMemoryStore;
    use chrono::Duration;

    #[tokio::test]
    async fn ingestion_and_query_counters_aggregate() {
        let storage = Arc::new(InMemoryStore::new());
        let tracker = MetricsTracker::new(storage);
        let now = Utc::now();

        tracker.record_ingestion(now, 10, 3, 1);
        tracker.record_ingestion(now, 20, 5, 0);
        tracker.record_query(now, 100, 4, 200, Some(0.8), false);
        tracker.record_query(now, 300, 2, 100, Some(0.4), true);
        tracker.record_embedding_api_call();
        tracker.record_vector_search_operation();

        let snapshot = tracker.current_snapshot();
        assert_eq!(snapshot.documents_ingested, 2);
        assert_eq!(snapshot.chunks_created, 8);
        assert_eq!(snapshot.chunks_filtered, 1);
        assert!((snapshot.avg_ingestion_duration_ms - 15.0).abs() < 1e-9);
        assert_eq!(snapshot.queries_processed, 2);
        assert!((snapshot.avg_query_duration_ms - 200.0).abs() < 1e-9);
        assert!((snapshot.avg_similarity_score - 0.6).abs() < 1e-6);
        assert_eq!(snapshot.empty_result_count, 1);
        assert_eq!(snapshot.embedding_api_calls, 1);
        assert_eq!(snapshot.vector_search_operations, 1);
    }

    #[tokio::test]
    async fn flush_persists_current_hour_snapshot() {
        let storage = Arc::new(InMemoryStore::new());
        let tracker = MetricsTracker::new(Arc::clone(&storage) as Arc<dyn StoragePort>);
        tracker.record_error();
        tracker.flush().await;
        // No direct getter on InMemoryStore for hourly metrics by design (the
        // port only exposes upsert); this just exercises the persist path
        // for a panic-free flush.
    }

    #[tokio::test]
    async fn rollover_to_a_new_hour_resets_counters() {
        let storage = Arc::new(InMemoryStore::new());
        let tracker = MetricsTracker::new(storage);
        let hour_one = truncate_to_hour(Utc::now());
        tracker.record_ingestion(hour_one, 10, 1, 0);
        assert_eq!(tracker.current_snapshot().documents_ingested, 1);

        let hour_two = hour_one + Duration::hours(1);
        tracker.record_ingestion(hour_two, 10, 1, 0);
        let snapshot = tracker.current_snapshot();
        assert_eq!(snapshot.documents_ingested, 1);
        assert_eq!(snapshot.hour_start, hour_two);
    }
}

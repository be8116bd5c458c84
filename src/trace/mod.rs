//! Trace buffer: in-memory ring of recent pipeline events, backed by a
//! batched, durable flush to the storage port.
//!
//! Grounded in the teacher's `AgentMetricsCollector`
//! (`agent/metrics.rs`) — an `Arc<RwLock<Vec<_>>>` capped at `max_recent`
//! with FIFO eviction — generalized into two cooperating collections: a
//! fixed-capacity ring for recent-trace introspection (`get_trace`,
//! `list_traces`) and a write queue that batches into `StoragePort::
//! create_rag_traces` on a timer, the way the teacher's flush-on-interval
//! workers use `tokio::time::interval`.

use crate::storage::StoragePort;
use crate::types::{TraceEvent, TraceType};
use parking_lot::Mutex;
use rand::Rng;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// `rag-<unix_ms>-<rand6>`, grouping every event of one ingestion or query.
pub fn generate_trace_id() -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let suffix: String = {
        let mut rng = rand::thread_rng();
        (0..6).map(|_| std::char::from_digit(rng.gen_range(0u32..36), 36).unwrap()).collect()
    };
    format!("rag-{}-{}", millis, suffix)
}

#[derive(Debug, Clone, Copy)]
pub struct TraceBufferConfig {
    pub enabled: bool,
    pub persistence_enabled: bool,
    pub batch_size: usize,
    pub flush_interval: Duration,
    pub ring_capacity: usize,
}

impl Default for TraceBufferConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            persistence_enabled: true,
            batch_size: 20,
            flush_interval: Duration::from_secs(5),
            ring_capacity: 200,
        }
    }
}

/// Circular in-memory event buffer plus a batched durable write queue.
/// The ring and queue are each guarded by their own `parking_lot::Mutex`
/// so readers of recent traces never block on a flush in flight.
pub struct TraceBuffer {
    storage: Arc<dyn StoragePort>,
    config: TraceBufferConfig,
    ring: Mutex<VecDeque<TraceEvent>>,
    write_queue: Mutex<Vec<TraceEvent>>,
    trace_drops: AtomicU64,
    persistence_enabled: AtomicBool,
    flush_task: Mutex<Option<JoinHandle<()>>>,
}

impl TraceBuffer {
    pub fn new(storage: Arc<dyn StoragePort>, config: TraceBufferConfig) -> Arc<Self> {
        Arc::new(Self {
            storage,
            persistence_enabled: AtomicBool::new(config.persistence_enabled),
            config,
            ring: Mutex::new(VecDeque::with_capacity(config.ring_capacity)),
            write_queue: Mutex::new(Vec::new()),
            trace_drops: AtomicU64::new(0),
            flush_task: Mutex::new(None),
        })
    }

    /// Starts the periodic flush timer. Idempotent — calling twice replaces
    /// the previous timer task rather than running two.
    pub fn spawn_flush_timer(self: &Arc<Self>) {
        let this = Arc::clone(self);
        let interval = self.config.flush_interval;
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                this.flush().await;
            }
        });
        *self.flush_task.lock() = Some(handle);
    }

    /// Records one stage event: pushes into the FIFO ring (capacity
    /// `ring_capacity`, oldest evicted first) and, if persistence is
    /// enabled, into the write queue — flushing immediately if the queue
    /// has reached `batch_size`.
    pub async fn record(&self, event: TraceEvent) {
        if !self.config.enabled {
            return;
        }

        {
            let mut ring = self.ring.lock();
            if ring.len() >= self.config.ring_capacity {
                ring.pop_front();
            }
            ring.push_back(event.clone());
        }

        if !self.persistence_enabled.load(Ordering::Relaxed) {
            return;
        }

        let should_flush = {
            let mut queue = self.write_queue.lock();
            queue.push(event);
            self.apply_backpressure(&mut queue);
            queue.len() >= self.config.batch_size
        };
        if should_flush {
            self.flush().await;
        }
    }

    /// Soft cap at 4x batch size: on overflow, drop the oldest half and
    /// bump `trace_drops` rather than grow unbounded.
    fn apply_backpressure(&self, queue: &mut Vec<TraceEvent>) {
        let soft_cap = self.config.batch_size * 4;
        if queue.len() > soft_cap {
            let drop_count = queue.len() / 2;
            queue.drain(0..drop_count);
            self.trace_drops.fetch_add(drop_count as u64, Ordering::Relaxed);
            tracing::warn!(dropped = drop_count, "trace write buffer overflowed, dropping oldest half");
        }
    }

    /// Drains the write queue and persists it. Failure is logged and the
    /// batch discarded — tracing failures never propagate to callers.
    pub async fn flush(&self) {
        let batch: Vec<TraceEvent> = {
            let mut queue = self.write_queue.lock();
            std::mem::take(&mut *queue)
        };
        if batch.is_empty() {
            return;
        }
        if let Err(err) = self.storage.create_rag_traces(&batch).await {
            tracing::warn!(error = %err, count = batch.len(), "failed to persist trace batch, discarding");
        }
    }

    /// Stops the flush timer and performs one final flush. Called on
    /// graceful shutdown, before the storage client itself is released.
    pub async fn shutdown(&self) {
        if let Some(handle) = self.flush_task.lock().take() {
            handle.abort();
        }
        self.flush().await;
    }

    pub fn trace_drops(&self) -> u64 {
        self.trace_drops.load(Ordering::Relaxed)
    }

    pub fn set_persistence_enabled(&self, enabled: bool) {
        self.persistence_enabled.store(enabled, Ordering::Relaxed);
    }

    /// Events for `trace_id` from the in-memory ring, if still resident.
    /// Callers needing guaranteed durability should fall back to
    /// `StoragePort::get_rag_traces_by_trace_id`.
    pub fn recent_by_trace_id(&self, trace_id: &str) -> Vec<TraceEvent> {
        let mut events: Vec<TraceEvent> =
            self.ring.lock().iter().filter(|e| e.trace_id == trace_id).cloned().collect();
        events.sort_by_key(|e| e.timestamp);
        events
    }

    /// Recent traces in the ring, optionally filtered by type, most recent
    /// first. Used for cheap listing without hitting storage.
    pub fn recent(&self, trace_type: Option<TraceType>, limit: usize) -> Vec<TraceEvent> {
        self.ring
            .lock()
            .iter()
            .rev()
            .filter(|e| trace_type.map(|t| t == e.trace_type).unwrap_or(true))
            .take(limit)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::InMemoryStore;
    use crate::types::TraceType;

    fn event(trace_id: &str, stage: &str) -> TraceEvent {
        TraceEvent::new(trace_id, TraceType::Query, stage, 1)
    }

    #[test]
    fn trace_ids_are_unique_and_prefixed() {
        let a = generate_trace_id();
        let b = generate_trace_id();
        assert!(a.starts_with("rag-"));
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn ring_evicts_oldest_past_capacity() {
        let storage = Arc::new(InMemoryStore::new());
        let config = TraceBufferConfig { ring_capacity: 3, persistence_enabled: false, ..Default::default() };
        let buffer = TraceBuffer::new(storage, config);
        for i in 0..5 {
            buffer.record(event("t1", &format!("stage{}", i))).await;
        }
        let recent = buffer.recent(None, 10);
        assert_eq!(recent.len(), 3);
    }

    #[tokio::test]
    async fn flush_persists_queued_batch() {
        let storage = Arc::new(InMemoryStore::new());
        let config = TraceBufferConfig { batch_size: 100, persistence_enabled: true, ..Default::default() };
        let buffer = TraceBuffer::new(Arc::clone(&storage) as Arc<dyn StoragePort>, config);
        buffer.record(event("t1", "query_start")).await;
        buffer.record(event("t1", "query_complete")).await;
        buffer.flush().await;

        let stored = storage.get_rag_traces_by_trace_id("t1").await.unwrap();
        assert_eq!(stored.len(), 2);
    }

    #[tokio::test]
    async fn reaching_batch_size_triggers_immediate_flush() {
        let storage = Arc::new(InMemoryStore::new());
        let config = TraceBufferConfig { batch_size: 2, persistence_enabled: true, ..Default::default() };
        let buffer = TraceBuffer::new(Arc::clone(&storage) as Arc<dyn StoragePort>, config);
        buffer.record(event("t1", "a")).await;
        buffer.record(event("t1", "b")).await;

        let stored = storage.get_rag_traces_by_trace_id("t1").await.unwrap();
        assert_eq!(stored.len(), 2);
    }

    #[tokio::test]
    async fn disabled_persistence_never_writes() {
        let storage = Arc::new(InMemoryStore::new());
        let config = TraceBufferConfig { persistence_enabled: false, ..Default::default() };
        let buffer = TraceBuffer::new(Arc::clone(&storage) as Arc<dyn StoragePort>, config);
        buffer.record(event("t1", "a")).await;
        buffer.flush().await;
        let stored = storage.get_rag_traces_by_trace_id("t1").await.unwrap();
        assert!(stored.is_empty());
    }

    #[tokio::test]
    async fn backpressure_drops_oldest_half_past_soft_cap() {
        // Sequential `record()` calls always flush at `batch_size` before the
        // queue can reach the 4x soft cap, so exercise `apply_backpressure`
        // directly — it's the safety net for bursts that outrun a slow flush.
        let storage = Arc::new(InMemoryStore::new());
        let config = TraceBufferConfig { batch_size: 20, persistence_enabled: true, ..Default::default() };
        let buffer = TraceBuffer::new(storage, config);

        let mut queue: Vec<TraceEvent> = (0..90).map(|i| event("t1", &format!("s{}", i))).collect();
        buffer.apply_backpressure(&mut queue);

        assert_eq!(queue.len(), 45);
        assert_eq!(buffer.trace_drops(), 45);
    }
}

//! In-process retrieval-augmented generation engine.
//!
//! Three subsystems compose into the public [`orchestrator::RagEngine`]:
//! adaptive chunking + embedding + storage (ingestion), hybrid dense/sparse
//! search + re-ranking + token-budgeted synthesis (retrieval), and a
//! circular trace buffer + evaluator/auto-tuner (observability).

pub mod chunking;
pub mod config;
pub mod embedding;
pub mod error;
pub mod eval;
pub mod metrics;
pub mod orchestrator;
pub mod rerank;
pub mod search;
pub mod storage;
pub mod synth;
pub mod trace;
pub mod types;

pub use config::RagConfig;
pub use orchestrator::{
    CancellationToken, IngestOptions, IngestResult, RagEngine, RetrievalOutcome, RetrieveOptions,
};
pub use types::{Chunk, ChunkLineage, Document, FeedbackSignal, TraceEvent, TraceType};

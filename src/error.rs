//! Typed error taxonomy shared across pipeline stages.
//!
//! Every public operation returns a `Result` carrying one of these enums
//! rather than a boxed `anyhow::Error`, so callers can match on failure kind
//! (transient vs. fatal, retryable vs. not) instead of parsing a message.
//! Internal glue code still uses `anyhow` where the failure never crosses a
//! public boundary.

use thiserror::Error;

/// Chunking failed for the given strategy.
#[derive(Debug, Error)]
pub enum ChunkingError {
    #[error("unsupported mime type for strategy {strategy}: {mime_type}")]
    UnsupportedMimeType { strategy: String, mime_type: String },
    #[error("empty or whitespace-only document content")]
    EmptyContent,
    #[error("chunking strategy {strategy} failed: {reason}")]
    StrategyFailed { strategy: String, reason: String },
}

/// Embedding provider failure classification.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingErrorKind {
    /// Retryable: network blip, rate limit, timeout.
    #[error("transient")]
    Transient,
    /// Not retryable: malformed input, unsupported content.
    #[error("invalid")]
    Invalid,
    /// Not retryable without operator action: quota exhausted.
    #[error("quota")]
    Quota,
}

#[derive(Debug, Error)]
#[error("embedding error ({kind}): {message}")]
pub struct EmbeddingError {
    pub kind: EmbeddingErrorKind,
    pub message: String,
}

impl EmbeddingError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self { kind: EmbeddingErrorKind::Transient, message: message.into() }
    }
    pub fn invalid(message: impl Into<String>) -> Self {
        Self { kind: EmbeddingErrorKind::Invalid, message: message.into() }
    }
    pub fn quota(message: impl Into<String>) -> Self {
        Self { kind: EmbeddingErrorKind::Quota, message: message.into() }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind == EmbeddingErrorKind::Transient
    }
}

/// Storage backend failure classification.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum StorageErrorKind {
    #[error("transient")]
    Transient,
    #[error("constraint")]
    Constraint,
    #[error("unavailable")]
    Unavailable,
}

#[derive(Debug, Error)]
#[error("storage error ({kind}): {message}")]
pub struct StorageError {
    pub kind: StorageErrorKind,
    pub message: String,
}

impl StorageError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self { kind: StorageErrorKind::Transient, message: message.into() }
    }
    pub fn constraint(message: impl Into<String>) -> Self {
        Self { kind: StorageErrorKind::Constraint, message: message.into() }
    }
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self { kind: StorageErrorKind::Unavailable, message: message.into() }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind == StorageErrorKind::Transient
    }
}

/// Dense/hybrid search failure — always wraps a storage-layer cause.
#[derive(Debug, Error)]
#[error("search failed: {0}")]
pub struct SearchError(#[from] pub StorageError);

/// Re-ranking failure. Non-LLM strategies (MMR, recency, importance) cannot
/// fail; only the LLM strategy can, and callers are expected to degrade to
/// vector-only ordering rather than propagate this.
#[derive(Debug, Error)]
pub enum RerankError {
    #[error("llm re-rank call failed: {0}")]
    LlmUnavailable(String),
    #[error("llm re-rank timed out")]
    Timeout,
}

/// Context synthesis failure. LLM-backed strategies fall back to `truncate`
/// on any of these; this error never surfaces above the synthesizer.
#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("llm summarization failed: {0}")]
    LlmUnavailable(String),
    #[error("llm summarization timed out")]
    Timeout,
    #[error("single chunk exceeds token budget")]
    ChunkExceedsBudget,
}

/// Top-level error surfaced by the retrieval orchestrator's public API.
/// Carries the stage at which the pipeline short-circuited, per spec.md's
/// `START → EMBED → (SEARCH, BM25) → FUSE → RERANK → SYNTH → COMPLETE | ERROR(stage)`
/// state machine.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("chunking failed at ingest: {0}")]
    Chunking(#[from] ChunkingError),
    #[error("embedding failed at stage {stage}: {source}")]
    Embedding { stage: &'static str, source: EmbeddingError },
    #[error("search failed: {0}")]
    Search(#[from] SearchError),
    #[error("storage failed: {0}")]
    Storage(#[from] StorageError),
    #[error("operation cancelled")]
    Cancelled,
}

impl OrchestratorError {
    /// The pipeline stage this error occurred at, for the `error` trace event.
    pub fn stage(&self) -> &'static str {
        match self {
            OrchestratorError::Chunking(_) => "ingest",
            OrchestratorError::Embedding { stage, .. } => stage,
            OrchestratorError::Search(_) => "search",
            OrchestratorError::Storage(_) => "storage",
            OrchestratorError::Cancelled => "cancelled",
        }
    }
}

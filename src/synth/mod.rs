//! Context synthesizer: compresses retrieved, ranked chunks into a single
//! token-budgeted prompt context.
//!
//! Grounded in the teacher's deduplication pattern
//! (`RAGEngine::deduplicate_results`, Jaccard over whitespace-split word
//! sets) generalized to spec.md §4.7's five synthesis strategies, and its
//! `rag/context_compressor.rs` sentence-scoring approach for `extract`.
//! Token estimation is isolated behind a `TokenEstimator` port per
//! spec.md's redesign note (§9) so a real tokenizer can replace the
//! `chars/4` heuristic without touching callers.

use crate::error::SynthesisError;
use crate::types::Candidate;
use async_trait::async_trait;
use std::collections::HashSet;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynthStrategy {
    Truncate,
    Extract,
    Summarize,
    Hierarchical,
    Hybrid,
}

/// Isolates the `ceil(chars/4)` heuristic spec.md names, so a provider with
/// a real tokenizer can be swapped in without touching any synthesis code.
pub trait TokenEstimator: Send + Sync {
    fn estimate(&self, text: &str) -> usize;
}

pub struct CharsPerToken(pub usize);

impl Default for CharsPerToken {
    fn default() -> Self {
        Self(4)
    }
}

impl TokenEstimator for CharsPerToken {
    fn estimate(&self, text: &str) -> usize {
        let chars = text.chars().count();
        (chars + self.0 - 1) / self.0.max(1)
    }
}

/// The generative LLM behind `summarize`/`hierarchical`, an external
/// collaborator reached through this narrow interface only.
#[async_trait]
pub trait LlmSummarizer: Send + Sync {
    async fn summarize(&self, text: &str, budget_tokens: usize) -> Result<String, SynthesisError>;
}

#[derive(Debug, Clone)]
pub struct SynthOptions {
    pub strategy: SynthStrategy,
    pub max_tokens: usize,
    pub min_relevance: f32,
    pub dedup_threshold: f32,
}

impl Default for SynthOptions {
    fn default() -> Self {
        Self { strategy: SynthStrategy::Truncate, max_tokens: 4000, min_relevance: 0.3, dedup_threshold: 0.8 }
    }
}

#[derive(Debug, Clone)]
pub struct ContextSource {
    pub document_id: Uuid,
    pub chunk_index: u32,
    pub relevance: f32,
}

#[derive(Debug, Clone)]
pub struct SynthesizedContext {
    pub content: String,
    pub token_count: usize,
    pub source_chunk_count: usize,
    pub synthesized_chunk_count: usize,
    pub compression_ratio: f32,
    pub sources: Vec<ContextSource>,
}

impl SynthesizedContext {
    fn empty(source_chunk_count: usize) -> Self {
        Self {
            content: String::new(),
            token_count: 0,
            source_chunk_count,
            synthesized_chunk_count: 0,
            compression_ratio: 0.0,
            sources: Vec::new(),
        }
    }
}

fn tokenize_words(text: &str) -> HashSet<String> {
    text.to_lowercase().split_whitespace().map(|s| s.to_string()).collect()
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f32 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count() as f32;
    let union = a.union(b).count() as f32;
    if union == 0.0 {
        0.0
    } else {
        intersection / union
    }
}

/// Filters to `score >= min_relevance`, sorts descending, then drops any
/// candidate whose word-set Jaccard similarity with an already-kept,
/// higher-relevance candidate exceeds `threshold`. `threshold == 1.0` is a
/// no-op since similarity can never exceed 1.0.
fn filter_and_dedup(mut candidates: Vec<Candidate>, min_relevance: f32, dedup_threshold: f32) -> Vec<Candidate> {
    candidates.retain(|c| c.score >= min_relevance);
    candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

    let mut kept: Vec<Candidate> = Vec::with_capacity(candidates.len());
    let mut kept_tokens: Vec<HashSet<String>> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let tokens = tokenize_words(&candidate.chunk.content);
        let is_dup = kept_tokens.iter().any(|k| jaccard(&tokens, k) > dedup_threshold);
        if !is_dup {
            kept_tokens.push(tokens);
            kept.push(candidate);
        }
    }
    kept
}

fn source_of(candidate: &Candidate) -> ContextSource {
    ContextSource { document_id: candidate.chunk.document_id, chunk_index: candidate.chunk.chunk_index, relevance: candidate.score }
}

/// Greedy budget-respecting selection used by `truncate` and as the base
/// of `hybrid`: walks candidates in order, keeping a running chunk list
/// while the cumulative token estimate stays within `max_tokens`.
fn select_by_budget<'a>(candidates: &'a [Candidate], estimator: &dyn TokenEstimator, max_tokens: usize) -> Vec<&'a Candidate> {
    let mut selected = Vec::new();
    let mut used = 0usize;
    for candidate in candidates {
        let cost = estimator.estimate(&candidate.chunk.content);
        if used + cost > max_tokens {
            continue;
        }
        used += cost;
        selected.push(candidate);
    }
    selected
}

fn join_content(selected: &[&Candidate]) -> String {
    selected.iter().map(|c| c.chunk.content.as_str()).collect::<Vec<_>>().join("\n\n")
}

fn truncate_to_budget(text: String, estimator: &dyn TokenEstimator, max_tokens: usize) -> String {
    if estimator.estimate(&text) <= max_tokens {
        return text;
    }
    let max_chars = max_tokens.saturating_mul(4);
    text.chars().take(max_chars).collect()
}

fn split_sentences(text: &str) -> Vec<&str> {
    text.split_terminator(|c| c == '.' || c == '!' || c == '?')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect()
}

fn truncate_strategy(candidates: &[Candidate], estimator: &dyn TokenEstimator, max_tokens: usize) -> (String, Vec<ContextSource>) {
    let selected = select_by_budget(candidates, estimator, max_tokens);
    let sources = selected.iter().map(|c| source_of(c)).collect();
    (join_content(&selected), sources)
}

/// Sentence-level extraction: keep sentences that share at least one
/// "significant" query token (length > 3), walking candidates in
/// relevance order and stopping once the budget is spent.
fn extract_strategy(candidates: &[Candidate], query: &str, estimator: &dyn TokenEstimator, max_tokens: usize) -> (String, Vec<ContextSource>) {
    let query_tokens: HashSet<String> =
        query.to_lowercase().split_whitespace().filter(|w| w.len() > 3).map(|w| w.to_string()).collect();

    let mut picked_sentences: Vec<String> = Vec::new();
    let mut sources: Vec<ContextSource> = Vec::new();
    let mut used = 0usize;

    'candidates: for candidate in candidates {
        let mut contributed = false;
        for sentence in split_sentences(&candidate.chunk.content) {
            let sentence_tokens = tokenize_words(sentence);
            if query_tokens.is_empty() || sentence_tokens.iter().any(|t| query_tokens.contains(t)) {
                let cost = estimator.estimate(sentence);
                if used + cost > max_tokens {
                    break 'candidates;
                }
                used += cost;
                picked_sentences.push(sentence.to_string());
                contributed = true;
            }
        }
        if contributed {
            sources.push(source_of(candidate));
        }
    }

    (picked_sentences.join(". "), sources)
}

/// `summarize`: one LLM call over the joined candidate content, capped at
/// the token budget. Falls back to `truncate` on any summarizer failure.
async fn summarize_strategy(
    candidates: &[Candidate],
    summarizer: Option<&dyn LlmSummarizer>,
    estimator: &dyn TokenEstimator,
    max_tokens: usize,
) -> (String, Vec<ContextSource>) {
    let joined = join_content(&candidates.iter().collect::<Vec<_>>());
    let sources: Vec<ContextSource> = candidates.iter().map(source_of).collect();

    match summarizer {
        Some(llm) => match llm.summarize(&joined, max_tokens).await {
            Ok(summary) => (summary, sources),
            Err(err) => {
                tracing::warn!(error = %err, "summarize strategy fell back to truncate");
                truncate_strategy(candidates, estimator, max_tokens)
            }
        },
        None => truncate_strategy(candidates, estimator, max_tokens),
    }
}

const HIERARCHICAL_BATCH_SIZE: usize = 5;

/// `hierarchical`: when the combined content exceeds 2x budget, summarize
/// in batches of 5 then summarize the summaries. Any batch the summarizer
/// fails degrades to a raw prefix of that batch rather than dropping it;
/// if every batch fails, the whole strategy degrades to `truncate`.
async fn hierarchical_strategy(
    candidates: &[Candidate],
    summarizer: Option<&dyn LlmSummarizer>,
    estimator: &dyn TokenEstimator,
    max_tokens: usize,
) -> (String, Vec<ContextSource>) {
    let total_chars: usize = candidates.iter().map(|c| c.chunk.content.chars().count()).sum();
    if total_chars <= max_tokens.saturating_mul(4) * 2 {
        return summarize_strategy(candidates, summarizer, estimator, max_tokens).await;
    }

    let Some(llm) = summarizer else {
        return truncate_strategy(candidates, estimator, max_tokens);
    };

    let per_batch_budget = (max_tokens / HIERARCHICAL_BATCH_SIZE.max(1)).max(64);
    let mut batch_summaries: Vec<String> = Vec::new();
    let mut any_succeeded = false;

    for batch in candidates.chunks(HIERARCHICAL_BATCH_SIZE) {
        let joined = join_content(&batch.iter().collect::<Vec<_>>());
        match llm.summarize(&joined, per_batch_budget).await {
            Ok(summary) => {
                any_succeeded = true;
                batch_summaries.push(summary);
            }
            Err(err) => {
                tracing::warn!(error = %err, "hierarchical batch summary failed, degrading to raw prefix");
                batch_summaries.push(truncate_to_budget(joined, estimator, per_batch_budget));
            }
        }
    }

    if !any_succeeded {
        return truncate_strategy(candidates, estimator, max_tokens);
    }

    let sources: Vec<ContextSource> = candidates.iter().map(source_of).collect();
    let combined = batch_summaries.join("\n\n");
    match llm.summarize(&combined, max_tokens).await {
        Ok(final_summary) => (final_summary, sources),
        Err(err) => {
            tracing::warn!(error = %err, "summary-of-summaries failed, using joined batch summaries");
            (truncate_to_budget(combined, estimator, max_tokens), sources)
        }
    }
}

/// `hybrid`: over-truncate to 1.5x budget, then extract further if still
/// over, per spec.md §4.7.
fn hybrid_strategy(candidates: &[Candidate], query: &str, estimator: &dyn TokenEstimator, max_tokens: usize) -> (String, Vec<ContextSource>) {
    let over_budget = (max_tokens as f32 * 1.5) as usize;
    let selected = select_by_budget(candidates, estimator, over_budget);
    let subset: Vec<Candidate> = selected.into_iter().cloned().collect();

    let content = join_content(&subset.iter().collect::<Vec<_>>());
    if estimator.estimate(&content) <= max_tokens {
        let sources = subset.iter().map(source_of).collect();
        return (content, sources);
    }
    extract_strategy(&subset, query, estimator, max_tokens)
}

/// Synthesizes `candidates` into a single token-budgeted context.
/// Post-condition: `token_count <= options.max_tokens` always holds,
/// enforced by a final hard truncation regardless of which strategy ran.
pub async fn synthesize(
    candidates: Vec<Candidate>,
    query: &str,
    options: &SynthOptions,
    estimator: &dyn TokenEstimator,
    summarizer: Option<&dyn LlmSummarizer>,
) -> SynthesizedContext {
    let filtered = filter_and_dedup(candidates, options.min_relevance, options.dedup_threshold);
    let source_chunk_count = filtered.len();

    if filtered.is_empty() {
        return SynthesizedContext::empty(0);
    }

    let original_chars: usize = filtered.iter().map(|c| c.chunk.content.chars().count()).sum();

    let (content, sources) = match options.strategy {
        SynthStrategy::Truncate => truncate_strategy(&filtered, estimator, options.max_tokens),
        SynthStrategy::Extract => extract_strategy(&filtered, query, estimator, options.max_tokens),
        SynthStrategy::Summarize => summarize_strategy(&filtered, summarizer, estimator, options.max_tokens).await,
        SynthStrategy::Hierarchical => hierarchical_strategy(&filtered, summarizer, estimator, options.max_tokens).await,
        SynthStrategy::Hybrid => hybrid_strategy(&filtered, query, estimator, options.max_tokens),
    };

    let content = truncate_to_budget(content, estimator, options.max_tokens);
    let token_count = estimator.estimate(&content);

    if content.trim().is_empty() {
        return SynthesizedContext::empty(source_chunk_count);
    }

    let synthesized_chars = content.chars().count();
    let compression_ratio = if original_chars == 0 { 0.0 } else { synthesized_chars as f32 / original_chars as f32 };

    SynthesizedContext {
        content,
        token_count,
        source_chunk_count,
        synthesized_chunk_count: sources.len(),
        compression_ratio,
        sources,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Chunk, ChunkMetadata};
    use uuid::Uuid;

    fn candidate(text: &str, score: f32) -> Candidate {
        Candidate::new(
            Chunk {
                id: Uuid::new_v4(),
                document_id: Uuid::new_v4(),
                chunk_index: 0,
                content: text.into(),
                metadata: ChunkMetadata::default(),
                embedding: vec![],
            },
            score,
        )
    }

    #[tokio::test]
    async fn token_budget_is_respected_with_many_large_chunks() {
        let candidates: Vec<Candidate> =
            (0..10).map(|i| candidate(&format!("chunk{} {}", i, "x".repeat(995)), 0.9 - i as f32 * 0.01)).collect();
        let options = SynthOptions { max_tokens: 500, ..Default::default() };
        let estimator = CharsPerToken::default();
        let result = synthesize(candidates, "q", &options, &estimator, None).await;
        assert!(result.token_count <= 500);
        assert!(result.synthesized_chunk_count <= 2);
    }

    #[tokio::test]
    async fn single_chunk_exceeding_budget_is_empty_with_zero_compression() {
        let candidates = vec![candidate(&"x".repeat(10_000), 0.9)];
        let options = SynthOptions { max_tokens: 100, ..Default::default() };
        let estimator = CharsPerToken::default();
        let result = synthesize(candidates, "q", &options, &estimator, None).await;
        assert_eq!(result.synthesized_chunk_count, 0);
        assert_eq!(result.compression_ratio, 0.0);
    }

    #[tokio::test]
    async fn dedup_threshold_one_is_a_no_op() {
        let candidates = vec![candidate("alpha beta gamma delta", 0.9), candidate("alpha beta gamma delta", 0.8)];
        let options = SynthOptions { dedup_threshold: 1.0, max_tokens: 4000, ..Default::default() };
        let estimator = CharsPerToken::default();
        let result = synthesize(candidates, "q", &options, &estimator, None).await;
        assert_eq!(result.synthesized_chunk_count, 2);
    }

    #[tokio::test]
    async fn dedup_drops_near_duplicate_keeping_higher_relevance() {
        let candidates = vec![candidate("alpha beta gamma delta", 0.9), candidate("alpha beta gamma delta", 0.8)];
        let options = SynthOptions { dedup_threshold: 0.8, max_tokens: 4000, ..Default::default() };
        let estimator = CharsPerToken::default();
        let result = synthesize(candidates, "q", &options, &estimator, None).await;
        assert_eq!(result.synthesized_chunk_count, 1);
        assert!((result.sources[0].relevance - 0.9).abs() < 1e-6);
    }

    #[tokio::test]
    async fn below_min_relevance_is_filtered_out() {
        let candidates = vec![candidate("hello", 0.1)];
        let options = SynthOptions { min_relevance: 0.3, ..Default::default() };
        let estimator = CharsPerToken::default();
        let result = synthesize(candidates, "q", &options, &estimator, None).await;
        assert_eq!(result.synthesized_chunk_count, 0);
    }

    struct FailingSummarizer;

    #[async_trait]
    impl LlmSummarizer for FailingSummarizer {
        async fn summarize(&self, _text: &str, _budget_tokens: usize) -> Result<String, SynthesisError> {
            Err(SynthesisError::LlmUnavailable("down".into()))
        }
    }

    #[tokio::test]
    async fn summarize_falls_back_to_truncate_on_failure() {
        let candidates = vec![candidate("some retrievable content here", 0.9)];
        let options = SynthOptions { strategy: SynthStrategy::Summarize, max_tokens: 4000, ..Default::default() };
        let estimator = CharsPerToken::default();
        let result = synthesize(candidates, "q", &options, &estimator, Some(&FailingSummarizer)).await;
        assert!(result.content.contains("some retrievable content"));
    }

    #[test]
    fn chars_per_token_rounds_up() {
        let estimator = CharsPerToken::default();
        assert_eq!(estimator.estimate("abcd"), 1);
        assert_eq!(estimator.estimate("abcde"), 2);
    }
}

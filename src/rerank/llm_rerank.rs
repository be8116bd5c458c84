//! LLM-based re-scoring.
//!
//! Batches candidates 5 at a time, asks the LLM for a JSON array of
//! relevance scores in `[0, 1]`, and blends `0.7 * llm + 0.3 * original`.
//! Parsing is tolerant — JSON array match, then a float-sweep fallback over
//! the raw text, then a neutral `0.5` for every candidate in the batch —
//! carried directly from the teacher's `parse_ranking` three-tier strategy
//! in `reranking/llm_reranker.rs`, adapted from an ordering array to a
//! per-candidate score array.

use crate::error::RerankError;
use crate::types::Candidate;
use async_trait::async_trait;
use std::time::Duration;

const BATCH_SIZE: usize = 5;
const SNIPPET_CHARS: usize = 300;
const LLM_BLEND_WEIGHT: f32 = 0.7;
const LLM_TIMEOUT: Duration = Duration::from_secs(15);

/// The generative LLM is an external collaborator; this is the narrow
/// capability interface the reranker calls through.
#[async_trait]
pub trait LlmRerankProvider: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, RerankError>;
}

/// Re-score `candidates` against `query` via `provider`, blending each
/// batch's LLM scores into `candidate.score`. On any failure (unavailable,
/// timeout, unparseable output) the affected batch keeps its original
/// score unchanged rather than propagating an error — non-LLM rerank paths
/// must still be able to proceed.
pub async fn rerank(provider: &dyn LlmRerankProvider, query: &str, mut candidates: Vec<Candidate>) -> Vec<Candidate> {
    if candidates.len() <= 1 {
        return candidates;
    }

    for batch_start in (0..candidates.len()).step_by(BATCH_SIZE) {
        let batch_end = (batch_start + BATCH_SIZE).min(candidates.len());
        let batch = &mut candidates[batch_start..batch_end];
        let prompt = build_prompt(query, batch);

        let raw = match tokio::time::timeout(LLM_TIMEOUT, provider.complete(&prompt)).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "llm rerank batch call failed, keeping original scores");
                continue;
            }
            Err(_) => {
                tracing::warn!("llm rerank batch timed out, keeping original scores");
                continue;
            }
        };

        let scores = parse_scores(&raw, batch.len());
        for (candidate, llm_score) in batch.iter_mut().zip(scores) {
            candidate.score = LLM_BLEND_WEIGHT * llm_score + (1.0 - LLM_BLEND_WEIGHT) * candidate.original_score;
        }
    }

    candidates
}

fn build_prompt(query: &str, batch: &[Candidate]) -> String {
    let snippets: String = batch
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let truncated: String = c.chunk.content.chars().take(SNIPPET_CHARS).collect();
            format!("[{}] {}", i + 1, truncated)
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You are a search relevance judge. Given a user query and numbered document snippets, \
         score each snippet's relevance to the query from 0.0 (irrelevant) to 1.0 (highly relevant).\n\n\
         Query: \"{}\"\n\nSnippets:\n{}\n\n\
         Return ONLY a JSON array of {} scores in the same order as the snippets. \
         Example: [0.9, 0.2, 0.5]\nOutput ONLY the JSON array, nothing else.",
        query,
        snippets,
        batch.len()
    )
}

/// Three-tier tolerant parse: direct JSON array of floats, then a
/// `[...]`-substring parse, then a float sweep over the raw text. If none
/// yield the expected count, every candidate gets the neutral score 0.5.
fn parse_scores(output: &str, expected_count: usize) -> Vec<f32> {
    let trimmed = output.trim().trim_start_matches("```json").trim_start_matches("```").trim_end_matches("```").trim();

    if let Ok(scores) = serde_json::from_str::<Vec<f32>>(trimmed) {
        if scores.len() == expected_count {
            return scores.into_iter().map(clamp_unit).collect();
        }
    }

    if let Some(start) = trimmed.find('[') {
        if let Some(end) = trimmed[start..].find(']') {
            let slice = &trimmed[start..=start + end];
            if let Ok(scores) = serde_json::from_str::<Vec<f32>>(slice) {
                if scores.len() == expected_count {
                    return scores.into_iter().map(clamp_unit).collect();
                }
            }
        }
    }

    let floats: Vec<f32> = trimmed
        .split(|c: char| !(c.is_ascii_digit() || c == '.'))
        .filter_map(|s| s.parse::<f32>().ok())
        .filter(|f| (0.0..=1.0).contains(f))
        .collect();
    if floats.len() == expected_count {
        return floats;
    }

    vec![0.5; expected_count]
}

fn clamp_unit(v: f32) -> f32 {
    v.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_clean_json_array() {
        let scores = parse_scores("[0.9, 0.2, 0.5]", 3);
        assert_eq!(scores, vec![0.9, 0.2, 0.5]);
    }

    #[test]
    fn parses_json_with_code_fence() {
        let scores = parse_scores("```json\n[0.1, 0.8]\n```", 2);
        assert_eq!(scores, vec![0.1, 0.8]);
    }

    #[test]
    fn parses_array_embedded_in_prose() {
        let scores = parse_scores("Here are the scores: [0.3, 0.7, 0.9] as requested.", 3);
        assert_eq!(scores, vec![0.3, 0.7, 0.9]);
    }

    #[test]
    fn falls_back_to_float_sweep() {
        let scores = parse_scores("relevance 0.4, then 0.6", 2);
        assert_eq!(scores, vec![0.4, 0.6]);
    }

    #[test]
    fn falls_back_to_neutral_on_garbage() {
        let scores = parse_scores("I cannot help with that.", 3);
        assert_eq!(scores, vec![0.5, 0.5, 0.5]);
    }

    struct FailingProvider;

    #[async_trait]
    impl LlmRerankProvider for FailingProvider {
        async fn complete(&self, _prompt: &str) -> Result<String, RerankError> {
            Err(RerankError::LlmUnavailable("down".into()))
        }
    }

    #[tokio::test]
    async fn unavailable_provider_keeps_original_scores() {
        use crate::types::{Chunk, ChunkMetadata};
        use uuid::Uuid;

        let chunk = Chunk {
            id: Uuid::new_v4(),
            document_id: Uuid::new_v4(),
            chunk_index: 0,
            content: "hello".into(),
            metadata: ChunkMetadata::default(),
            embedding: vec![],
        };
        let candidates = vec![Candidate::new(chunk.clone(), 0.42), Candidate::new(chunk, 0.1)];
        let out = rerank(&FailingProvider, "q", candidates).await;
        assert_eq!(out[0].score, 0.42);
        assert_eq!(out[1].score, 0.1);
    }
}

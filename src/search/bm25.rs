//! Hand-rolled BM25 sparse scorer.
//!
//! Hand-written rather than routed through the `bm25` crate (used elsewhere
//! in the wider retrieval pack with different tuned defaults) because the
//! tokenizer and scoring formula here are fixed precisely, including the
//! query-term-duplicate behavior: ordered query terms are allowed to repeat,
//! and the formula sums their contribution additively rather than
//! deduplicating — an intentional, documented variant (see DESIGN.md).
//!
//! Structured the way `Bm25Index` in the wider pack separates corpus
//! statistics from per-query scoring, but the scorer body itself is
//! from-scratch per the fixed k1=1.2, b=0.75 formula.

use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;
use uuid::Uuid;

const K1: f32 = 1.2;
const B: f32 = 0.75;

fn word_splitter() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^\w]+").unwrap())
}

/// Lowercase, replace non-word runs with a single break, drop tokens of
/// length <= 2.
pub fn tokenize(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    word_splitter()
        .split(&lower)
        .filter(|t| t.len() > 2)
        .map(|t| t.to_string())
        .collect()
}

/// Corpus statistics computed once per read-only snapshot of the candidate
/// set; no shared mutation across queries.
pub struct Bm25Scorer {
    avg_doc_len: f32,
    doc_count: usize,
    doc_freq: HashMap<String, usize>,
    doc_term_freq: HashMap<Uuid, HashMap<String, usize>>,
    doc_len: HashMap<Uuid, usize>,
}

impl Bm25Scorer {
    /// `preprocessCorpus`: computes avgDocLength, per-term document
    /// frequency, and total doc count.
    pub fn build(corpus: &[(Uuid, &str)]) -> Self {
        let mut doc_freq: HashMap<String, usize> = HashMap::new();
        let mut doc_term_freq: HashMap<Uuid, HashMap<String, usize>> = HashMap::new();
        let mut doc_len: HashMap<Uuid, usize> = HashMap::new();
        let mut total_len = 0usize;

        for (id, text) in corpus {
            let tokens = tokenize(text);
            total_len += tokens.len();
            doc_len.insert(*id, tokens.len());

            let mut term_freq: HashMap<String, usize> = HashMap::new();
            for token in &tokens {
                *term_freq.entry(token.clone()).or_insert(0) += 1;
            }
            for term in term_freq.keys() {
                *doc_freq.entry(term.clone()).or_insert(0) += 1;
            }
            doc_term_freq.insert(*id, term_freq);
        }

        let doc_count = corpus.len();
        let avg_doc_len = if doc_count > 0 { total_len as f32 / doc_count as f32 } else { 0.0 };

        Self { avg_doc_len, doc_count, doc_freq, doc_term_freq, doc_len }
    }

    fn idf(&self, term: &str) -> f32 {
        let df = self.doc_freq.get(term).copied().unwrap_or(0) as f32;
        let n = self.doc_count as f32;
        ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
    }

    /// Score one document against a query. Query terms repeat as written —
    /// a repeated term contributes its full idf/tf term again each time it
    /// appears, rather than being counted once with a query-side weight.
    pub fn score(&self, query: &str, doc_id: Uuid) -> f32 {
        if self.doc_count == 0 {
            return 0.0;
        }
        let Some(term_freq) = self.doc_term_freq.get(&doc_id) else { return 0.0 };
        let doc_len = *self.doc_len.get(&doc_id).unwrap_or(&0) as f32;
        let query_tokens = tokenize(query);

        let mut score = 0.0f32;
        for term in &query_tokens {
            let tf = term_freq.get(term).copied().unwrap_or(0) as f32;
            if tf == 0.0 {
                continue;
            }
            let idf = self.idf(term);
            let denom = tf + K1 * (1.0 - B + B * doc_len / self.avg_doc_len.max(1e-6));
            score += idf * (tf * (K1 + 1.0)) / denom;
        }
        score
    }

    /// Score every document in the corpus this scorer was built from and
    /// return the top-k by descending score.
    pub fn search(&self, query: &str, top_k: usize) -> Vec<(Uuid, f32)> {
        let mut scored: Vec<(Uuid, f32)> = self
            .doc_term_freq
            .keys()
            .map(|id| (*id, self.score(query, *id)))
            .filter(|(_, s)| *s > 0.0)
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);
        scored
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizer_drops_short_tokens_and_lowercases() {
        let tokens = tokenize("The Fox! is, a sly-fox. An ox too.");
        assert!(!tokens.contains(&"is".to_string()));
        assert!(!tokens.contains(&"an".to_string()));
        assert!(tokens.contains(&"fox".to_string()));
        assert!(tokens.contains(&"sly".to_string()));
    }

    #[test]
    fn exact_keyword_match_outscores_unrelated_document() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let corpus = vec![(a, "the quick brown fox jumps"), (b, "mammalian quadruped species")];
        let scorer = Bm25Scorer::build(&corpus);
        let score_a = scorer.score("fox", a);
        let score_b = scorer.score("fox", b);
        assert!(score_a > score_b);
        assert_eq!(score_b, 0.0);
    }

    #[test]
    fn empty_corpus_scores_zero() {
        let scorer = Bm25Scorer::build(&[]);
        assert_eq!(scorer.score("anything", Uuid::new_v4()), 0.0);
        assert!(scorer.search("anything", 10).is_empty());
    }

    #[test]
    fn duplicate_query_terms_contribute_additively() {
        let a = Uuid::new_v4();
        let corpus = vec![(a, "fox fox fox forest trees")];
        let scorer = Bm25Scorer::build(&corpus);
        let once = scorer.score("fox", a);
        let twice = scorer.score("fox fox", a);
        assert!((twice - 2.0 * once).abs() < 1e-4);
    }
}

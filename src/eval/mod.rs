//! Evaluator & auto-tuner: retrieval quality metrics, LLM-response
//! analysis, and the closed-loop threshold adjustment spec.md §4.9
//! describes.
//!
//! Grounded in the teacher's `rag/eval.rs` metric machinery
//! (`evaluate_single`/`compute_ndcg`), narrowed to spec.md's
//! precision/recall/F1/MRR set; nDCG and hit-rate are kept as a
//! supplemental offline-evaluation submodule (`eval::offline`) since they
//! enrich the module without contradicting any invariant. Thresholds are
//! held behind a single `parking_lot::RwLock` — atomic reads, exclusive
//! write only through `auto_tune_thresholds` — matching spec.md §5's
//! concurrency note for this component.

use crate::types::{FeedbackPolarity, FeedbackSignal, RetrievalMetrics};
use chrono::{Duration, Utc};
use parking_lot::{Mutex, RwLock};
use std::collections::{HashSet, VecDeque};
use uuid::Uuid;

/// One retrieved chunk as seen by the evaluator: enough to check it
/// against ground truth by id, or heuristically against the query by text.
#[derive(Debug, Clone)]
pub struct RetrievedItem {
    pub chunk_id: Uuid,
    pub content: String,
}

#[derive(Debug, Clone, Copy)]
pub struct Thresholds {
    pub semantic: f32,
    pub keyword: f32,
}

const AUTO_TUNE_WINDOW_DAYS: i64 = 7;
const SEMANTIC_STEP: f32 = 0.05;
const SEMANTIC_CAP: f32 = 0.5;
const SEMANTIC_FLOOR: f32 = 0.15;

/// `analyze_llm_response`'s phrase lists — kept as plain string literals so
/// the checks read the way spec.md §4.9 lists them.
const NO_ANSWER_PHRASES: &[&str] =
    &["i don't know", "i do not know", "i'm not sure", "cannot find", "no information", "i am unable to"];
const CITATION_PHRASES: &[&str] = &["according to", "based on", "as mentioned in"];

#[derive(Debug, Clone, Copy)]
pub struct FeedbackAnalysis {
    pub sources_cited: bool,
    pub response_useful: bool,
    pub chunks_relevant: bool,
}

#[derive(Debug, Clone)]
pub struct EvaluationReport {
    pub period_days: u32,
    pub sample_count: usize,
    pub avg_precision: f32,
    pub avg_recall: f32,
    pub avg_f1: f32,
    pub avg_mrr: f32,
    pub recommendations: Vec<String>,
}

/// Retrieval quality tracker and closed-loop threshold tuner. Thresholds
/// are process-local and reset on restart (spec.md §9 open question: no
/// durable store for tuned parameters is specified).
pub struct Evaluator {
    recent_metrics: Mutex<VecDeque<RetrievalMetrics>>,
    feedback: Mutex<Vec<FeedbackSignal>>,
    thresholds: RwLock<Thresholds>,
}

impl Evaluator {
    pub fn new(initial: Thresholds) -> Self {
        Self { recent_metrics: Mutex::new(VecDeque::new()), feedback: Mutex::new(Vec::new()), thresholds: RwLock::new(initial) }
    }

    pub fn thresholds(&self) -> Thresholds {
        *self.thresholds.read()
    }

    /// Computes precision/recall/F1/MRR for one query's retrieved set, and
    /// records the result into the rolling window `auto_tune_thresholds`
    /// reads from.
    ///
    /// With `ground_truth`: precision = |ret∩rel|/|ret|, recall =
    /// |ret∩rel|/|rel|, F1 the harmonic mean, MRR = 1/(rank of first
    /// relevant) or 0.
    ///
    /// Without it, a heuristic stands in: per-chunk relevance is the
    /// fraction of query keywords (length > 3) present in the chunk's
    /// text; precision is the mean relevance, recall is half of precision,
    /// and MRR is also the mean relevance.
    pub fn evaluate_retrieval(&self, query: &str, retrieved: &[RetrievedItem], ground_truth: Option<&HashSet<Uuid>>) -> RetrievalMetrics {
        let metrics = match ground_truth {
            Some(relevant) => evaluate_with_ground_truth(retrieved, relevant),
            None => evaluate_heuristic(query, retrieved),
        };

        let record = RetrievalMetrics {
            query: query.to_string(),
            precision: metrics.0,
            recall: metrics.1,
            f1: metrics.2,
            mrr: metrics.3,
            results_count: retrieved.len(),
            timestamp: Utc::now(),
        };

        self.recent_metrics.lock().push_back(record.clone());
        record
    }

    /// `[Source:`, a bracketed citation, or one of the citation phrases;
    /// response length > 50 with no "I don't know"-style phrase; any
    /// chunk's 3-word phrase (length > 15 chars) appearing verbatim
    /// (case-insensitive) in the response.
    pub fn analyze_llm_response(&self, chunks: &[String], response: &str) -> FeedbackAnalysis {
        let lower = response.to_lowercase();

        let sources_cited = lower.contains("[source:")
            || has_bracketed_citation(response)
            || CITATION_PHRASES.iter().any(|p| lower.contains(p));

        let response_useful = response.len() > 50 && !NO_ANSWER_PHRASES.iter().any(|p| lower.contains(p));

        let chunks_relevant = chunks.iter().any(|chunk| three_word_phrase_overlaps(chunk, &lower));

        FeedbackAnalysis { sources_cited, response_useful, chunks_relevant }
    }

    pub fn record_feedback(&self, signal: FeedbackSignal) {
        self.feedback.lock().push(signal);
    }

    /// Adjusts `semanticThreshold` from the last 7 days of recorded
    /// metrics: precision below 0.5 raises it (capped at 0.5); low recall
    /// with healthy precision (> 0.7) lowers it (floored at 0.15).
    /// A no-op whenever precision and recall both sit in `[0.5, 0.7]`.
    pub fn auto_tune_thresholds(&self) -> Thresholds {
        let cutoff = Utc::now() - Duration::days(AUTO_TUNE_WINDOW_DAYS);
        let window: Vec<RetrievalMetrics> = self.recent_metrics.lock().iter().filter(|m| m.timestamp >= cutoff).cloned().collect();

        if window.is_empty() {
            return self.thresholds();
        }

        let n = window.len() as f32;
        let avg_precision = window.iter().map(|m| m.precision).sum::<f32>() / n;
        let avg_recall = window.iter().map(|m| m.recall).sum::<f32>() / n;

        let mut thresholds = self.thresholds.write();
        if avg_precision < 0.5 {
            thresholds.semantic = (thresholds.semantic + SEMANTIC_STEP).min(SEMANTIC_CAP);
        } else if avg_recall < 0.5 && avg_precision > 0.7 {
            thresholds.semantic = (thresholds.semantic - SEMANTIC_STEP).max(SEMANTIC_FLOOR);
        }
        *thresholds
    }

    /// Averages over the trailing `period_days` window, with the same
    /// threshold-condition text `auto_tune_thresholds` acts on.
    pub fn generate_report(&self, period_days: u32) -> EvaluationReport {
        let cutoff = Utc::now() - Duration::days(period_days as i64);
        let window: Vec<RetrievalMetrics> = self.recent_metrics.lock().iter().filter(|m| m.timestamp >= cutoff).cloned().collect();

        if window.is_empty() {
            return EvaluationReport {
                period_days,
                sample_count: 0,
                avg_precision: 0.0,
                avg_recall: 0.0,
                avg_f1: 0.0,
                avg_mrr: 0.0,
                recommendations: vec!["no retrieval metrics recorded in this window".to_string()],
            };
        }

        let n = window.len() as f32;
        let avg_precision = window.iter().map(|m| m.precision).sum::<f32>() / n;
        let avg_recall = window.iter().map(|m| m.recall).sum::<f32>() / n;
        let avg_f1 = window.iter().map(|m| m.f1).sum::<f32>() / n;
        let avg_mrr = window.iter().map(|m| m.mrr).sum::<f32>() / n;

        let mut recommendations = Vec::new();
        if avg_precision < 0.5 {
            recommendations.push("precision below 0.5: consider raising semanticThreshold".to_string());
        }
        if avg_recall < 0.5 && avg_precision > 0.7 {
            recommendations.push("recall below 0.5 with healthy precision: consider lowering semanticThreshold".to_string());
        }
        if recommendations.is_empty() {
            recommendations.push("precision and recall within target range, no adjustment recommended".to_string());
        }

        EvaluationReport { period_days, sample_count: window.len(), avg_precision, avg_recall, avg_f1, avg_mrr, recommendations }
    }
}

fn harmonic(precision: f32, recall: f32) -> f32 {
    if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    }
}

fn evaluate_with_ground_truth(retrieved: &[RetrievedItem], relevant: &HashSet<Uuid>) -> (f32, f32, f32, f32) {
    if retrieved.is_empty() {
        return (0.0, 0.0, 0.0, 0.0);
    }
    let hit_count = retrieved.iter().filter(|r| relevant.contains(&r.chunk_id)).count() as f32;
    let precision = hit_count / retrieved.len() as f32;
    let recall = if relevant.is_empty() { 0.0 } else { hit_count / relevant.len() as f32 };
    let f1 = harmonic(precision, recall);
    let mrr = retrieved
        .iter()
        .position(|r| relevant.contains(&r.chunk_id))
        .map(|idx| 1.0 / (idx as f32 + 1.0))
        .unwrap_or(0.0);
    (precision, recall, f1, mrr)
}

fn evaluate_heuristic(query: &str, retrieved: &[RetrievedItem]) -> (f32, f32, f32, f32) {
    let keywords: Vec<String> = query.to_lowercase().split_whitespace().filter(|w| w.len() > 3).map(|w| w.to_string()).collect();
    if retrieved.is_empty() || keywords.is_empty() {
        return (0.0, 0.0, 0.0, 0.0);
    }

    let relevances: Vec<f32> = retrieved
        .iter()
        .map(|item| {
            let lower = item.content.to_lowercase();
            let present = keywords.iter().filter(|k| lower.contains(k.as_str())).count();
            present as f32 / keywords.len() as f32
        })
        .collect();

    let precision = relevances.iter().sum::<f32>() / relevances.len() as f32;
    let recall = 0.5 * precision;
    let f1 = harmonic(precision, recall);
    let mrr = precision;
    (precision, recall, f1, mrr)
}

fn has_bracketed_citation(response: &str) -> bool {
    let mut in_bracket = false;
    let mut body_len = 0usize;
    for ch in response.chars() {
        match ch {
            '[' => {
                in_bracket = true;
                body_len = 0;
            }
            ']' if in_bracket => {
                if body_len > 0 {
                    return true;
                }
                in_bracket = false;
            }
            _ if in_bracket => body_len += 1,
            _ => {}
        }
    }
    false
}

fn three_word_phrase_overlaps(chunk: &str, response_lower: &str) -> bool {
    let words: Vec<&str> = chunk.split_whitespace().collect();
    if words.len() < 3 {
        return false;
    }
    for window in words.windows(3) {
        let phrase = window.join(" ");
        if phrase.len() > 15 && response_lower.contains(&phrase.to_lowercase()) {
            return true;
        }
    }
    false
}

pub fn polarity_from_str(s: &str) -> Option<FeedbackPolarity> {
    match s {
        "pos" | "positive" => Some(FeedbackPolarity::Positive),
        "neg" | "negative" => Some(FeedbackPolarity::Negative),
        "neu" | "neutral" => Some(FeedbackPolarity::Neutral),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: Uuid, content: &str) -> RetrievedItem {
        RetrievedItem { chunk_id: id, content: content.to_string() }
    }

    #[test]
    fn ground_truth_precision_recall_mrr() {
        let evaluator = Evaluator::new(Thresholds { semantic: 0.25, keyword: 0.1 });
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        let relevant: HashSet<Uuid> = [a, c].into_iter().collect();
        let retrieved = vec![item(b, "x"), item(a, "y"), item(c, "z")];

        let metrics = evaluator.evaluate_retrieval("q", &retrieved, Some(&relevant));
        assert!((metrics.precision - 2.0 / 3.0).abs() < 1e-6);
        assert!((metrics.recall - 1.0).abs() < 1e-6);
        assert!((metrics.mrr - 0.5).abs() < 1e-6); // first relevant (a) at rank 2
    }

    #[test]
    fn heuristic_without_ground_truth() {
        let evaluator = Evaluator::new(Thresholds { semantic: 0.25, keyword: 0.1 });
        let retrieved = vec![item(Uuid::new_v4(), "retrieval combines generation models")];
        let metrics = evaluator.evaluate_retrieval("what is retrieval generation", &retrieved, None);
        assert!(metrics.precision > 0.0);
        assert!((metrics.recall - 0.5 * metrics.precision).abs() < 1e-6);
    }

    #[test]
    fn auto_tune_raises_threshold_on_low_precision() {
        let evaluator = Evaluator::new(Thresholds { semantic: 0.25, keyword: 0.1 });
        for _ in 0..10 {
            evaluator.recent_metrics.lock().push_back(RetrievalMetrics {
                query: "q".into(),
                precision: 0.3,
                recall: 0.6,
                f1: 0.4,
                mrr: 0.3,
                results_count: 3,
                timestamp: Utc::now(),
            });
        }
        let tuned = evaluator.auto_tune_thresholds();
        assert!((tuned.semantic - 0.30).abs() < 1e-6);
    }

    #[test]
    fn auto_tune_is_a_no_op_in_healthy_range() {
        let evaluator = Evaluator::new(Thresholds { semantic: 0.25, keyword: 0.1 });
        for _ in 0..5 {
            evaluator.recent_metrics.lock().push_back(RetrievalMetrics {
                query: "q".into(),
                precision: 0.6,
                recall: 0.6,
                f1: 0.6,
                mrr: 0.6,
                results_count: 3,
                timestamp: Utc::now(),
            });
        }
        let tuned = evaluator.auto_tune_thresholds();
        assert!((tuned.semantic - 0.25).abs() < 1e-6);
    }

    #[test]
    fn analyze_response_detects_citation_and_usefulness() {
        let evaluator = Evaluator::new(Thresholds { semantic: 0.25, keyword: 0.1 });
        let chunks = vec!["the retrieval augmented generation pipeline combines dense and sparse search".to_string()];
        let response = "Based on the retrieval augmented generation pipeline, RAG improves factual grounding considerably.";
        let analysis = evaluator.analyze_llm_response(&chunks, response);
        assert!(analysis.sources_cited);
        assert!(analysis.response_useful);
        assert!(analysis.chunks_relevant);
    }

    #[test]
    fn analyze_response_flags_unhelpful_short_answer() {
        let evaluator = Evaluator::new(Thresholds { semantic: 0.25, keyword: 0.1 });
        let analysis = evaluator.analyze_llm_response(&[], "I don't know.");
        assert!(!analysis.response_useful);
    }
}

/// Supplemental offline-evaluation harness: nDCG and hit-rate alongside
/// precision/recall/MRR, for labeled query/document evaluation sets run
/// outside the live retrieval path. Enriches the evaluator without
/// contradicting spec.md's online metrics.
pub mod offline {
    use serde::{Deserialize, Serialize};
    use std::collections::{HashMap, HashSet};

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct EvalQuery {
        pub query: String,
        pub relevant_ids: HashSet<String>,
        #[serde(default)]
        pub graded_relevance: HashMap<String, f32>,
    }

    #[derive(Debug, Clone)]
    pub struct EvalResult {
        pub id: String,
        pub score: f32,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct EvalMetrics {
        pub num_queries: usize,
        pub mrr: f64,
        pub recall_at: HashMap<usize, f64>,
        pub precision_at: HashMap<usize, f64>,
        pub ndcg_at: HashMap<usize, f64>,
        pub hit_rate_at: HashMap<usize, f64>,
        pub per_query: Vec<QueryMetrics>,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct QueryMetrics {
        pub query: String,
        pub reciprocal_rank: f64,
        pub recall_at_k: HashMap<usize, f64>,
        pub precision_at_k: HashMap<usize, f64>,
        pub ndcg_at_k: HashMap<usize, f64>,
        pub num_relevant: usize,
        pub num_retrieved_relevant: usize,
    }

    pub fn evaluate<F>(eval_set: &[EvalQuery], k_values: &[usize], mut results_fn: F) -> EvalMetrics
    where
        F: FnMut(&str) -> Vec<EvalResult>,
    {
        let mut per_query = Vec::with_capacity(eval_set.len());
        let mut mrr_sum = 0.0;
        let mut recall_sums: HashMap<usize, f64> = k_values.iter().map(|&k| (k, 0.0)).collect();
        let mut precision_sums: HashMap<usize, f64> = k_values.iter().map(|&k| (k, 0.0)).collect();
        let mut ndcg_sums: HashMap<usize, f64> = k_values.iter().map(|&k| (k, 0.0)).collect();
        let mut hit_sums: HashMap<usize, f64> = k_values.iter().map(|&k| (k, 0.0)).collect();

        for eval_query in eval_set {
            let results = results_fn(&eval_query.query);
            let qm = evaluate_single(eval_query, &results, k_values);

            mrr_sum += qm.reciprocal_rank;
            for &k in k_values {
                if let Some(&v) = qm.recall_at_k.get(&k) {
                    *recall_sums.get_mut(&k).unwrap() += v;
                }
                if let Some(&v) = qm.precision_at_k.get(&k) {
                    *precision_sums.get_mut(&k).unwrap() += v;
                }
                if let Some(&v) = qm.ndcg_at_k.get(&k) {
                    *ndcg_sums.get_mut(&k).unwrap() += v;
                }
                if qm.recall_at_k.get(&k).copied().unwrap_or(0.0) > 0.0 {
                    *hit_sums.get_mut(&k).unwrap() += 1.0;
                }
            }

            per_query.push(qm);
        }

        let n = eval_set.len().max(1) as f64;

        EvalMetrics {
            num_queries: eval_set.len(),
            mrr: mrr_sum / n,
            recall_at: recall_sums.into_iter().map(|(k, v)| (k, v / n)).collect(),
            precision_at: precision_sums.into_iter().map(|(k, v)| (k, v / n)).collect(),
            ndcg_at: ndcg_sums.into_iter().map(|(k, v)| (k, v / n)).collect(),
            hit_rate_at: hit_sums.into_iter().map(|(k, v)| (k, v / n)).collect(),
            per_query,
        }
    }

    fn evaluate_single(eval_query: &EvalQuery, results: &[EvalResult], k_values: &[usize]) -> QueryMetrics {
        let use_graded = !eval_query.graded_relevance.is_empty();
        let num_relevant = if use_graded { eval_query.graded_relevance.len() } else { eval_query.relevant_ids.len() };

        let reciprocal_rank = results
            .iter()
            .enumerate()
            .find(|(_, r)| is_relevant(r, eval_query))
            .map(|(idx, _)| 1.0 / (idx + 1) as f64)
            .unwrap_or(0.0);

        let mut recall_at_k = HashMap::new();
        let mut precision_at_k = HashMap::new();
        let mut ndcg_at_k = HashMap::new();
        let mut num_retrieved_relevant = 0;

        for &k in k_values {
            let top_k = &results[..results.len().min(k)];
            let relevant_in_k = top_k.iter().filter(|r| is_relevant(r, eval_query)).count();

            let recall = if num_relevant > 0 { relevant_in_k as f64 / num_relevant as f64 } else { 0.0 };
            recall_at_k.insert(k, recall);

            let precision = relevant_in_k as f64 / top_k.len().max(1) as f64;
            precision_at_k.insert(k, precision);

            ndcg_at_k.insert(k, compute_ndcg(top_k, eval_query, k));

            if k == *k_values.iter().max().unwrap_or(&0) {
                num_retrieved_relevant = relevant_in_k;
            }
        }

        QueryMetrics {
            query: eval_query.query.clone(),
            reciprocal_rank,
            recall_at_k,
            precision_at_k,
            ndcg_at_k,
            num_relevant,
            num_retrieved_relevant,
        }
    }

    fn is_relevant(result: &EvalResult, eval_query: &EvalQuery) -> bool {
        if !eval_query.graded_relevance.is_empty() {
            eval_query.graded_relevance.get(&result.id).copied().unwrap_or(0.0) > 0.0
        } else {
            eval_query.relevant_ids.contains(&result.id)
        }
    }

    fn relevance_score(result: &EvalResult, eval_query: &EvalQuery) -> f64 {
        if !eval_query.graded_relevance.is_empty() {
            eval_query.graded_relevance.get(&result.id).copied().unwrap_or(0.0) as f64
        } else if eval_query.relevant_ids.contains(&result.id) {
            1.0
        } else {
            0.0
        }
    }

    fn compute_ndcg(results: &[EvalResult], eval_query: &EvalQuery, k: usize) -> f64 {
        let top_k = &results[..results.len().min(k)];
        let dcg: f64 = top_k.iter().enumerate().map(|(i, r)| relevance_score(r, eval_query) / (i as f64 + 2.0).log2()).sum();

        let mut ideal_scores: Vec<f64> = if !eval_query.graded_relevance.is_empty() {
            eval_query.graded_relevance.values().map(|&v| v as f64).collect()
        } else {
            vec![1.0; eval_query.relevant_ids.len()]
        };
        ideal_scores.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
        ideal_scores.truncate(k);

        let idcg: f64 = ideal_scores.iter().enumerate().map(|(i, &rel)| rel / (i as f64 + 2.0).log2()).sum();
        if idcg > 0.0 {
            dcg / idcg
        } else {
            0.0
        }
    }

    pub fn format_report(metrics: &EvalMetrics) -> String {
        let mut report = String::new();
        report.push_str(&format!("=== Retrieval Evaluation Report ({} queries) ===\n\n", metrics.num_queries));
        report.push_str(&format!("MRR: {:.4}\n\n", metrics.mrr));

        let mut k_values: Vec<usize> = metrics.recall_at.keys().copied().collect();
        k_values.sort();

        report.push_str("| K  | Recall | Precision | nDCG   | Hit Rate |\n");
        report.push_str("|----|--------|-----------|--------|----------|\n");
        for &k in &k_values {
            let recall = metrics.recall_at.get(&k).copied().unwrap_or(0.0);
            let precision = metrics.precision_at.get(&k).copied().unwrap_or(0.0);
            let ndcg = metrics.ndcg_at.get(&k).copied().unwrap_or(0.0);
            let hit_rate = metrics.hit_rate_at.get(&k).copied().unwrap_or(0.0);
            report.push_str(&format!("| {:2} | {:.4} | {:.4}    | {:.4} | {:.4}   |\n", k, recall, precision, ndcg, hit_rate));
        }

        let failed: Vec<&QueryMetrics> = metrics.per_query.iter().filter(|q| q.reciprocal_rank == 0.0).collect();
        if !failed.is_empty() {
            report.push_str(&format!("\n--- Failed queries ({}/{}) ---\n", failed.len(), metrics.num_queries));
            for q in &failed {
                report.push_str(&format!("  - \"{}\" (expected {} relevant docs)\n", q.query, q.num_relevant));
            }
        }

        report
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        fn make_results(ids: &[&str]) -> Vec<EvalResult> {
            ids.iter().enumerate().map(|(i, &id)| EvalResult { id: id.to_string(), score: 1.0 - i as f32 * 0.1 }).collect()
        }

        #[test]
        fn perfect_retrieval() {
            let eval_set = vec![EvalQuery {
                query: "test query".to_string(),
                relevant_ids: HashSet::from(["a".to_string(), "b".to_string()]),
                graded_relevance: HashMap::new(),
            }];

            let metrics = evaluate(&eval_set, &[1, 3, 5], |_| make_results(&["a", "b", "c", "d", "e"]));

            assert_eq!(metrics.mrr, 1.0);
            assert_eq!(*metrics.recall_at.get(&1).unwrap(), 0.5);
            assert_eq!(*metrics.recall_at.get(&3).unwrap(), 1.0);
            assert_eq!(*metrics.precision_at.get(&1).unwrap(), 1.0);
            assert!(*metrics.hit_rate_at.get(&1).unwrap() > 0.99);
        }

        #[test]
        fn no_relevant_found() {
            let eval_set = vec![EvalQuery {
                query: "missing query".to_string(),
                relevant_ids: HashSet::from(["x".to_string()]),
                graded_relevance: HashMap::new(),
            }];

            let metrics = evaluate(&eval_set, &[1, 5], |_| make_results(&["a", "b", "c", "d", "e"]));

            assert_eq!(metrics.mrr, 0.0);
            assert_eq!(*metrics.recall_at.get(&5).unwrap(), 0.0);
            assert_eq!(*metrics.hit_rate_at.get(&5).unwrap(), 0.0);
        }

        #[test]
        fn graded_relevance_ndcg() {
            let mut graded = HashMap::new();
            graded.insert("a".to_string(), 1.0);
            graded.insert("b".to_string(), 0.5);
            graded.insert("c".to_string(), 0.25);

            let eval_set = vec![EvalQuery { query: "graded test".to_string(), relevant_ids: HashSet::new(), graded_relevance: graded }];

            let metrics = evaluate(&eval_set, &[3], |_| make_results(&["a", "b", "c"]));
            assert!((*metrics.ndcg_at.get(&3).unwrap() - 1.0).abs() < 1e-10);
        }

        #[test]
        fn format_report_no_panic() {
            let eval_set = vec![EvalQuery {
                query: "test".to_string(),
                relevant_ids: HashSet::from(["a".to_string()]),
                graded_relevance: HashMap::new(),
            }];

            let metrics = evaluate(&eval_set, &[1, 3, 5, 10], |_| make_results(&["b", "a", "c"]));
            let report = format_report(&metrics);
            assert!(report.contains("MRR"));
            assert!(report.contains("Recall"));
        }
    }
}

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level configuration, following the shape of spec.md's enumerated
/// configuration table. Grouped into sub-structs the way the teacher's
/// `RAGConfig` groups `embedding`/`chunking`/`search`/`features`, but with
/// the field set widened to cover tracing, fusion, and re-rank weights.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagConfig {
    pub trace: TraceConfig,
    pub search: SearchConfig,
    pub rerank: RerankConfig,
    pub synth: SynthConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceConfig {
    pub enabled: bool,
    pub persistence: bool,
    pub batch_size: usize,
    pub flush_interval_ms: u64,
    pub buffer_size: usize,
    pub retention_days: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    pub semantic_threshold: f32,
    pub top_k: usize,
    pub semantic_weight: f32,
    pub keyword_weight: f32,
    pub use_hybrid_search: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankConfig {
    pub use_reranking: bool,
    pub diversity_weight: f32,
    pub recency_weight: f32,
    pub importance_weight: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthConfig {
    pub max_tokens: usize,
    pub min_relevance: f32,
}

impl RagConfig {
    /// Validate config values, returning errors for clearly broken configurations.
    pub fn validate(&self) -> Result<(), String> {
        if self.trace.batch_size == 0 {
            return Err("trace.batch_size must be > 0".into());
        }
        if self.trace.buffer_size == 0 {
            return Err("trace.buffer_size must be > 0".into());
        }
        if !(0.0..=1.0).contains(&self.search.semantic_threshold) {
            return Err("search.semantic_threshold must be in [0.0, 1.0]".into());
        }
        if self.search.top_k == 0 {
            return Err("search.top_k must be > 0".into());
        }
        if (self.search.semantic_weight + self.search.keyword_weight - 1.0).abs() > 1e-3 {
            return Err("search.semantic_weight + search.keyword_weight must sum to 1.0".into());
        }
        if !(0.0..=1.0).contains(&self.rerank.diversity_weight) {
            return Err("rerank.diversity_weight must be in [0.0, 1.0]".into());
        }
        if self.synth.max_tokens == 0 {
            return Err("synth.max_tokens must be > 0".into());
        }
        Ok(())
    }

    /// Load config from a JSON file; callers fall back to `Default` on
    /// missing file per the teacher's `from_file` convention.
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read config file: {}", e))?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| format!("failed to parse config: {}", e))?;
        config.validate()?;
        Ok(config)
    }
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            trace: TraceConfig {
                enabled: true,
                persistence: true,
                batch_size: 20,
                flush_interval_ms: 5_000,
                buffer_size: 200,
                retention_days: 30,
            },
            search: SearchConfig {
                semantic_threshold: 0.25,
                top_k: 20,
                semantic_weight: 0.7,
                keyword_weight: 0.3,
                use_hybrid_search: true,
            },
            rerank: RerankConfig {
                use_reranking: true,
                diversity_weight: 0.2,
                recency_weight: 0.1,
                importance_weight: 0.1,
            },
            synth: SynthConfig { max_tokens: 4000, min_relevance: 0.3 },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(RagConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_unbalanced_fusion_weights() {
        let mut cfg = RagConfig::default();
        cfg.search.semantic_weight = 0.9;
        cfg.search.keyword_weight = 0.3;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_zero_batch_size() {
        let mut cfg = RagConfig::default();
        cfg.trace.batch_size = 0;
        assert!(cfg.validate().is_err());
    }
}

use common::utils::config::AppConfig;
use serde::{Deserialize, Serialize};

/// Tunable parameters that govern each retrieval stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalTuning {
    /// Candidates fetched from the embedding index before reranking.
    pub top_k: usize,
    /// Chunks kept after reranking.
    pub final_k: usize,
    pub bm25_k1: f32,
    pub bm25_b: f32,
}

impl Default for RetrievalTuning {
    fn default() -> Self {
        Self {
            top_k: 5,
            final_k: 3,
            bm25_k1: 1.5,
            bm25_b: 0.75,
        }
    }
}

impl RetrievalTuning {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            top_k: config.retrieval_top_k,
            final_k: config.retrieval_final_k,
            ..Self::default()
        }
    }

    /// Over-fetch size for a request asking for `top_k` candidates.
    pub fn fetch_size(&self, top_k: usize) -> usize {
        top_k.max(self.final_k)
    }
}

pub mod index;
pub mod pipeline;
pub mod reranking;
pub mod scoring;

use std::sync::Arc;

use common::{error::AppError, storage::types::text_chunk::TextChunk};
use index::EmbeddingIndex;
use reranking::Bm25Reranker;
use scoring::Scored;
use tracing::{debug, instrument, warn};

pub use pipeline::RetrievalTuning;

// Captures a grounding chunk plus its lexical score for downstream prompts.
#[derive(Debug, Clone)]
pub struct RetrievedChunk {
    pub chunk: TextChunk,
    pub score: f32,
    /// Cosine similarity the chunk had in the vector stage.
    pub similarity: f32,
}

/// Vector candidate generation followed by BM25 reranking over the candidates.
pub struct HybridRetriever {
    index: Arc<EmbeddingIndex>,
    reranker: Bm25Reranker,
    tuning: RetrievalTuning,
}

impl HybridRetriever {
    pub fn new(index: Arc<EmbeddingIndex>, tuning: RetrievalTuning) -> Self {
        Self {
            index,
            reranker: Bm25Reranker::new(tuning.bm25_k1, tuning.bm25_b),
            tuning,
        }
    }

    pub fn index(&self) -> &Arc<EmbeddingIndex> {
        &self.index
    }

    /// Best-first grounding texts, at most `final_k` of them, drawn from the
    /// configured `top_k` candidates. Never fails: an empty index or an
    /// unreachable embedding service yields no context.
    pub async fn retrieve(&self, query: &str) -> Vec<String> {
        match self.retrieve_scored(query, self.tuning.top_k).await {
            Ok(chunks) => chunks.into_iter().map(|c| c.chunk.text).collect(),
            Err(err) => {
                warn!(error = %err, "retrieval failed, continuing without context");
                Vec::new()
            }
        }
    }

    #[instrument(skip_all, fields(top_k))]
    pub async fn retrieve_scored(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<RetrievedChunk>, AppError> {
        let candidates = self
            .index
            .query(query, self.tuning.fetch_size(top_k))
            .await?;

        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let scored: Vec<Scored<TextChunk>> = candidates
            .into_iter()
            .enumerate()
            .map(|(rank, m)| Scored::new(m.chunk, rank).with_vector_score(m.similarity))
            .collect();
        let candidate_count = scored.len();

        let mut reranked = self
            .reranker
            .rerank(query, scored, |chunk: &TextChunk| chunk.text.as_str());
        reranked.truncate(self.tuning.final_k);

        let results: Vec<RetrievedChunk> = reranked
            .into_iter()
            .map(|s| RetrievedChunk {
                score: s.lexical(),
                similarity: s.vector(),
                chunk: s.item,
            })
            .collect();

        debug!(
            candidates = candidate_count,
            returned = results.len(),
            best_similarity = results.first().map(|r| r.similarity),
            "hybrid retrieval complete"
        );

        Ok(results)
    }
}

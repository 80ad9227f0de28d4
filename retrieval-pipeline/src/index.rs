use std::{sync::Arc, time::Duration};

use common::{
    error::AppError,
    storage::{
        db::SurrealDbClient,
        types::{
            text_chunk::{IndexEntry, TextChunk},
            StoredObject,
        },
    },
    utils::embedding::EmbeddingProvider,
};
use serde::Deserialize;
use tokio::sync::RwLock;
use tokio_retry::{
    strategy::{jitter, ExponentialBackoff},
    Retry,
};
use tracing::{debug, info, instrument};

use crate::scoring::cosine_distance_to_similarity;

const EMBED_BATCH_SIZE: usize = 32;
/// Candidate list size for the HNSW search; raised to `k` when smaller.
const KNN_EF: usize = 40;

/// A chunk returned by a nearest-neighbour query with its cosine similarity.
#[derive(Debug, Clone)]
pub struct IndexMatch {
    pub chunk: TextChunk,
    pub similarity: f32,
}

#[derive(Debug, Deserialize)]
struct CountRow {
    count: usize,
}

#[derive(Debug, Deserialize)]
struct KnnRow {
    chunk_id: usize,
    source_offset: usize,
    text: String,
    distance: f32,
}

/// Chunk embeddings stored in SurrealDB. Rebuilds are full-replace and run
/// under a write lock, so queries see either the old or the new index.
pub struct EmbeddingIndex {
    db: Arc<SurrealDbClient>,
    embedder: Arc<EmbeddingProvider>,
    timeout: Duration,
    gate: RwLock<()>,
}

impl EmbeddingIndex {
    pub fn new(db: Arc<SurrealDbClient>, embedder: Arc<EmbeddingProvider>, timeout: Duration) -> Self {
        Self {
            db,
            embedder,
            timeout,
            gate: RwLock::new(()),
        }
    }

    /// Discards every stored entry and indexes `chunks` in their place.
    ///
    /// Embeddings are computed before the index is touched, so a failed
    /// embedding call leaves the previous index intact.
    #[instrument(skip_all, fields(chunk_count = chunks.len()))]
    pub async fn rebuild(&self, chunks: Vec<TextChunk>) -> Result<usize, AppError> {
        let started = std::time::Instant::now();

        let mut entries = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(EMBED_BATCH_SIZE) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let embeddings = self.embed_with_retry(texts).await?;
            entries.extend(
                batch
                    .iter()
                    .cloned()
                    .zip(embeddings)
                    .map(|(chunk, embedding)| IndexEntry::new(chunk, embedding)),
            );
        }
        let embed_ms = started.elapsed().as_millis();

        let count = entries.len();
        let table = IndexEntry::table_name();

        let _guard = self.gate.write().await;
        if entries.is_empty() {
            self.db
                .query(format!("DELETE {table};"))
                .await?
                .check()?;
        } else {
            self.db
                .query(format!(
                    "BEGIN TRANSACTION;
                     DELETE {table};
                     INSERT INTO {table} $entries;
                     COMMIT TRANSACTION;"
                ))
                .bind(("entries", entries))
                .await?
                .check()?;
        }

        info!(
            entries = count,
            embed_ms,
            total_ms = started.elapsed().as_millis(),
            backend = self.embedder.backend_label(),
            "embedding index rebuilt"
        );

        Ok(count)
    }

    /// Returns up to `k` entries ordered by cosine similarity to `text`,
    /// found through the HNSW index. An empty index yields an empty result
    /// without embedding the query.
    #[instrument(skip_all, fields(k))]
    pub async fn query(&self, text: &str, k: usize) -> Result<Vec<IndexMatch>, AppError> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let _guard = self.gate.read().await;
        if self.count_entries().await? == 0 {
            debug!("embedding index is empty");
            return Ok(Vec::new());
        }

        let query_embedding = self.embed_one(text).await?;
        let ef = k.max(KNN_EF);
        let rows: Vec<KnnRow> = self
            .db
            .query(format!(
                "SELECT chunk_id, source_offset, text, vector::distance::knn() AS distance \
                 FROM {table} WHERE embedding <|{k},{ef}|> $embedding ORDER BY distance",
                table = IndexEntry::table_name()
            ))
            .bind(("embedding", query_embedding))
            .await?
            .take(0)?;

        let mut matches: Vec<IndexMatch> = rows
            .into_iter()
            .map(|row| IndexMatch {
                similarity: cosine_distance_to_similarity(row.distance),
                chunk: TextChunk::new(row.chunk_id, row.text, row.source_offset),
            })
            .collect();

        matches.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.chunk.id.cmp(&b.chunk.id))
        });
        matches.truncate(k);

        Ok(matches)
    }

    /// Makes sure the backing table and an HNSW index sized for this
    /// index's embedder exist.
    pub async fn initialize(&self) -> Result<(), AppError> {
        let _guard = self.gate.write().await;
        self.db.ensure_initialized(self.embedder.dimension()).await
    }

    pub async fn len(&self) -> Result<usize, AppError> {
        let _guard = self.gate.read().await;
        self.count_entries().await
    }

    async fn count_entries(&self) -> Result<usize, AppError> {
        let row: Option<CountRow> = self
            .db
            .query(format!(
                "SELECT count() AS count FROM {} GROUP ALL",
                IndexEntry::table_name()
            ))
            .await?
            .take(0)?;

        Ok(row.map_or(0, |r| r.count))
    }

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, AppError> {
        let retry_strategy = ExponentialBackoff::from_millis(100).map(jitter).take(3);
        let timeout = self.timeout;

        Retry::spawn(retry_strategy, || async move {
            tokio::time::timeout(timeout, self.embedder.embed(text))
                .await
                .map_err(|_| AppError::Timeout(timeout.as_secs()))?
                .map_err(AppError::from)
        })
        .await
    }

    async fn embed_with_retry(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, AppError> {
        let retry_strategy = ExponentialBackoff::from_millis(100).map(jitter).take(3);
        let timeout = self.timeout;

        Retry::spawn(retry_strategy, || {
            let texts = texts.clone();
            async move {
                tokio::time::timeout(timeout, self.embedder.embed_batch(texts))
                    .await
                    .map_err(|_| AppError::Timeout(timeout.as_secs()))?
                    .map_err(AppError::from)
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    async fn index() -> EmbeddingIndex {
        let db = SurrealDbClient::memory("test_ns", &Uuid::new_v4().to_string())
            .await
            .expect("in-memory surrealdb");
        let embedder = EmbeddingProvider::new_hashed(64).expect("hashed embedder");
        let index = EmbeddingIndex::new(Arc::new(db), Arc::new(embedder), Duration::from_secs(5));
        index.initialize().await.expect("schema");
        index
    }

    fn chunks(texts: &[&str]) -> Vec<TextChunk> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| TextChunk::new(i, *t, i * 100))
            .collect()
    }

    #[tokio::test]
    async fn empty_index_returns_nothing() {
        let index = index().await;
        assert!(index.query("anything", 5).await.expect("query").is_empty());
        assert_eq!(index.len().await.expect("len"), 0);

        index.rebuild(Vec::new()).await.expect("empty rebuild");
        assert!(index.query("anything", 5).await.expect("query").is_empty());
    }

    #[tokio::test]
    async fn query_orders_by_similarity() {
        let index = index().await;
        let stored = index
            .rebuild(chunks(&[
                "the french revolution began in 1789",
                "mitochondria produce energy in the cell",
                "quadratic equations have two roots",
            ]))
            .await
            .expect("rebuild");
        assert_eq!(stored, 3);
        assert_eq!(index.len().await.expect("len"), 3);

        let matches = index
            .query("mitochondria produce energy", 2)
            .await
            .expect("query");
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].chunk.id, 1);
        assert_eq!(matches[0].chunk.source_offset, 100);
        assert!(matches[0].similarity >= matches[1].similarity);
    }

    #[tokio::test]
    async fn rebuild_replaces_previous_entries() {
        let index = index().await;
        index
            .rebuild(chunks(&["alpha", "beta", "gamma"]))
            .await
            .expect("first rebuild");
        index
            .rebuild(chunks(&["delta"]))
            .await
            .expect("second rebuild");

        assert_eq!(index.len().await.expect("len"), 1);
        let matches = index.query("alpha", 10).await.expect("query");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].chunk.text, "delta");

        index.rebuild(Vec::new()).await.expect("clear");
        assert_eq!(index.len().await.expect("len"), 0);
    }

    #[tokio::test]
    async fn similarity_reflects_vector_distance() {
        let index = index().await;
        index
            .rebuild(chunks(&["photosynthesis needs light", "volcanoes erupt lava"]))
            .await
            .expect("rebuild");

        let matches = index
            .query("photosynthesis needs light", 2)
            .await
            .expect("query");
        assert_eq!(matches[0].chunk.text, "photosynthesis needs light");
        assert!((matches[0].similarity - 1.0).abs() < 1e-3);
        assert!(matches[1].similarity < matches[0].similarity);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn queries_during_rebuilds_see_one_generation() {
        // Every generation stores the same number of chunks, all tagged with
        // the generation number. A query mixing tags saw a partial rebuild.
        const GENERATIONS: usize = 20;
        const QUERIES: usize = 200;
        const PER_GENERATION: usize = 4;

        fn generation(n: usize) -> Vec<TextChunk> {
            (0..PER_GENERATION)
                .map(|i| TextChunk::new(i, format!("gen{n} cell note {i}"), i))
                .collect()
        }

        let index = Arc::new(index().await);
        index.rebuild(generation(0)).await.expect("seed");

        let writer = {
            let index = Arc::clone(&index);
            tokio::spawn(async move {
                for n in 1..=GENERATIONS {
                    index.rebuild(generation(n)).await.expect("rebuild");
                    tokio::task::yield_now().await;
                }
            })
        };

        let reader = {
            let index = Arc::clone(&index);
            tokio::spawn(async move {
                let mut mixed = 0;
                for _ in 0..QUERIES {
                    let matches = index
                        .query("cell note", PER_GENERATION)
                        .await
                        .expect("query");
                    assert!(!matches.is_empty());

                    let tags: std::collections::HashSet<&str> = matches
                        .iter()
                        .filter_map(|m| m.chunk.text.split_whitespace().next())
                        .collect();
                    if tags.len() != 1 {
                        mixed += 1;
                    }
                    tokio::task::yield_now().await;
                }
                mixed
            })
        };

        writer.await.expect("writer task");
        let mixed = reader.await.expect("reader task");
        assert_eq!(mixed, 0);
        assert_eq!(index.len().await.expect("len"), PER_GENERATION);
    }
}

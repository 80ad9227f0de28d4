mod config;

pub use config::IngestionConfig;

use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Instant,
};

use common::error::AppError;
use retrieval_pipeline::index::EmbeddingIndex;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{chunking::chunk_text, utils::file_text_extraction::extract_text_from_path};

/// Counts reported after a directory has been ingested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IngestionSummary {
    pub documents: usize,
    pub chunks: usize,
}

#[allow(clippy::module_name_repetitions)]
pub struct IngestionPipeline {
    index: Arc<EmbeddingIndex>,
    pipeline_config: IngestionConfig,
}

impl IngestionPipeline {
    pub fn new(index: Arc<EmbeddingIndex>, pipeline_config: IngestionConfig) -> Self {
        Self {
            index,
            pipeline_config,
        }
    }

    pub fn index(&self) -> &Arc<EmbeddingIndex> {
        &self.index
    }

    /// Reads every supported document under `dir`, chunks it, and replaces
    /// the embedding index with the result. Chunk ids run across the whole
    /// run in sorted path order.
    ///
    /// Documents that cannot be read are skipped with a warning; an empty
    /// directory clears the index.
    #[tracing::instrument(skip_all, fields(dir = %dir.display()))]
    pub async fn ingest_directory(&self, dir: &Path) -> Result<IngestionSummary, AppError> {
        let started = Instant::now();

        let metadata = tokio::fs::metadata(dir)
            .await
            .map_err(|_| AppError::NotFound(format!("documents directory {}", dir.display())))?;
        if !metadata.is_dir() {
            return Err(AppError::Validation(format!(
                "{} is not a directory",
                dir.display()
            )));
        }

        let files = collect_files(dir).await?;
        let mut documents = 0usize;
        let mut chunks = Vec::new();

        for path in files {
            let text = match extract_text_from_path(&path).await {
                Ok(Some(text)) => text,
                Ok(None) => continue,
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "skipping unreadable document");
                    continue;
                }
            };

            let doc_chunks = chunk_text(&text, self.pipeline_config.chunk_size, chunks.len())?;
            debug!(
                path = %path.display(),
                chunk_count = doc_chunks.len(),
                "document chunked"
            );
            documents = documents.saturating_add(1);
            chunks.extend(doc_chunks);
        }

        let prepare_ms = started.elapsed().as_millis();
        let chunk_count = self.index.rebuild(chunks).await?;

        info!(
            documents,
            chunk_count,
            prepare_ms,
            total_ms = started.elapsed().as_millis(),
            "ingestion complete"
        );

        Ok(IngestionSummary {
            documents,
            chunks: chunk_count,
        })
    }
}

/// Every regular file below `root`, sorted by path.
async fn collect_files(root: &Path) -> Result<Vec<PathBuf>, AppError> {
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let file_type = entry.file_type().await?;
            if file_type.is_dir() {
                pending.push(entry.path());
            } else if file_type.is_file() {
                files.push(entry.path());
            }
        }
    }

    files.sort();
    Ok(files)
}

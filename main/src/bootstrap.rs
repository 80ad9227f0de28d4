use std::{path::Path, sync::Arc};

use api_router::api_state::ApiState;
use async_openai::{config::OpenAIConfig, Client};
use common::{
    storage::db::SurrealDbClient,
    utils::{
        completion::{CompletionService, OpenAiCompletion},
        config::AppConfig,
        embedding::EmbeddingProvider,
    },
};
use ingestion_pipeline::{IngestionConfig, IngestionPipeline};
use retrieval_pipeline::{index::EmbeddingIndex, HybridRetriever, RetrievalTuning};
use session_engine::Tutor;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .try_init()
        .ok();
}

pub async fn connect_db(config: &AppConfig) -> anyhow::Result<Arc<SurrealDbClient>> {
    let db = SurrealDbClient::new(
        &config.surrealdb_address,
        config.surrealdb_username.as_deref(),
        config.surrealdb_password.as_deref(),
        &config.surrealdb_namespace,
        &config.surrealdb_database,
    )
    .await?;
    Ok(Arc::new(db))
}

/// Wires the index, retriever, ingestion pipeline and tutor, and defines the
/// vector index for the configured embedder.
pub async fn build_state(
    config: AppConfig,
    db: Arc<SurrealDbClient>,
    completion: Option<Arc<dyn CompletionService>>,
) -> anyhow::Result<ApiState> {
    let openai_client = Arc::new(Client::with_config(
        OpenAIConfig::new()
            .with_api_key(&config.openai_api_key)
            .with_api_base(&config.openai_base_url),
    ));

    let embedding_provider =
        Arc::new(EmbeddingProvider::from_config(&config, Some(Arc::clone(&openai_client))).await?);
    info!(
        embedding_backend = embedding_provider.backend_label(),
        embedding_dimension = embedding_provider.dimension(),
        "Embedding provider initialized"
    );

    let index = Arc::new(EmbeddingIndex::new(
        Arc::clone(&db),
        embedding_provider,
        config.request_timeout(),
    ));
    index.initialize().await?;
    let retriever = config.rag_enabled.then(|| {
        Arc::new(HybridRetriever::new(
            Arc::clone(&index),
            RetrievalTuning::from_config(&config),
        ))
    });
    let ingestion = Arc::new(IngestionPipeline::new(
        index,
        IngestionConfig::from_config(&config),
    ));

    let completion = completion.unwrap_or_else(|| {
        Arc::new(OpenAiCompletion::from_config(&config, openai_client)) as Arc<dyn CompletionService>
    });
    let tutor = Arc::new(Tutor::from_config(&config, completion, retriever));

    Ok(ApiState::new(db, config, tutor, ingestion))
}

/// Ingests the configured documents directory, if any. Failures are logged
/// and the service starts with whatever the index already holds.
pub async fn ingest_configured_docs(state: &ApiState) {
    let Some(dir) = state.config.docs_dir.as_deref() else {
        return;
    };
    match state.ingestion.ingest_directory(Path::new(dir)).await {
        Ok(summary) => info!(
            documents = summary.documents,
            chunks = summary.chunks,
            "Initial ingestion complete"
        ),
        Err(err) => warn!(dir, error = %err, "Initial ingestion failed"),
    }
}

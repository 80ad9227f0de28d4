use std::path::PathBuf;

use axum::{extract::State, response::IntoResponse, Json};
use serde::Deserialize;
use tracing::info;

use crate::{api_state::ApiState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct IngestRequest {
    pub path: String,
}

/// Rebuilds the embedding index from a directory on the server's filesystem.
pub async fn ingest_documents(
    State(state): State<ApiState>,
    Json(request): Json<IngestRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let path = request.path.trim();
    if path.is_empty() {
        return Err(ApiError::ValidationError("path must not be empty".to_string()));
    }

    let summary = state
        .ingestion
        .ingest_directory(&PathBuf::from(path))
        .await?;
    info!(
        documents = summary.documents,
        chunks = summary.chunks,
        "ingestion finished"
    );

    Ok(Json(summary))
}

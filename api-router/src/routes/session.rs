use axum::{extract::State, response::IntoResponse, Json};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::{api_state::ApiState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct SessionRequest {
    pub session_id: String,
}

pub async fn reset_session(
    State(state): State<ApiState>,
    Json(request): Json<SessionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state.tutor.reset(&request.session_id).await?;
    info!(session_id = %request.session_id, "session reset");

    Ok(Json(json!({ "status": "reset successful" })))
}

pub async fn consolidate_session(
    State(state): State<ApiState>,
    Json(request): Json<SessionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let report = state.tutor.consolidate(&request.session_id).await?;

    Ok(Json(report))
}

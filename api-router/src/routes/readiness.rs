use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::api_state::ApiState;

/// Returns 200 when the index store answers, else 503.
pub async fn ready(State(state): State<ApiState>) -> impl IntoResponse {
    match state.db.client.query("RETURN true").await {
        Ok(_) => {
            let sessions = state.tutor.sessions().len().await;
            (
                StatusCode::OK,
                Json(json!({
                    "status": "ok",
                    "checks": { "index_store": "ok" },
                    "sessions": sessions
                })),
            )
        }
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "error",
                "checks": { "index_store": "fail" },
                "reason": e.to_string()
            })),
        ),
    }
}

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::{api_state::ApiState, error::ApiError};

/// Requires the configured shared key on protected routes. Without a
/// configured key every request passes.
pub async fn api_auth(
    State(state): State<ApiState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if let Some(expected) = state.config.api_key.as_deref() {
        let provided = extract_api_key(&request)
            .ok_or_else(|| ApiError::Unauthorized("You have to be authenticated".to_string()))?;
        if provided != expected {
            return Err(ApiError::Unauthorized("Invalid API key".to_string()));
        }
    }

    Ok(next.run(request).await)
}

/// `X-API-Key` wins over an `Authorization: Bearer` header.
fn extract_api_key(request: &Request) -> Option<&str> {
    let headers = request.headers();
    if let Some(key) = headers.get("X-API-Key").and_then(|v| v.to_str().ok()) {
        return Some(key);
    }
    headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|auth| auth.strip_prefix("Bearer "))
        .map(str::trim)
}

use api_state::ApiState;
use axum::{
    extract::FromRef,
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use middleware_api_auth::api_auth;
use routes::{
    chat::chat,
    ingest::ingest_documents,
    liveness::live,
    readiness::ready,
    session::{consolidate_session, reset_session},
};

pub mod api_state;
pub mod error;
mod middleware_api_auth;
mod routes;

/// Router for API functionality, version 1
pub fn api_routes_v1<S>(app_state: &ApiState) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
    ApiState: FromRef<S>,
{
    // Health checks stay open
    let public = Router::new()
        .route("/ready", get(ready))
        .route("/live", get(live));

    let protected = Router::new()
        .route("/chat", post(chat))
        .route("/reset", post(reset_session))
        .route("/consolidate", post(consolidate_session))
        .route("/ingest", post(ingest_documents))
        .route_layer(from_fn_with_state(app_state.clone(), api_auth));

    public.merge(protected)
}

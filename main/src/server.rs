mod bootstrap;

use api_router::{api_routes_v1, api_state::ApiState};
use axum::Router;
use common::utils::config::get_config;
use tracing::info;

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    bootstrap::init_tracing();

    let config = get_config()?;
    let db = bootstrap::connect_db(&config).await?;
    let api_state = bootstrap::build_state(config, db, None).await?;
    bootstrap::ingest_configured_docs(&api_state).await;

    let app = app(&api_state);

    let serve_address = format!("0.0.0.0:{}", api_state.config.http_port);
    info!("Starting server listening on {serve_address}");
    let listener = tokio::net::TcpListener::bind(serve_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn app(api_state: &ApiState) -> Router {
    Router::new()
        .nest("/api/v1", api_routes_v1(api_state))
        .with_state(api_state.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::{body::Body, http::Request, http::StatusCode};
    use common::{
        storage::db::SurrealDbClient,
        utils::{config::AppConfig, embedding::EmbeddingBackend},
    };
    use tower::ServiceExt;
    use uuid::Uuid;

    fn smoke_test_config(namespace: &str, database: &str) -> AppConfig {
        AppConfig {
            openai_api_key: "test-key".into(),
            openai_base_url: "http://127.0.0.1:9".into(),
            surrealdb_address: "mem://".into(),
            surrealdb_namespace: namespace.into(),
            surrealdb_database: database.into(),
            http_port: 0,
            embedding_backend: EmbeddingBackend::Hashed,
            embedding_dimensions: 64,
            ..Default::default()
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn smoke_startup_with_in_memory_surrealdb() {
        let namespace = "test_ns";
        let database = format!("test_db_{}", Uuid::new_v4());
        let config = smoke_test_config(namespace, &database);

        let db = Arc::new(
            SurrealDbClient::memory(namespace, &database)
                .await
                .expect("failed to start in-memory surrealdb"),
        );
        let api_state = bootstrap::build_state(config, db, None)
            .await
            .expect("failed to build api state");
        let app = app(&api_state);

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/v1/live")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router response");
        assert_eq!(response.status(), StatusCode::OK);

        let ready_response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/ready")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("ready response");
        assert_eq!(ready_response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unreachable_completion_service_yields_apology() {
        let database = format!("test_db_{}", Uuid::new_v4());
        let config = smoke_test_config("test_ns", &database);
        let db = Arc::new(
            SurrealDbClient::memory("test_ns", &database)
                .await
                .expect("in-memory surrealdb"),
        );
        let api_state = bootstrap::build_state(config, db, None)
            .await
            .expect("api state");
        let reply = api_state
            .tutor
            .handle_message("smoke", "What is a linked list?")
            .await
            .expect("handled");

        assert_eq!(reply, session_engine::tutor::APOLOGY_REPLY);
    }
}

use std::sync::Arc;

use common::{storage::db::SurrealDbClient, utils::config::AppConfig};
use ingestion_pipeline::IngestionPipeline;
use session_engine::Tutor;

#[derive(Clone)]
pub struct ApiState {
    pub db: Arc<SurrealDbClient>,
    pub config: AppConfig,
    pub tutor: Arc<Tutor>,
    pub ingestion: Arc<IngestionPipeline>,
}

impl ApiState {
    pub fn new(
        db: Arc<SurrealDbClient>,
        config: AppConfig,
        tutor: Arc<Tutor>,
        ingestion: Arc<IngestionPipeline>,
    ) -> Self {
        Self {
            db,
            config,
            tutor,
            ingestion,
        }
    }
}

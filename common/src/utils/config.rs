use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::utils::embedding::EmbeddingBackend;

#[derive(Clone, Deserialize, Debug)]
pub struct AppConfig {
    pub openai_api_key: String,
    #[serde(default = "default_base_url")]
    pub openai_base_url: String,
    #[serde(default = "default_completion_model")]
    pub completion_model: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    #[serde(default = "default_surrealdb_address")]
    pub surrealdb_address: String,
    #[serde(default)]
    pub surrealdb_username: Option<String>,
    #[serde(default)]
    pub surrealdb_password: Option<String>,
    #[serde(default = "default_surrealdb_name")]
    pub surrealdb_namespace: String,
    #[serde(default = "default_surrealdb_name")]
    pub surrealdb_database: String,
    /// Directory ingested when the server boots.
    #[serde(default)]
    pub docs_dir: Option<String>,
    #[serde(default = "default_keep_history")]
    pub keep_history: usize,
    /// Periodic consolidation cadence in interactions; 0 disables it.
    #[serde(default = "default_consolidate_after")]
    pub consolidate_after: u64,
    #[serde(default = "default_consolidation_history_window")]
    pub consolidation_history_window: usize,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_retrieval_top_k")]
    pub retrieval_top_k: usize,
    #[serde(default = "default_retrieval_final_k")]
    pub retrieval_final_k: usize,
    #[serde(default = "default_true")]
    pub rag_enabled: bool,
    #[serde(default)]
    pub embedding_backend: EmbeddingBackend,
    #[serde(default)]
    pub embedding_model: Option<String>,
    #[serde(default = "default_embedding_dimensions")]
    pub embedding_dimensions: u32,
    /// Shared secret required on mutating API routes when set.
    #[serde(default)]
    pub api_key: Option<String>,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_completion_model() -> String {
    "gpt-4o-mini".to_string()
}

const fn default_http_port() -> u16 {
    3000
}

fn default_surrealdb_address() -> String {
    "mem://".to_string()
}

fn default_surrealdb_name() -> String {
    "tutor".to_string()
}

const fn default_keep_history() -> usize {
    12
}

const fn default_consolidate_after() -> u64 {
    10
}

const fn default_consolidation_history_window() -> usize {
    100
}

const fn default_request_timeout_secs() -> u64 {
    25
}

const fn default_chunk_size() -> usize {
    100
}

const fn default_retrieval_top_k() -> usize {
    5
}

const fn default_retrieval_final_k() -> usize {
    3
}

const fn default_true() -> bool {
    true
}

const fn default_embedding_dimensions() -> u32 {
    384
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            openai_api_key: String::new(),
            openai_base_url: default_base_url(),
            completion_model: default_completion_model(),
            http_port: default_http_port(),
            surrealdb_address: default_surrealdb_address(),
            surrealdb_username: None,
            surrealdb_password: None,
            surrealdb_namespace: default_surrealdb_name(),
            surrealdb_database: default_surrealdb_name(),
            docs_dir: None,
            keep_history: default_keep_history(),
            consolidate_after: default_consolidate_after(),
            consolidation_history_window: default_consolidation_history_window(),
            request_timeout_secs: default_request_timeout_secs(),
            chunk_size: default_chunk_size(),
            retrieval_top_k: default_retrieval_top_k(),
            retrieval_final_k: default_retrieval_final_k(),
            rag_enabled: true,
            embedding_backend: EmbeddingBackend::default(),
            embedding_model: None,
            embedding_dimensions: default_embedding_dimensions(),
            api_key: None,
        }
    }
}

impl AppConfig {
    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

pub fn get_config() -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::with_name("config").required(false))
        .add_source(Environment::default())
        .build()?;

    config.try_deserialize()
}

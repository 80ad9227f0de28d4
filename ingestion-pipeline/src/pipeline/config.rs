use common::utils::config::AppConfig;

#[derive(Debug, Clone)]
pub struct IngestionConfig {
    /// Words per chunk.
    pub chunk_size: usize,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self { chunk_size: 100 }
    }
}

impl IngestionConfig {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            chunk_size: config.chunk_size,
        }
    }
}

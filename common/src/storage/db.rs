use crate::error::AppError;

use super::types::{text_chunk::IndexEntry, StoredObject};
use serde::Deserialize;
use std::ops::Deref;
use surrealdb::{
    engine::any::{connect, Any},
    opt::auth::Root,
    Error, Surreal,
};
use tracing::{debug, warn};

#[derive(Deserialize)]
struct StoredDimension {
    dimension: usize,
}

#[derive(Clone)]
pub struct SurrealDbClient {
    pub client: Surreal<Any>,
}

impl SurrealDbClient {
    /// # Initialize a new database client
    ///
    /// Root credentials are only used when both are present, which lets
    /// embedded engines such as `mem://` connect without signing in.
    pub async fn new(
        address: &str,
        username: Option<&str>,
        password: Option<&str>,
        namespace: &str,
        database: &str,
    ) -> Result<Self, Error> {
        let db = connect(address).await?;

        if let (Some(username), Some(password)) = (username, password) {
            db.signin(Root { username, password }).await?;
        }

        db.use_ns(namespace).use_db(database).await?;

        debug!(address, namespace, database, "connected to surrealdb");

        Ok(SurrealDbClient { client: db })
    }

    /// Defines the chunk table and its HNSW vector index for
    /// `embedding_dimension`-wide embeddings. Idempotent.
    ///
    /// Entries stored with a different dimension cannot live in the new
    /// index, so they are cleared and the next ingestion repopulates them.
    pub async fn ensure_initialized(&self, embedding_dimension: usize) -> Result<(), AppError> {
        if embedding_dimension == 0 {
            return Err(AppError::Validation(
                "embedding dimension must be positive".into(),
            ));
        }
        let table = IndexEntry::table_name();

        self.client
            .query(format!("DEFINE TABLE IF NOT EXISTS {table} SCHEMALESS;"))
            .await?
            .check()?;

        let stored: Option<StoredDimension> = self
            .client
            .query(format!(
                "SELECT array::len(embedding) AS dimension FROM {table} LIMIT 1"
            ))
            .await?
            .take(0)?;
        if let Some(stored) = stored.filter(|s| s.dimension != embedding_dimension) {
            warn!(
                stored = stored.dimension,
                configured = embedding_dimension,
                "embedding dimension changed; clearing stored chunks"
            );
            self.client
                .query(format!("DELETE {table};"))
                .await?
                .check()?;
        }

        self.client
            .query(format!(
                "DEFINE INDEX IF NOT EXISTS idx_{table}_chunk_id ON {table} FIELDS chunk_id;
                 DEFINE INDEX OVERWRITE idx_{table}_embedding ON {table} \
                 FIELDS embedding HNSW DIMENSION {embedding_dimension} DIST COSINE;"
            ))
            .await?
            .check()?;

        debug!(table, embedding_dimension, "schema initialized");
        Ok(())
    }
}

impl Deref for SurrealDbClient {
    type Target = Surreal<Any>;

    fn deref(&self) -> &Self::Target {
        &self.client
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl SurrealDbClient {
    /// Create an in-memory SurrealDB client for testing.
    pub async fn memory(namespace: &str, database: &str) -> Result<Self, Error> {
        let db = connect("mem://").await?;

        db.use_ns(namespace).use_db(database).await?;

        Ok(SurrealDbClient { client: db })
    }
}

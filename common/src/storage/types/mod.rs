use serde::{de::DeserializeOwned, Serialize};
pub mod text_chunk;

/// A record type persisted in its own SurrealDB table.
pub trait StoredObject: Serialize + DeserializeOwned {
    fn table_name() -> &'static str;
}

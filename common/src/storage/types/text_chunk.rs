use serde::{Deserialize, Serialize};

use super::StoredObject;

/// A contiguous slice of a source document. Ids are dense and ascending in
/// source order; `source_offset` is the index of the chunk's first word
/// within its document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextChunk {
    pub id: usize,
    pub text: String,
    pub source_offset: usize,
}

impl TextChunk {
    pub fn new(id: usize, text: impl Into<String>, source_offset: usize) -> Self {
        Self {
            id,
            text: text.into(),
            source_offset,
        }
    }
}

/// A chunk paired with its embedding, as stored by the embedding index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub chunk_id: usize,
    pub source_offset: usize,
    pub text: String,
    pub embedding: Vec<f32>,
}

impl IndexEntry {
    pub fn new(chunk: TextChunk, embedding: Vec<f32>) -> Self {
        Self {
            chunk_id: chunk.id,
            source_offset: chunk.source_offset,
            text: chunk.text,
            embedding,
        }
    }
}

impl StoredObject for IndexEntry {
    fn table_name() -> &'static str {
        "tutor_chunk"
    }
}

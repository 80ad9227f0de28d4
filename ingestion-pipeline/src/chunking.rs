use common::{error::AppError, storage::types::text_chunk::TextChunk};

/// Splits `text` into consecutive windows of `chunk_size` whitespace-separated
/// words. The last window may be shorter. Ids start at `first_id` and
/// `source_offset` is the index of the window's first word in `text`.
pub fn chunk_text(text: &str, chunk_size: usize, first_id: usize) -> Result<Vec<TextChunk>, AppError> {
    if chunk_size == 0 {
        return Err(AppError::Validation(
            "chunk size must be greater than zero".into(),
        ));
    }

    let words: Vec<&str> = text.split_whitespace().collect();

    Ok(words
        .chunks(chunk_size)
        .enumerate()
        .map(|(i, window)| {
            TextChunk::new(
                first_id.saturating_add(i),
                window.join(" "),
                i.saturating_mul(chunk_size),
            )
        })
        .collect())
}

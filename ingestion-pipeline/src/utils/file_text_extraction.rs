use std::path::Path;

use common::error::AppError;
use tracing::debug;

/// Document formats the ingestion pipeline understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    PlainText,
    Pdf,
}

impl DocumentKind {
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "txt" | "md" | "markdown" => Some(Self::PlainText),
            "pdf" => Some(Self::Pdf),
            _ => None,
        }
    }
}

/// Reads the text of a supported document. Returns `Ok(None)` for formats
/// the pipeline does not ingest.
pub async fn extract_text_from_path(path: &Path) -> Result<Option<String>, AppError> {
    let Some(kind) = DocumentKind::from_path(path) else {
        debug!(path = %path.display(), "skipping unsupported document");
        return Ok(None);
    };

    let text = match kind {
        DocumentKind::PlainText => tokio::fs::read_to_string(path).await?,
        DocumentKind::Pdf => {
            let pdf_bytes = tokio::fs::read(path).await?;
            extract_pdf_text(pdf_bytes).await?
        }
    };

    Ok(Some(text))
}

/// Runs `pdf-extract` off the async executor.
async fn extract_pdf_text(pdf_bytes: Vec<u8>) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || {
        pdf_extract::extract_text_from_mem(&pdf_bytes).map(|s| s.trim().to_string())
    })
    .await?
    .map_err(|err| AppError::Processing(format!("Failed to extract text from PDF: {err}")))
}

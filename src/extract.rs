//! PDF text extraction.
//!
//! The QA engine and the upload pipeline treat extraction as a collaborator
//! behind the [`TextExtractor`] trait: stored file → plain UTF-8 text.
//! [`PdfExtractor`] is the production implementation (pdf-extract); tests
//! substitute stubs.

use std::path::Path;
use thiserror::Error;

/// Extraction failure: the stored file is missing, unreadable, or not a
/// parseable PDF.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
}

/// Extracts plain text from a stored document file.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, path: &Path) -> Result<String, ExtractError>;
}

/// Production extractor backed by `pdf-extract`.
pub struct PdfExtractor;

impl TextExtractor for PdfExtractor {
    fn extract(&self, path: &Path) -> Result<String, ExtractError> {
        let bytes = std::fs::read(path).map_err(|source| ExtractError::Io {
            path: path.display().to_string(),
            source,
        })?;
        extract_pdf_text(&bytes)
    }
}

/// Extract text from in-memory PDF bytes.
pub fn extract_pdf_text(bytes: &[u8]) -> Result<String, ExtractError> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_pdf_returns_error() {
        let err = extract_pdf_text(b"not a pdf").unwrap_err();
        assert!(matches!(err, ExtractError::Pdf(_)));
    }

    #[test]
    fn test_missing_file_returns_io_error() {
        let err = PdfExtractor
            .extract(Path::new("/nonexistent/file.pdf"))
            .unwrap_err();
        assert!(matches!(err, ExtractError::Io { .. }));
    }
}

//! PDF upload pipeline.
//!
//! Validates the incoming file, stores it under the configured upload
//! directory with a UUID-prefixed name, extracts its text to derive a
//! title, and records the document. The stored file is the source of
//! truth for later index builds; extracted text is never persisted.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::config::StorageConfig;
use crate::extract::{ExtractError, TextExtractor};
use crate::models::Document;
use crate::store::Store;

const MAX_TITLE_CHARS: usize = 100;

/// Upload rejection or failure. The `NotPdf`/`TooLarge`/`Empty` variants
/// are client errors; the rest are server-side.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("only PDF files are accepted, got '{0}'")]
    NotPdf(String),

    #[error("file is {size} bytes, limit is {max}")]
    TooLarge { size: u64, max: u64 },

    #[error("uploaded file is empty")]
    Empty,

    #[error("failed to store upload at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Extraction(#[from] ExtractError),

    #[error("failed to record document: {0}")]
    Persistence(anyhow::Error),
}

impl UploadError {
    /// True for rejections the client caused.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            UploadError::NotPdf(_) | UploadError::TooLarge { .. } | UploadError::Empty
        )
    }
}

/// Handles PDF uploads end to end.
pub struct Uploader {
    store: Arc<dyn Store>,
    extractor: Arc<dyn TextExtractor>,
    storage: StorageConfig,
}

impl Uploader {
    pub fn new(
        store: Arc<dyn Store>,
        extractor: Arc<dyn TextExtractor>,
        storage: StorageConfig,
    ) -> Self {
        Self {
            store,
            extractor,
            storage,
        }
    }

    /// Validate, store, and record one uploaded PDF.
    ///
    /// The file must parse as a PDF before the document is recorded; a
    /// stored file that fails extraction is removed again so the upload
    /// directory only ever holds files the engine can index.
    pub async fn upload(&self, filename: &str, bytes: Vec<u8>) -> Result<Document, UploadError> {
        let filename = sanitize_filename(filename);
        if !filename.to_lowercase().ends_with(".pdf") {
            return Err(UploadError::NotPdf(filename));
        }
        if bytes.is_empty() {
            return Err(UploadError::Empty);
        }
        if bytes.len() as u64 > self.storage.max_upload_bytes {
            return Err(UploadError::TooLarge {
                size: bytes.len() as u64,
                max: self.storage.max_upload_bytes,
            });
        }

        let id = Uuid::new_v4().to_string();
        let path = self.stored_path(&id, &filename);

        // File writes and PDF parsing are blocking; keep them off the
        // async workers.
        let upload_dir = self.storage.upload_dir.clone();
        let file_path = path.clone();
        let extractor = self.extractor.clone();
        let text = tokio::task::spawn_blocking(move || -> Result<String, UploadError> {
            std::fs::create_dir_all(&upload_dir).map_err(|source| UploadError::Io {
                path: upload_dir.display().to_string(),
                source,
            })?;
            std::fs::write(&file_path, &bytes).map_err(|source| UploadError::Io {
                path: file_path.display().to_string(),
                source,
            })?;

            match extractor.extract(&file_path) {
                Ok(text) => Ok(text),
                Err(err) => {
                    remove_stored_file(&file_path);
                    Err(UploadError::Extraction(err))
                }
            }
        })
        .await
        .map_err(|e| UploadError::Io {
            path: path.display().to_string(),
            source: std::io::Error::new(std::io::ErrorKind::Other, e.to_string()),
        })??;

        let document = Document {
            id,
            filename: filename.clone(),
            title: derive_title(&text, &filename),
            filepath: path.display().to_string(),
            uploaded_at: chrono::Utc::now().timestamp(),
        };

        if let Err(err) = self.store.insert_document(&document).await {
            remove_stored_file(&path);
            return Err(UploadError::Persistence(err));
        }

        Ok(document)
    }

    fn stored_path(&self, id: &str, filename: &str) -> PathBuf {
        self.storage.upload_dir.join(format!("{}_{}", id, filename))
    }
}

/// Strip any directory components a client may have smuggled into the
/// filename; only the final component is kept.
fn sanitize_filename(filename: &str) -> String {
    Path::new(filename)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Title for a document: the first non-empty line of its text, truncated
/// to 100 characters, or the filename when the text has none.
fn derive_title(text: &str, filename: &str) -> String {
    text.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(|line| line.chars().take(MAX_TITLE_CHARS).collect())
        .unwrap_or_else(|| filename.to_string())
}

/// Best-effort removal of a stored upload, used both when a later upload
/// step fails and when a document is deleted. A missing file is fine.
pub fn remove_stored_file(path: &Path) {
    if let Err(err) = std::fs::remove_file(path) {
        if err.kind() != std::io::ErrorKind::NotFound {
            eprintln!("warning: failed to remove {}: {}", path.display(), err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    struct StubExtractor {
        text: Option<&'static str>,
    }

    impl TextExtractor for StubExtractor {
        fn extract(&self, path: &Path) -> Result<String, ExtractError> {
            match self.text {
                Some(t) => Ok(t.to_string()),
                None => Err(ExtractError::Pdf(format!(
                    "unparseable: {}",
                    path.display()
                ))),
            }
        }
    }

    fn uploader_in(
        dir: &Path,
        store: Arc<MemoryStore>,
        text: Option<&'static str>,
    ) -> Uploader {
        Uploader::new(
            store,
            Arc::new(StubExtractor { text }),
            StorageConfig {
                upload_dir: dir.to_path_buf(),
                max_upload_bytes: 1024,
            },
        )
    }

    #[test]
    fn test_derive_title_first_nonempty_line() {
        assert_eq!(derive_title("\n\n  Report 2024  \nbody", "f.pdf"), "Report 2024");
        assert_eq!(derive_title("", "fallback.pdf"), "fallback.pdf");
        assert_eq!(derive_title("   \n\t\n", "fallback.pdf"), "fallback.pdf");

        let long = "x".repeat(300);
        assert_eq!(derive_title(&long, "f.pdf").chars().count(), 100);
    }

    #[test]
    fn test_sanitize_filename_strips_directories() {
        assert_eq!(sanitize_filename("../../etc/passwd.pdf"), "passwd.pdf");
        assert_eq!(sanitize_filename("plain.pdf"), "plain.pdf");
    }

    #[tokio::test]
    async fn test_rejects_non_pdf_without_writing() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::new());
        let uploader = uploader_in(dir.path(), store.clone(), Some("text"));

        let err = uploader
            .upload("notes.txt", b"hello".to_vec())
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::NotPdf(_)));
        assert!(err.is_client_error());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
        assert!(store.list_documents().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejects_oversized_and_empty_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::new());
        let uploader = uploader_in(dir.path(), store, Some("text"));

        let big = vec![0u8; 2048];
        let err = uploader.upload("big.pdf", big).await.unwrap_err();
        assert!(matches!(err, UploadError::TooLarge { size: 2048, max: 1024 }));

        let err = uploader.upload("empty.pdf", Vec::new()).await.unwrap_err();
        assert!(matches!(err, UploadError::Empty));
    }

    #[tokio::test]
    async fn test_upload_stores_file_and_records_document() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::new());
        let uploader = uploader_in(dir.path(), store.clone(), Some("Annual Report\nBody text"));

        let doc = uploader
            .upload("report.pdf", b"%PDF-data".to_vec())
            .await
            .unwrap();

        assert_eq!(doc.filename, "report.pdf");
        assert_eq!(doc.title, "Annual Report");
        let stored = Path::new(&doc.filepath);
        assert!(stored.exists());
        assert!(stored
            .file_name()
            .unwrap()
            .to_string_lossy()
            .ends_with("_report.pdf"));
        assert_eq!(std::fs::read(stored).unwrap(), b"%PDF-data");

        let listed = store.list_documents().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, doc.id);
    }

    #[tokio::test]
    async fn test_failed_extraction_removes_stored_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::new());
        let uploader = uploader_in(dir.path(), store.clone(), None);

        let err = uploader
            .upload("bad.pdf", b"not a pdf".to_vec())
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::Extraction(_)));
        assert!(!err.is_client_error());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
        assert!(store.list_documents().await.unwrap().is_empty());
    }
}

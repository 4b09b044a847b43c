//! Retrieval-QA engine.
//!
//! Orchestrates the answer pipeline for one question: resolve the document,
//! extract its text, build or reuse the vector index, retrieve the most
//! relevant chunks, ask the completion model to answer from that context
//! only, persist the question/answer pair, and return the stored record.
//!
//! Every stage failure maps to a distinct [`QaError`] kind so the boundary
//! layer can choose an appropriate status without inspecting messages.
//! Nothing is retried here; provider-level backoff lives inside the
//! [`Embedder`]/[`Completer`] implementations.

use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

use crate::chunk::split_text;
use crate::completion::Completer;
use crate::config::{ChunkingConfig, EmbeddingConfig, RetrievalConfig};
use crate::embedding::Embedder;
use crate::extract::{ExtractError, TextExtractor};
use crate::index::{IndexCache, IndexKey, VectorIndex};
use crate::models::AnswerRecord;
use crate::store::Store;

/// Failure kinds of the answer pipeline. All are terminal for the current
/// request.
#[derive(Debug, Error)]
pub enum QaError {
    #[error("document not found: {0}")]
    DocumentNotFound(String),

    #[error(transparent)]
    Extraction(#[from] ExtractError),

    #[error("embedding failed: {0}")]
    Embedding(anyhow::Error),

    #[error("completion failed: {0}")]
    Completion(anyhow::Error),

    /// The answer was computed but could not be made durable. Carries the
    /// generated answer so a caller may retry persistence without paying
    /// for another completion call.
    #[error("failed to persist answer for document {document_id}: {cause}")]
    Persistence {
        document_id: String,
        question: String,
        answer: String,
        cause: anyhow::Error,
    },

    /// A storage *read* failed (document lookup, question listing).
    #[error("storage error: {0}")]
    Storage(anyhow::Error),
}

/// Prompt wrapper instructing the model to answer strictly from the
/// retrieved context.
fn build_prompt(context: &str, question: &str) -> String {
    format!(
        "Use the following pieces of context to answer the question at the end. \
         If you don't know the answer, just say that you don't know, don't try \
         to make up an answer.\n\n{}\n\nQuestion: {}\nHelpful Answer:",
        context, question
    )
}

/// The retrieval-QA engine. One instance is shared across requests; the
/// only mutable state is the per-document [`IndexCache`].
pub struct QaEngine {
    store: Arc<dyn Store>,
    extractor: Arc<dyn TextExtractor>,
    embedder: Arc<dyn Embedder>,
    completer: Arc<dyn Completer>,
    chunking: ChunkingConfig,
    top_k: usize,
    batch_size: usize,
    cache: IndexCache,
}

impl QaEngine {
    pub fn new(
        store: Arc<dyn Store>,
        extractor: Arc<dyn TextExtractor>,
        embedder: Arc<dyn Embedder>,
        completer: Arc<dyn Completer>,
        chunking: ChunkingConfig,
        retrieval: &RetrievalConfig,
        embedding: &EmbeddingConfig,
    ) -> Self {
        Self {
            store,
            extractor,
            embedder,
            completer,
            chunking,
            top_k: retrieval.top_k,
            batch_size: embedding.batch_size,
            cache: IndexCache::new(),
        }
    }

    /// Answer a question about a document and persist the result.
    ///
    /// An unknown document fails before any provider call or write. An
    /// empty document still goes through the completion provider with
    /// empty context so the model can state it has no information.
    pub async fn answer(&self, document_id: &str, question: &str) -> Result<AnswerRecord, QaError> {
        let document = self
            .store
            .find_document(document_id)
            .await
            .map_err(QaError::Storage)?
            .ok_or_else(|| QaError::DocumentNotFound(document_id.to_string()))?;

        let index = self.document_index(&document).await?;

        let retrieved = if index.is_empty() {
            Vec::new()
        } else {
            let query_vec = self.embed_question(question).await?;
            index.search(&query_vec, self.top_k)
        };

        let context = retrieved
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        let prompt = build_prompt(&context, question);

        let answer = self
            .completer
            .complete(&prompt)
            .await
            .map_err(QaError::Completion)?;

        self.store
            .insert_question_answer(document_id, question, &answer)
            .await
            .map_err(|cause| QaError::Persistence {
                document_id: document_id.to_string(),
                question: question.to_string(),
                answer,
                cause,
            })
    }

    /// All persisted records for a document, oldest first.
    pub async fn list_questions(&self, document_id: &str) -> Result<Vec<AnswerRecord>, QaError> {
        self.store
            .find_document(document_id)
            .await
            .map_err(QaError::Storage)?
            .ok_or_else(|| QaError::DocumentNotFound(document_id.to_string()))?;

        self.store
            .list_questions(document_id)
            .await
            .map_err(QaError::Storage)
    }

    /// Drop any cached index for a document. Call on deletion.
    pub fn invalidate(&self, document_id: &str) {
        self.cache.invalidate_document(document_id);
    }

    async fn embed_question(&self, question: &str) -> Result<Vec<f32>, QaError> {
        let mut vectors = self
            .embedder
            .embed(&[question.to_string()])
            .await
            .map_err(QaError::Embedding)?;

        if vectors.len() != 1 {
            return Err(QaError::Embedding(anyhow::anyhow!(
                "expected 1 query vector, got {}",
                vectors.len()
            )));
        }
        let vector = vectors.remove(0);
        if vector.len() != self.embedder.dims() {
            return Err(QaError::Embedding(anyhow::anyhow!(
                "query embedding has {} dimensions, expected {}",
                vector.len(),
                self.embedder.dims()
            )));
        }
        Ok(vector)
    }

    /// Build (or reuse) the document's vector index.
    ///
    /// The slot mutex is held across extraction and the embedding calls,
    /// which is exactly the point: at most one build per document runs at
    /// a time, and concurrent requests wait for the finished index rather
    /// than receiving a half-built one. The cache-map lock itself is never
    /// held across I/O.
    async fn document_index(
        &self,
        document: &crate::models::Document,
    ) -> Result<Arc<VectorIndex>, QaError> {
        let key = IndexKey {
            document_id: document.id.clone(),
            chunk_size: self.chunking.chunk_size,
            chunk_overlap: self.chunking.chunk_overlap,
        };

        let slot = self.cache.slot(&key);
        let mut guard = slot.lock().await;

        if let Some(index) = guard.as_ref() {
            return Ok(index.clone());
        }

        // PDF parsing is CPU-bound; keep it off the async workers.
        let extractor = self.extractor.clone();
        let path = PathBuf::from(&document.filepath);
        let text = tokio::task::spawn_blocking(move || extractor.extract(&path))
            .await
            .map_err(|e| {
                QaError::Extraction(ExtractError::Pdf(format!("extraction task failed: {}", e)))
            })??;
        let chunks = split_text(&text, &self.chunking);
        let index = Arc::new(
            VectorIndex::build(&chunks, self.embedder.as_ref(), self.batch_size)
                .await
                .map_err(QaError::Embedding)?,
        );

        *guard = Some(index.clone());
        Ok(index)
    }
}

//! In-memory vector index over a document's chunks, plus the per-document
//! index cache.
//!
//! The index is a pure function of (document text, chunking parameters,
//! embedding model): an ordered list of chunk/vector pairs searched by
//! exact cosine similarity. Building is the expensive step — one batched
//! embedding call per [`VectorIndex::build`] — so [`IndexCache`] keeps one
//! finished index per (document, chunking parameters) and serializes
//! concurrent builds for the same key.

use anyhow::{bail, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::embedding::{cosine_similarity, Embedder};
use crate::models::Chunk;

/// A chunk scored against a query vector.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    /// Position of the chunk in the original split sequence.
    pub chunk_index: usize,
    pub text: String,
    pub score: f32,
}

/// Immutable chunk/vector pairs for one document.
#[derive(Debug)]
pub struct VectorIndex {
    dims: usize,
    entries: Vec<IndexEntry>,
}

#[derive(Debug)]
struct IndexEntry {
    chunk_index: usize,
    text: String,
    vector: Vec<f32>,
}

impl VectorIndex {
    /// Embed all chunks and build the index.
    ///
    /// Fails if the provider errors, returns the wrong number of vectors,
    /// or returns a vector of unexpected dimensionality. A partially
    /// embedded index would silently corrupt retrieval, so nothing short of
    /// a complete, dimension-checked set is accepted.
    pub async fn build(
        chunks: &[Chunk],
        embedder: &dyn Embedder,
        batch_size: usize,
    ) -> Result<Self> {
        let dims = embedder.dims();
        let mut entries = Vec::with_capacity(chunks.len());

        for batch in chunks.chunks(batch_size.max(1)) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let vectors = embedder.embed(&texts).await?;

            if vectors.len() != batch.len() {
                bail!(
                    "embedding provider returned {} vectors for {} chunks",
                    vectors.len(),
                    batch.len()
                );
            }

            for (chunk, vector) in batch.iter().zip(vectors) {
                if vector.len() != dims {
                    bail!(
                        "embedding for chunk {} has {} dimensions, expected {}",
                        chunk.index,
                        vector.len(),
                        dims
                    );
                }
                entries.push(IndexEntry {
                    chunk_index: chunk.index,
                    text: chunk.text.clone(),
                    vector,
                });
            }
        }

        Ok(Self { dims, entries })
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Return the `top_k` chunks most similar to the query vector, by
    /// descending cosine similarity. Ties break toward the earlier chunk,
    /// so identical inputs always retrieve the same ordered set.
    pub fn search(&self, query: &[f32], top_k: usize) -> Vec<ScoredChunk> {
        let mut scored: Vec<ScoredChunk> = self
            .entries
            .iter()
            .map(|e| ScoredChunk {
                chunk_index: e.chunk_index,
                text: e.text.clone(),
                score: cosine_similarity(query, &e.vector),
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.chunk_index.cmp(&b.chunk_index))
        });
        scored.truncate(top_k);
        scored
    }
}

// ============ Index cache ============

/// Cache key: an index is only reusable for the exact chunking parameters
/// it was built with.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexKey {
    pub document_id: String,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

type Slot = Arc<tokio::sync::Mutex<Option<Arc<VectorIndex>>>>;

/// Per-document cache of built indexes.
///
/// The outer map lock is held only to look up or insert a slot. Each slot
/// has its own async mutex, held across the embedding calls of a build, so
/// at most one build runs per key and concurrent requests for the same
/// uncached document wait on the in-flight build instead of racing it.
pub struct IndexCache {
    slots: Mutex<HashMap<IndexKey, Slot>>,
}

impl IndexCache {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Get or create the build slot for a key. Never blocks on I/O.
    pub fn slot(&self, key: &IndexKey) -> Slot {
        let mut slots = self.slots.lock().unwrap();
        slots.entry(key.clone()).or_default().clone()
    }

    /// Drop all cached indexes for a document (any chunking parameters).
    /// Called when the document is deleted.
    pub fn invalidate_document(&self, document_id: &str) {
        let mut slots = self.slots.lock().unwrap();
        slots.retain(|key, _| key.document_id != document_id);
    }
}

impl Default for IndexCache {
    fn default() -> Self {
        Self::new()
    }
}

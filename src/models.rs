//! Core data types that flow through the upload and question-answering
//! pipeline.

use serde::Serialize;

/// An uploaded PDF document as stored in SQLite.
///
/// Immutable after creation (apart from deletion). The body text is never
/// stored: it is re-extracted from `filepath` whenever an index is built.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    /// Original filename as uploaded.
    pub filename: String,
    /// First line of the extracted text (truncated), or the filename.
    pub title: String,
    /// Where the raw PDF lives on disk.
    pub filepath: String,
    /// Unix seconds.
    pub uploaded_at: i64,
}

/// A window of a document's extracted text.
///
/// Chunks are derived and ephemeral: recomputed on every index build, with
/// no identity beyond their position in the split sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Position in the split sequence, starting at 0.
    pub index: usize,
    pub text: String,
}

/// A persisted question/answer pair. Append-only, never mutated.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRecord {
    pub id: String,
    pub document_id: String,
    pub question: String,
    pub answer: String,
    /// Unix seconds.
    pub created_at: i64,
}

/// Format a unix timestamp as ISO8601 for API responses.
pub fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| ts.to_string())
}

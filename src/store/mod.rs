//! Storage abstraction for documents and question/answer records.
//!
//! The [`Store`] trait defines every persistence operation the upload
//! pipeline and QA engine need. One implementation is chosen at startup
//! and injected — there is no per-call backend dispatch. [`SqliteStore`]
//! is the production backend; [`memory::MemoryStore`] backs the engine
//! tests.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::models::{AnswerRecord, Document};

/// Abstract storage backend.
///
/// All operations are async (via `async-trait`). Implementations must be
/// `Send + Sync` so one instance can be shared across request handlers.
#[async_trait]
pub trait Store: Send + Sync {
    /// Insert a newly uploaded document.
    async fn insert_document(&self, doc: &Document) -> Result<()>;

    /// Look up a document by id.
    async fn find_document(&self, id: &str) -> Result<Option<Document>>;

    /// All documents, newest upload first.
    async fn list_documents(&self) -> Result<Vec<Document>>;

    /// Delete a document and its question records. Returns the deleted
    /// document, or `None` if the id was unknown.
    async fn delete_document(&self, id: &str) -> Result<Option<Document>>;

    /// Persist a question/answer pair as a single atomic insert and return
    /// the stored record with its assigned id and timestamp.
    async fn insert_question_answer(
        &self,
        document_id: &str,
        question: &str,
        answer: &str,
    ) -> Result<AnswerRecord>;

    /// Records for a document ordered by creation time ascending (then id,
    /// for a total order).
    async fn list_questions(&self, document_id: &str) -> Result<Vec<AnswerRecord>>;
}

/// SQLite-backed [`Store`] over an sqlx connection pool.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn document_from_row(row: &sqlx::sqlite::SqliteRow) -> Document {
    Document {
        id: row.get("id"),
        filename: row.get("filename"),
        title: row.get("title"),
        filepath: row.get("filepath"),
        uploaded_at: row.get("uploaded_at"),
    }
}

fn record_from_row(row: &sqlx::sqlite::SqliteRow) -> AnswerRecord {
    AnswerRecord {
        id: row.get("id"),
        document_id: row.get("document_id"),
        question: row.get("question"),
        answer: row.get("answer"),
        created_at: row.get("created_at"),
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn insert_document(&self, doc: &Document) -> Result<()> {
        sqlx::query(
            "INSERT INTO documents (id, filename, title, filepath, uploaded_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&doc.id)
        .bind(&doc.filename)
        .bind(&doc.title)
        .bind(&doc.filepath)
        .bind(doc.uploaded_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_document(&self, id: &str) -> Result<Option<Document>> {
        let row = sqlx::query(
            "SELECT id, filename, title, filepath, uploaded_at FROM documents WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(document_from_row))
    }

    async fn list_documents(&self) -> Result<Vec<Document>> {
        let rows = sqlx::query(
            "SELECT id, filename, title, filepath, uploaded_at FROM documents ORDER BY uploaded_at DESC, id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(document_from_row).collect())
    }

    async fn delete_document(&self, id: &str) -> Result<Option<Document>> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            "SELECT id, filename, title, filepath, uploaded_at FROM documents WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let doc = match row {
            Some(ref row) => document_from_row(row),
            None => return Ok(None),
        };

        // Questions reference documents; delete them first.
        sqlx::query("DELETE FROM questions WHERE document_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Some(doc))
    }

    async fn insert_question_answer(
        &self,
        document_id: &str,
        question: &str,
        answer: &str,
    ) -> Result<AnswerRecord> {
        let record = AnswerRecord {
            id: Uuid::new_v4().to_string(),
            document_id: document_id.to_string(),
            question: question.to_string(),
            answer: answer.to_string(),
            created_at: chrono::Utc::now().timestamp(),
        };

        sqlx::query(
            "INSERT INTO questions (id, document_id, question, answer, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&record.id)
        .bind(&record.document_id)
        .bind(&record.question)
        .bind(&record.answer)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;

        Ok(record)
    }

    async fn list_questions(&self, document_id: &str) -> Result<Vec<AnswerRecord>> {
        let rows = sqlx::query(
            "SELECT id, document_id, question, answer, created_at FROM questions WHERE document_id = ? ORDER BY created_at ASC, id ASC",
        )
        .bind(document_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(record_from_row).collect())
    }
}

//! In-memory [`Store`] implementation for tests.
//!
//! Uses `HashMap` and `Vec` behind `std::sync::RwLock` for thread safety.
//! Ordering semantics match [`SqliteStore`](super::SqliteStore): documents
//! newest-first, questions oldest-first with id tiebreak.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use super::Store;
use crate::models::{AnswerRecord, Document};

/// In-memory store.
pub struct MemoryStore {
    docs: RwLock<HashMap<String, Document>>,
    questions: RwLock<Vec<AnswerRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            docs: RwLock::new(HashMap::new()),
            questions: RwLock::new(Vec::new()),
        }
    }

    /// Total number of persisted question records, across all documents.
    pub fn question_count(&self) -> usize {
        self.questions.read().unwrap().len()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_document(&self, doc: &Document) -> Result<()> {
        self.docs
            .write()
            .unwrap()
            .insert(doc.id.clone(), doc.clone());
        Ok(())
    }

    async fn find_document(&self, id: &str) -> Result<Option<Document>> {
        Ok(self.docs.read().unwrap().get(id).cloned())
    }

    async fn list_documents(&self) -> Result<Vec<Document>> {
        let mut docs: Vec<Document> = self.docs.read().unwrap().values().cloned().collect();
        docs.sort_by(|a, b| {
            b.uploaded_at
                .cmp(&a.uploaded_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(docs)
    }

    async fn delete_document(&self, id: &str) -> Result<Option<Document>> {
        let removed = self.docs.write().unwrap().remove(id);
        if removed.is_some() {
            self.questions
                .write()
                .unwrap()
                .retain(|q| q.document_id != id);
        }
        Ok(removed)
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
        self.questions.write().unwrap().push(record.clone());
        Ok(record)
    }

    async fn list_questions(&self, document_id: &str) -> Result<Vec<AnswerRecord>> {
        let mut records: Vec<AnswerRecord> = self
            .questions
            .read()
            .unwrap()
            .iter()
            .filter(|q| q.document_id == document_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str, uploaded_at: i64) -> Document {
        Document {
            id: id.to_string(),
            filename: format!("{}.pdf", id),
            title: id.to_string(),
            filepath: format!("/tmp/{}.pdf", id),
            uploaded_at,
        }
    }

    #[tokio::test]
    async fn test_documents_listed_newest_first() {
        let store = MemoryStore::new();
        store.insert_document(&doc("old", 100)).await.unwrap();
        store.insert_document(&doc("new", 200)).await.unwrap();

        let docs = store.list_documents().await.unwrap();
        assert_eq!(docs[0].id, "new");
        assert_eq!(docs[1].id, "old");
    }

    #[tokio::test]
    async fn test_delete_removes_questions() {
        let store = MemoryStore::new();
        store.insert_document(&doc("a", 1)).await.unwrap();
        store
            .insert_question_answer("a", "q?", "ans")
            .await
            .unwrap();

        let deleted = store.delete_document("a").await.unwrap();
        assert!(deleted.is_some());
        assert_eq!(store.question_count(), 0);
        assert!(store.find_document("a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_questions_listed_in_creation_order() {
        let store = MemoryStore::new();
        store.insert_document(&doc("a", 1)).await.unwrap();
        let first = store
            .insert_question_answer("a", "first?", "1")
            .await
            .unwrap();
        let second = store
            .insert_question_answer("a", "second?", "2")
            .await
            .unwrap();

        let records = store.list_questions("a").await.unwrap();
        assert_eq!(records.len(), 2);
        // Same-second inserts keep a stable total order via the id tiebreak.
        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        assert!(ids.contains(&first.id.as_str()));
        assert!(ids.contains(&second.id.as_str()));
    }
}

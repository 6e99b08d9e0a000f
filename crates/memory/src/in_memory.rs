//! In-memory vector index for tests and local runs.

use async_trait::async_trait;
use memochat_core::error::MemoryError;
use memochat_core::memory::{VectorIndex, VectorMatch, VectorQuery};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::vector::{VectorRecord, top_k_matches};

/// An index that keeps every record in a Vec and ranks by cosine similarity.
pub struct InMemoryIndex {
    records: Arc<RwLock<Vec<VectorRecord>>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Insert or replace a record by id.
    pub async fn insert(&self, id: impl Into<String>, vector: Vec<f32>, text: impl Into<String>) {
        let record = VectorRecord {
            id: id.into(),
            vector,
            text: Some(text.into()),
        };
        let mut records = self.records.write().await;
        records.retain(|r| r.id != record.id);
        records.push(record);
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

impl Default for InMemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn query(&self, query: VectorQuery) -> Result<Vec<VectorMatch>, MemoryError> {
        if query.vector.is_empty() {
            return Err(MemoryError::QueryFailed("empty query vector".into()));
        }
        let records = self.records.read().await;
        Ok(top_k_matches(&records, &query.vector, query.top_k))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn insert_and_query() {
        let index = InMemoryIndex::new();
        index.insert("a", vec![1.0, 0.0], "Rust ownership notes").await;
        index.insert("b", vec![0.0, 1.0], "Cooking recipes").await;

        let matches = index.query(VectorQuery::new(vec![0.9, 0.1], 1)).await.unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].text.as_deref(), Some("Rust ownership notes"));
    }

    #[tokio::test]
    async fn insert_replaces_same_id() {
        let index = InMemoryIndex::new();
        index.insert("a", vec![1.0], "old").await;
        index.insert("a", vec![1.0], "new").await;
        assert_eq!(index.len().await, 1);

        let matches = index.query(VectorQuery::new(vec![1.0], 5)).await.unwrap();
        assert_eq!(matches[0].text.as_deref(), Some("new"));
    }

    #[tokio::test]
    async fn empty_vector_rejected() {
        let index = InMemoryIndex::new();
        assert!(index.query(VectorQuery::new(vec![], 5)).await.is_err());
        assert!(index.is_empty().await);
    }
}

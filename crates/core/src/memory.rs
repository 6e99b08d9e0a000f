//! Vector index trait for long-term memory lookup by embedding similarity.
//!
//! The similarity algorithm belongs to the index; callers only hand over a
//! query vector and read back ranked matches carrying their source text.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::MemoryError;

/// A nearest-neighbour query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorQuery {
    /// The query embedding
    pub vector: Vec<f32>,

    /// Maximum number of matches
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Optional partition inside the index
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

fn default_top_k() -> usize {
    50
}

impl VectorQuery {
    pub fn new(vector: Vec<f32>, top_k: usize) -> Self {
        Self {
            vector,
            top_k,
            namespace: None,
        }
    }
}

/// One ranked match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorMatch {
    /// Record id inside the index
    pub id: String,

    /// Similarity score (higher = closer)
    pub score: f32,

    /// The text the vector was computed from, if stored with the record
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// The core VectorIndex trait.
///
/// Implementations: Pinecone over HTTP, in-memory (for testing).
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// The backend name (e.g., "pinecone", "in_memory").
    fn name(&self) -> &str;

    /// Return up to `query.top_k` matches, best first.
    async fn query(&self, query: VectorQuery) -> std::result::Result<Vec<VectorMatch>, MemoryError>;
}

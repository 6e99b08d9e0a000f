//! Vector index implementations for memochat long-term memory.

pub mod in_memory;
pub mod pinecone;
pub mod vector;

pub use in_memory::InMemoryIndex;
pub use pinecone::PineconeIndex;
pub use vector::{VectorRecord, cosine_similarity, top_k_matches};

use memochat_config::AppConfig;
use memochat_core::error::MemoryError;
use memochat_core::memory::VectorIndex;
use std::sync::Arc;

/// Build the configured vector index, or `None` when memory is disabled.
pub fn build_from_config(config: &AppConfig) -> Result<Option<Arc<dyn VectorIndex>>, MemoryError> {
    match config.memory.backend.as_str() {
        "none" => Ok(None),
        "pinecone" => {
            let host = config.memory.pinecone_host.clone().ok_or_else(|| {
                MemoryError::NotConfigured("memory.pinecone_host is not set".into())
            })?;
            let api_key = config.memory.pinecone_api_key.clone().ok_or_else(|| {
                MemoryError::NotConfigured("PINECONE_API_KEY is not set".into())
            })?;
            let index = PineconeIndex::new(host, api_key).with_namespace(config.memory.namespace.clone());
            Ok(Some(Arc::new(index)))
        }
        other => Err(MemoryError::NotConfigured(format!("unknown memory backend '{other}'"))),
    }
}

//! Provider trait: the abstraction over the remote model API.
//!
//! A Provider knows how to send a conversation to a chat-completion endpoint,
//! embed text for memory retrieval, and transcribe audio. Each provider is
//! bound to one credential; a [`ProviderFactory`] builds one per resolved
//! credential.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::ProviderError;
use crate::message::Message;

/// Configuration for a completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// The model to use (e.g., "gpt-4o")
    pub model: String,

    /// The final, already budgeted message sequence
    pub messages: Vec<Message>,

    /// Temperature (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

fn default_temperature() -> f32 {
    0.7
}

/// A complete response from a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// The generated message
    pub message: Message,

    /// Token usage statistics
    pub usage: Option<Usage>,

    /// Which model actually responded (may differ from requested)
    pub model: String,
}

/// Token usage information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// An embedding request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRequest {
    /// The model to use for embeddings (e.g., "text-embedding-ada-002").
    pub model: String,

    /// The texts to embed.
    pub inputs: Vec<String>,
}

/// An embedding response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingResponse {
    /// The embedding vectors, one per input text.
    pub embeddings: Vec<Vec<f32>>,

    /// Which model was used.
    pub model: String,

    /// Token usage.
    pub usage: Option<Usage>,
}

/// An audio transcription request.
#[derive(Debug, Clone)]
pub struct TranscriptionRequest {
    /// The speech-to-text model (e.g., "whisper-1").
    pub model: String,

    /// File name sent with the upload; the extension tells the API the format.
    pub file_name: String,

    /// Raw audio bytes.
    pub audio: Vec<u8>,
}

/// Text recognized from an audio upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transcription {
    pub text: String,
}

/// Where a credential came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialSource {
    /// A key the user supplied themselves
    Custom,
    /// The operator's shared key
    Shared,
}

/// An API key together with its origin.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub api_key: String,
    pub source: CredentialSource,
}

impl Credential {
    pub fn custom(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            source: CredentialSource::Custom,
        }
    }

    pub fn shared(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            source: CredentialSource::Shared,
        }
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("api_key", &"[REDACTED]")
            .field("source", &self.source)
            .finish()
    }
}

/// The core Provider trait.
///
/// The orchestrator calls `complete()`, `embed()` and `transcribe()` without
/// knowing which backend is in use.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "openai").
    fn name(&self) -> &str;

    /// Send a request and get a complete response.
    async fn complete(&self, request: ProviderRequest) -> std::result::Result<ProviderResponse, ProviderError>;

    /// Generate embeddings for the given texts.
    ///
    /// Default implementation returns an error indicating embeddings aren't supported.
    async fn embed(
        &self,
        _request: EmbeddingRequest,
    ) -> std::result::Result<EmbeddingResponse, ProviderError> {
        Err(ProviderError::Unknown(format!(
            "Provider '{}' does not support embeddings",
            self.name()
        )))
    }

    /// Transcribe an audio upload to text.
    ///
    /// Default implementation returns an error indicating transcription isn't supported.
    async fn transcribe(
        &self,
        _request: TranscriptionRequest,
    ) -> std::result::Result<Transcription, ProviderError> {
        Err(ProviderError::Unknown(format!(
            "Provider '{}' does not support transcription",
            self.name()
        )))
    }
}

/// Builds a provider bound to a specific credential.
pub trait ProviderFactory: Send + Sync {
    fn for_credential(&self, credential: &Credential) -> Arc<dyn Provider>;
}

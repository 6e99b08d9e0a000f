//! Shared test helpers for pipeline tests.

use memochat_core::error::ProviderError;
use memochat_core::message::Message;
use memochat_core::provider::{
    Credential, EmbeddingRequest, EmbeddingResponse, Provider, ProviderFactory, ProviderRequest,
    ProviderResponse, Transcription, TranscriptionRequest, Usage,
};
use memochat_core::tokenizer::{Token, Tokenizer};
use std::sync::{Arc, Mutex};

/// One token per `char`, so budgets in tests are exact character counts.
pub struct CharTokenizer;

impl Tokenizer for CharTokenizer {
    fn encode(&self, text: &str) -> Vec<Token> {
        text.chars().map(|c| c as Token).collect()
    }

    fn decode(&self, tokens: &[Token]) -> String {
        tokens.iter().filter_map(|t| char::from_u32(*t)).collect()
    }
}

/// A provider that answers every call from a script and records what it saw.
pub struct ScriptedProvider {
    completions: Mutex<Vec<Result<ProviderResponse, ProviderError>>>,
    transcriptions: Mutex<Vec<Result<Transcription, ProviderError>>>,
    embedding: Vec<f32>,
    requests: Mutex<Vec<ProviderRequest>>,
    embed_inputs: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    pub fn new(completions: Vec<Result<ProviderResponse, ProviderError>>) -> Self {
        Self {
            completions: Mutex::new(completions),
            transcriptions: Mutex::new(Vec::new()),
            embedding: vec![1.0, 0.0],
            requests: Mutex::new(Vec::new()),
            embed_inputs: Mutex::new(Vec::new()),
        }
    }

    pub fn answering(text: &str) -> Self {
        Self::new(vec![Ok(make_text_response(text))])
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = embedding;
        self
    }

    pub fn with_transcriptions(self, results: Vec<Result<Transcription, ProviderError>>) -> Self {
        *self.transcriptions.lock().unwrap() = results;
        self
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn embed_inputs(&self) -> Vec<String> {
        self.embed_inputs.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.requests.lock().unwrap().push(request);
        let mut script = self.completions.lock().unwrap();
        if script.is_empty() {
            panic!("ScriptedProvider: no more completions scripted");
        }
        script.remove(0)
    }

    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse, ProviderError> {
        self.embed_inputs
            .lock()
            .unwrap()
            .extend(request.inputs.iter().cloned());
        Ok(EmbeddingResponse {
            embeddings: request.inputs.iter().map(|_| self.embedding.clone()).collect(),
            model: request.model,
            usage: None,
        })
    }

    async fn transcribe(&self, _request: TranscriptionRequest) -> Result<Transcription, ProviderError> {
        let mut script = self.transcriptions.lock().unwrap();
        if script.is_empty() {
            panic!("ScriptedProvider: no more transcriptions scripted");
        }
        script.remove(0)
    }
}

/// Hands out the same provider for every credential, remembering which keys
/// were asked for.
pub struct StaticFactory {
    provider: Arc<ScriptedProvider>,
    keys: Mutex<Vec<String>>,
}

impl StaticFactory {
    pub fn new(provider: Arc<ScriptedProvider>) -> Self {
        Self {
            provider,
            keys: Mutex::new(Vec::new()),
        }
    }

    pub fn keys(&self) -> Vec<String> {
        self.keys.lock().unwrap().clone()
    }
}

impl ProviderFactory for StaticFactory {
    fn for_credential(&self, credential: &Credential) -> Arc<dyn Provider> {
        self.keys.lock().unwrap().push(credential.api_key.clone());
        self.provider.clone()
    }
}

/// Create a simple text response with usage attached.
pub fn make_text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "test-model".into(),
    }
}

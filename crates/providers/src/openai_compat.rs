//! OpenAI-compatible provider implementation.
//!
//! Works with OpenAI and any endpoint exposing the same REST surface.
//!
//! Supports:
//! - Chat completions with text and image content parts
//! - Embeddings for long-term memory retrieval
//! - Audio transcription (multipart upload)

use async_trait::async_trait;
use memochat_core::error::ProviderError;
use memochat_core::message::{Content, Message, Role};
use memochat_core::provider::*;
use serde::Deserialize;
use tracing::{debug, warn};

/// An OpenAI-compatible provider bound to one API key.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Create a new OpenAI-compatible provider with its own HTTP client.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self::with_client(reqwest::Client::new(), name, base_url, api_key)
    }

    /// Create a provider sharing an existing HTTP client.
    ///
    /// No client-level timeout is set; deadlines are enforced by the retry
    /// policy racing each call against a timer.
    pub fn with_client(
        client: reqwest::Client,
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        }
    }

    /// Create an OpenAI provider (convenience constructor).
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self::new("openai", "https://api.openai.com/v1", api_key)
    }

    /// Turn a non-success response into a structured rejection.
    async fn rejection(response: reqwest::Response) -> ProviderError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        let rejection = parse_api_error(status, &body);
        warn!(status, body = %body, provider_error = %rejection, "Provider returned error");
        rejection
    }
}

/// Build an `ApiRejection` from an error body. Bodies of the shape
/// `{"error": {"message", "type", "code"}}` are unpacked; anything else is
/// kept verbatim as the message.
pub(crate) fn parse_api_error(status: u16, body: &str) -> ProviderError {
    match serde_json::from_str::<ApiErrorEnvelope>(body) {
        Ok(envelope) => ProviderError::ApiRejection {
            status,
            code: envelope.error.code.and_then(|code| match code {
                serde_json::Value::Null => None,
                serde_json::Value::String(s) => Some(s),
                other => Some(other.to_string()),
            }),
            message: envelope.error.message,
            error_type: envelope.error.r#type,
        },
        Err(_) => ProviderError::ApiRejection {
            status,
            code: None,
            message: body.to_string(),
            error_type: None,
        },
    }
}

#[async_trait]
impl memochat_core::Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);

        let mut body = serde_json::json!({
            "model": request.model,
            "messages": request.messages,
            "temperature": request.temperature,
        });

        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        debug!(
            provider = %self.name,
            model = %request.model,
            messages = request.messages.len(),
            "Sending completion request"
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Unknown(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::rejection(response).await);
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Unknown(format!("Failed to parse response: {e}")))?;

        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Unknown("No choices in response".into()))?;

        let message = Message {
            role: Role::Assistant,
            content: Content::Text(choice.message.content.unwrap_or_default()),
        };

        let usage = api_response.usage.map(|u| Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        Ok(ProviderResponse {
            message,
            usage,
            model: api_response.model,
        })
    }

    async fn embed(
        &self,
        request: EmbeddingRequest,
    ) -> std::result::Result<EmbeddingResponse, ProviderError> {
        let url = format!("{}/embeddings", self.base_url);

        let body = serde_json::json!({
            "model": request.model,
            "input": request.inputs,
            "encoding_format": "float",
        });

        debug!(
            provider = %self.name,
            model = %request.model,
            count = request.inputs.len(),
            "Sending embedding request"
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Unknown(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::rejection(response).await);
        }

        let api_resp: EmbeddingApiResponse = response.json().await.map_err(|e| {
            ProviderError::Unknown(format!("Failed to parse embedding response: {e}"))
        })?;

        let embeddings = api_resp.data.into_iter().map(|d| d.embedding).collect();

        let usage = api_resp.usage.map(|u| Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: 0,
            total_tokens: u.total_tokens,
        });

        Ok(EmbeddingResponse {
            embeddings,
            model: api_resp.model,
            usage,
        })
    }

    async fn transcribe(
        &self,
        request: TranscriptionRequest,
    ) -> std::result::Result<Transcription, ProviderError> {
        let url = format!("{}/audio/transcriptions", self.base_url);

        debug!(
            provider = %self.name,
            model = %request.model,
            bytes = request.audio.len(),
            "Sending transcription request"
        );

        let file = reqwest::multipart::Part::bytes(request.audio).file_name(request.file_name);
        let form = reqwest::multipart::Form::new()
            .text("model", request.model)
            .part("file", file);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ProviderError::Unknown(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::rejection(response).await);
        }

        response.json::<Transcription>().await.map_err(|e| {
            ProviderError::Unknown(format!("Failed to parse transcription response: {e}"))
        })
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Deserialize)]
struct ApiResponse {
    model: String,
    choices: Vec<ApiChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ApiResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
    #[serde(default)]
    r#type: Option<String>,
    #[serde(default)]
    code: Option<serde_json::Value>,
}

// --- Embedding API types ---

#[derive(Debug, Deserialize)]
struct EmbeddingApiResponse {
    data: Vec<EmbeddingData>,
    model: String,
    usage: Option<EmbeddingApiUsage>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingApiUsage {
    prompt_tokens: u32,
    total_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use memochat_core::Provider;
    use memochat_core::message::ContentPart;

    #[test]
    fn openai_constructor() {
        let provider = OpenAiCompatProvider::openai("sk-test");
        assert_eq!(provider.name(), "openai");
        assert!(provider.base_url.contains("api.openai.com"));
    }

    #[test]
    fn trailing_slash_trimmed() {
        let provider = OpenAiCompatProvider::new("local", "http://localhost:8080/v1/", "k");
        assert_eq!(provider.base_url, "http://localhost:8080/v1");
    }

    #[test]
    fn request_messages_serialize_in_wire_shape() {
        let messages = vec![
            Message::assistant("You are helpful"),
            Message::user(vec![
                ContentPart::text("look"),
                ContentPart::image("https://example.com/a.png"),
            ]),
        ];
        let body = serde_json::json!({ "messages": messages });
        assert_eq!(body["messages"][0]["role"], "assistant");
        assert_eq!(body["messages"][0]["content"], "You are helpful");
        assert_eq!(body["messages"][1]["content"][1]["type"], "image_url");
    }

    #[test]
    fn structured_error_body_is_unpacked() {
        let body = r#"{"error":{"message":"Incorrect API key provided","type":"invalid_request_error","code":"invalid_api_key"}}"#;
        match parse_api_error(401, body) {
            ProviderError::ApiRejection {
                status,
                code,
                message,
                error_type,
            } => {
                assert_eq!(status, 401);
                assert_eq!(code.as_deref(), Some("invalid_api_key"));
                assert_eq!(message, "Incorrect API key provided");
                assert_eq!(error_type.as_deref(), Some("invalid_request_error"));
            }
            other => panic!("Expected ApiRejection, got: {other:?}"),
        }
    }

    #[test]
    fn null_code_and_plain_body() {
        let body = r#"{"error":{"message":"overloaded","type":"server_error","code":null}}"#;
        match parse_api_error(503, body) {
            ProviderError::ApiRejection { code, .. } => assert!(code.is_none()),
            other => panic!("Expected ApiRejection, got: {other:?}"),
        }

        match parse_api_error(502, "Bad Gateway") {
            ProviderError::ApiRejection { message, .. } => assert_eq!(message, "Bad Gateway"),
            other => panic!("Expected ApiRejection, got: {other:?}"),
        }
    }

    #[test]
    fn parse_completion_response() {
        let data = r#"{
            "model": "gpt-4o-2024-08-06",
            "choices": [{"message": {"role": "assistant", "content": "Hi there"}}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 3, "total_tokens": 15}
        }"#;
        let parsed: ApiResponse = serde_json::from_str(data).unwrap();
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some("Hi there"));
        assert_eq!(parsed.usage.unwrap().total_tokens, 15);
    }

    #[test]
    fn parse_embedding_response() {
        let data = r#"{
            "data": [
                {"embedding": [0.1, 0.2, 0.3], "index": 0}
            ],
            "model": "text-embedding-ada-002",
            "usage": {"prompt_tokens": 8, "total_tokens": 8}
        }"#;
        let parsed: EmbeddingApiResponse = serde_json::from_str(data).unwrap();
        assert_eq!(parsed.data[0].embedding, vec![0.1, 0.2, 0.3]);
        assert_eq!(parsed.usage.unwrap().prompt_tokens, 8);
    }

    #[test]
    fn parse_transcription_response() {
        let parsed: Transcription = serde_json::from_str(r#"{"text":"привет"}"#).unwrap();
        assert_eq!(parsed.text, "привет");
    }
}

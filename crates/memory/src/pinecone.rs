//! Pinecone vector index over its data-plane REST API.
//!
//! Only the query path is used: `POST {host}/query` with the `Api-Key`
//! header. Record text is read from `metadata.text`.

use async_trait::async_trait;
use memochat_core::error::MemoryError;
use memochat_core::memory::{VectorIndex, VectorMatch, VectorQuery};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// A Pinecone index client.
pub struct PineconeIndex {
    host: String,
    api_key: String,
    namespace: Option<String>,
    client: reqwest::Client,
}

impl PineconeIndex {
    /// Create a client for the index served at `host`.
    pub fn new(host: impl Into<String>, api_key: impl Into<String>) -> Self {
        let host = host.into();
        let host = if host.starts_with("http://") || host.starts_with("https://") {
            host
        } else {
            format!("https://{host}")
        };
        Self {
            host: host.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            namespace: None,
            client: reqwest::Client::new(),
        }
    }

    /// Query inside a namespace unless the query names its own.
    pub fn with_namespace(mut self, namespace: Option<String>) -> Self {
        self.namespace = namespace;
        self
    }

    fn body(&self, query: &VectorQuery) -> QueryBody {
        QueryBody {
            vector: query.vector.clone(),
            top_k: query.top_k,
            include_values: false,
            include_metadata: true,
            namespace: query.namespace.clone().or_else(|| self.namespace.clone()),
        }
    }
}

#[async_trait]
impl VectorIndex for PineconeIndex {
    fn name(&self) -> &str {
        "pinecone"
    }

    async fn query(&self, query: VectorQuery) -> Result<Vec<VectorMatch>, MemoryError> {
        let url = format!("{}/query", self.host);
        let body = self.body(&query);

        debug!(top_k = body.top_k, dims = body.vector.len(), "Querying Pinecone");

        let response = self
            .client
            .post(&url)
            .header("Api-Key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| MemoryError::QueryFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), body = %error_body, "Pinecone query failed");
            return Err(MemoryError::QueryFailed(format!(
                "status {}: {error_body}",
                status.as_u16()
            )));
        }

        let parsed: QueryResponse = response
            .json()
            .await
            .map_err(|e| MemoryError::QueryFailed(format!("Failed to parse response: {e}")))?;

        Ok(parsed.into_matches())
    }
}

// --- Pinecone API types (internal) ---

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryBody {
    vector: Vec<f32>,
    top_k: usize,
    include_values: bool,
    include_metadata: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<ApiMatch>,
}

#[derive(Debug, Deserialize)]
struct ApiMatch {
    id: String,
    #[serde(default)]
    score: f32,
    #[serde(default)]
    metadata: Option<serde_json::Map<String, serde_json::Value>>,
}

impl QueryResponse {
    fn into_matches(self) -> Vec<VectorMatch> {
        self.matches
            .into_iter()
            .map(|m| VectorMatch {
                id: m.id,
                score: m.score,
                text: m
                    .metadata
                    .as_ref()
                    .and_then(|meta| meta.get("text"))
                    .and_then(|text| text.as_str())
                    .map(String::from),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_host_gets_https_scheme() {
        let index = PineconeIndex::new("idx-123.svc.pinecone.io/", "key");
        assert_eq!(index.host, "https://idx-123.svc.pinecone.io");
    }

    #[test]
    fn query_body_matches_wire_format() {
        let index = PineconeIndex::new("https://idx", "key").with_namespace(Some("docs".into()));
        let body = serde_json::to_value(index.body(&VectorQuery::new(vec![0.5, 0.25], 50))).unwrap();
        assert_eq!(body["topK"], 50);
        assert_eq!(body["includeValues"], false);
        assert_eq!(body["includeMetadata"], true);
        assert_eq!(body["namespace"], "docs");
        assert_eq!(body["vector"][1], 0.25);
    }

    #[test]
    fn query_namespace_overrides_default() {
        let index = PineconeIndex::new("https://idx", "key").with_namespace(Some("docs".into()));
        let mut query = VectorQuery::new(vec![1.0], 3);
        query.namespace = Some("faq".into());
        assert_eq!(index.body(&query).namespace.as_deref(), Some("faq"));
    }

    #[test]
    fn parse_matches_with_and_without_text() {
        let raw = r#"{
            "matches": [
                {"id": "a", "score": 0.92, "metadata": {"text": "Chapter one"}},
                {"id": "b", "score": 0.80, "metadata": {"source": "x.pdf"}},
                {"id": "c", "score": 0.75}
            ],
            "namespace": ""
        }"#;
        let parsed: QueryResponse = serde_json::from_str(raw).unwrap();
        let matches = parsed.into_matches();
        assert_eq!(matches.len(), 3);
        assert_eq!(matches[0].text.as_deref(), Some("Chapter one"));
        assert!(matches[1].text.is_none());
        assert!(matches[2].text.is_none());
    }
}

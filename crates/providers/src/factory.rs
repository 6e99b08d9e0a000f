//! Provider factory: one provider per resolved credential.
//!
//! The access gate decides which key a request runs under; the factory turns
//! that key into a provider while sharing a single HTTP connection pool.

use memochat_config::AppConfig;
use memochat_core::provider::{Credential, Provider, ProviderFactory};
use std::sync::Arc;

use crate::openai_compat::OpenAiCompatProvider;

/// Builds [`OpenAiCompatProvider`]s against a fixed base URL.
pub struct OpenAiCompatFactory {
    name: String,
    base_url: String,
    client: reqwest::Client,
}

impl OpenAiCompatFactory {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Build from configuration.
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new("openai", config.api_url.clone())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl ProviderFactory for OpenAiCompatFactory {
    fn for_credential(&self, credential: &Credential) -> Arc<dyn Provider> {
        Arc::new(OpenAiCompatProvider::with_client(
            self.client.clone(),
            self.name.clone(),
            self.base_url.clone(),
            credential.api_key.clone(),
        ))
    }
}

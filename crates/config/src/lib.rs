//! Configuration loading, validation, and management for memochat.
//!
//! Loads configuration from `~/.memochat/config.toml`, then applies a `.env`
//! file from the working directory and environment variable overrides.
//! Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.memochat/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// The operator's shared API key, granted to premium and trial users
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// OpenAI-compatible base URL
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Chat model
    #[serde(default = "default_model")]
    pub model: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Fixed prompt placed at the head of every request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_prompt: Option<String>,

    /// Retry and timeout policy for remote calls
    #[serde(default)]
    pub completion: CompletionConfig,

    /// Token ceilings and weights
    #[serde(default)]
    pub budget: BudgetConfig,

    /// Long-term memory (vector index) configuration
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Access tiers and the user database
    #[serde(default)]
    pub access: AccessConfig,
}

fn default_api_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-4o".into()
}
fn default_temperature() -> f32 {
    0.7
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("default_prompt", &self.default_prompt)
            .field("completion", &self.completion)
            .field("budget", &self.budget)
            .field("memory", &self.memory)
            .field("access", &self.access)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    /// Total attempts for a chat completion
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Per-attempt deadline in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Total attempts for an audio transcription
    #[serde(default = "default_transcription_attempts")]
    pub transcription_attempts: u32,

    #[serde(default = "default_transcription_model")]
    pub transcription_model: String,
}

fn default_retries() -> u32 {
    5
}
fn default_timeout_ms() -> u64 {
    300_000
}
fn default_transcription_attempts() -> u32 {
    3
}
fn default_transcription_model() -> String {
    "whisper-1".into()
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            retries: default_retries(),
            timeout_ms: default_timeout_ms(),
            transcription_attempts: default_transcription_attempts(),
            transcription_model: default_transcription_model(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetConfig {
    /// Ceiling for prompt + reference + history in one request
    #[serde(default = "default_max_request_tokens")]
    pub max_request_tokens: usize,

    /// Flat cost charged for every image part
    #[serde(default = "default_image_token_weight")]
    pub image_token_weight: usize,

    /// Ceiling for the text sent to the embedding model
    #[serde(default = "default_embedding_input_cap")]
    pub embedding_input_cap: usize,
}

fn default_max_request_tokens() -> usize {
    12_000
}
fn default_image_token_weight() -> usize {
    800
}
fn default_embedding_input_cap() -> usize {
    8192
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            max_request_tokens: default_max_request_tokens(),
            image_token_weight: default_image_token_weight(),
            embedding_input_cap: default_embedding_input_cap(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// "none" or "pinecone"
    #[serde(default = "default_memory_backend")]
    pub backend: String,

    /// Index host, e.g. `https://my-index-abc123.svc.us-east1-gcp.pinecone.io`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pinecone_host: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pinecone_api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    #[serde(default = "default_top_k")]
    pub top_k: usize,

    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Sentence placed before the retrieved text
    #[serde(default = "default_reference_label")]
    pub reference_label: String,
}

fn default_memory_backend() -> String {
    "none".into()
}
fn default_top_k() -> usize {
    50
}
fn default_embedding_model() -> String {
    "text-embedding-ada-002".into()
}
fn default_reference_label() -> String {
    "Related to this conversation document parts:".into()
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            backend: default_memory_backend(),
            pinecone_host: None,
            pinecone_api_key: None,
            namespace: None,
            top_k: default_top_k(),
            embedding_model: default_embedding_model(),
            reference_label: default_reference_label(),
        }
    }
}

impl std::fmt::Debug for MemoryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryConfig")
            .field("backend", &self.backend)
            .field("pinecone_host", &self.pinecone_host)
            .field("pinecone_api_key", &redact(&self.pinecone_api_key))
            .field("namespace", &self.namespace)
            .field("top_k", &self.top_k)
            .field("embedding_model", &self.embedding_model)
            .field("reference_label", &self.reference_label)
            .finish()
    }
}

impl MemoryConfig {
    pub fn is_enabled(&self) -> bool {
        self.backend != "none"
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessConfig {
    /// Lifetime tokens a trial user may consume on the shared key
    #[serde(default = "default_max_trial_tokens")]
    pub max_trial_tokens: u64,

    /// SQLite URL of the user database; defaults under the config dir
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,
}

fn default_max_trial_tokens() -> u64 {
    100_000
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            max_trial_tokens: default_max_trial_tokens(),
            database_url: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.memochat/config.toml).
    ///
    /// A `.env` file in the working directory is read first. Then environment
    /// variables override the file:
    /// - `MEMOCHAT_API_KEY`, then `OPENAI_API_KEY`
    /// - `MEMOCHAT_MODEL`
    /// - `MEMOCHAT_DEFAULT_PROMPT`
    /// - `PINECONE_API_KEY`, `PINECONE_HOST`
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!("Loaded environment from {}", path.display());
        }

        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup (the process environment in
    /// production).
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.api_key.is_none() {
            self.api_key = lookup("MEMOCHAT_API_KEY").or_else(|| lookup("OPENAI_API_KEY"));
        }

        if let Some(model) = lookup("MEMOCHAT_MODEL") {
            self.model = model;
        }

        if let Some(prompt) = lookup("MEMOCHAT_DEFAULT_PROMPT") {
            self.default_prompt = Some(prompt);
        }

        if self.memory.pinecone_api_key.is_none() {
            self.memory.pinecone_api_key = lookup("PINECONE_API_KEY");
        }

        if let Some(host) = lookup("PINECONE_HOST") {
            self.memory.pinecone_host = Some(host);
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".memochat")
    }

    /// The user database URL, falling back to `~/.memochat/users.db`.
    pub fn database_url(&self) -> String {
        self.access.database_url.clone().unwrap_or_else(|| {
            format!("sqlite://{}", Self::config_dir().join("users.db").display())
        })
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.completion.retries == 0 {
            return Err(ConfigError::ValidationError(
                "completion.retries must be at least 1".into(),
            ));
        }

        if self.completion.transcription_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "completion.transcription_attempts must be at least 1".into(),
            ));
        }

        if self.budget.max_request_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "budget.max_request_tokens must be > 0".into(),
            ));
        }

        if self.memory.top_k == 0 {
            return Err(ConfigError::ValidationError(
                "memory.top_k must be > 0".into(),
            ));
        }

        match self.memory.backend.as_str() {
            "none" => {}
            "pinecone" => {
                if self.memory.pinecone_host.is_none() {
                    return Err(ConfigError::ValidationError(
                        "memory.pinecone_host is required for the pinecone backend".into(),
                    ));
                }
            }
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "unknown memory backend '{other}'"
                )));
            }
        }

        Ok(())
    }

    /// Check if the shared API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: default_api_url(),
            model: default_model(),
            temperature: default_temperature(),
            default_prompt: None,
            completion: CompletionConfig::default(),
            budget: BudgetConfig::default(),
            memory: MemoryConfig::default(),
            access: AccessConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.completion.retries, 5);
        assert_eq!(config.budget.image_token_weight, 800);
        assert_eq!(config.budget.embedding_input_cap, 8192);
        assert_eq!(config.memory.top_k, 50);
        assert!(!config.memory.is_enabled());
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.model, config.model);
        assert_eq!(parsed.budget.max_request_tokens, config.budget.max_request_tokens);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let config = AppConfig {
            temperature: 5.0,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_retries_rejected() {
        let mut config = AppConfig::default();
        config.completion.retries = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn pinecone_backend_requires_host() {
        let mut config = AppConfig::default();
        config.memory.backend = "pinecone".into();
        assert!(config.validate().is_err());

        config.memory.pinecone_host = Some("https://idx.pinecone.io".into());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn unknown_memory_backend_rejected() {
        let mut config = AppConfig::default();
        config.memory.backend = "redis".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = AppConfig::load_from(Path::new("/nonexistent/config.toml"));
        assert!(result.is_ok());
        assert_eq!(result.unwrap().model, "gpt-4o");
    }

    #[test]
    fn partial_file_keeps_section_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
model = "gpt-4o-mini"
default_prompt = "You are a helpful voice assistant."

[budget]
max_request_tokens = 4000

[access]
max_trial_tokens = 500
"#,
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.budget.max_request_tokens, 4000);
        assert_eq!(config.budget.image_token_weight, 800);
        assert_eq!(config.access.max_trial_tokens, 500);
        assert_eq!(
            config.default_prompt.as_deref(),
            Some("You are a helpful voice assistant.")
        );
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "model = [").unwrap();
        assert!(matches!(
            AppConfig::load_from(&path),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn env_overrides_apply() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("OPENAI_API_KEY", "sk-shared"),
            ("MEMOCHAT_MODEL", "gpt-4.1"),
            ("PINECONE_API_KEY", "pc-key"),
        ]);
        let mut config = AppConfig::default();
        config.apply_env_overrides(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.api_key.as_deref(), Some("sk-shared"));
        assert_eq!(config.model, "gpt-4.1");
        assert_eq!(config.memory.pinecone_api_key.as_deref(), Some("pc-key"));
    }

    #[test]
    fn file_api_key_wins_over_env() {
        let mut config = AppConfig {
            api_key: Some("sk-file".into()),
            ..AppConfig::default()
        };
        config.apply_env_overrides(|k| (k == "OPENAI_API_KEY").then(|| "sk-env".to_string()));
        assert_eq!(config.api_key.as_deref(), Some("sk-file"));
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let mut config = AppConfig {
            api_key: Some("sk-secret".into()),
            ..AppConfig::default()
        };
        config.memory.pinecone_api_key = Some("pc-secret".into());
        let shown = format!("{config:?}");
        assert!(!shown.contains("sk-secret"));
        assert!(!shown.contains("pc-secret"));
    }

    #[test]
    fn explicit_database_url_is_used() {
        let mut config = AppConfig::default();
        config.access.database_url = Some("sqlite::memory:".into());
        assert_eq!(config.database_url(), "sqlite::memory:");
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("gpt-4o"));
        assert!(toml_str.contains("max_request_tokens"));
    }
}

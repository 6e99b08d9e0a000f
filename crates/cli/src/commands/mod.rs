//! Subcommand implementations and the wiring they share.

pub mod ask;
pub mod config_cmd;
pub mod transcribe;
pub mod usage;

use memochat_access::{AccessGate, SqliteUserStore};
use memochat_agent::{OrchestratorSettings, RequestOrchestrator, TiktokenTokenizer};
use memochat_config::AppConfig;
use memochat_core::user::UserIdentity;
use memochat_providers::OpenAiCompatFactory;
use std::sync::Arc;

use crate::UserArgs;

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

impl UserArgs {
    pub fn identity(&self) -> UserIdentity {
        UserIdentity {
            user_id: self.user_id,
            username: self.username.clone(),
            language_code: self.lang.clone(),
        }
    }
}

/// Load config and fail early, with setup hints, when no shared key is set.
fn load_config() -> CliResult<AppConfig> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    MEMOCHAT_API_KEY=sk-...");
        eprintln!("    OPENAI_API_KEY=sk-...");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }
    Ok(config)
}

/// Open the user database, creating `~/.memochat` when the default is used.
async fn open_store(config: &AppConfig) -> CliResult<Arc<SqliteUserStore>> {
    if config.access.database_url.is_none() {
        std::fs::create_dir_all(AppConfig::config_dir())?;
    }
    let store = SqliteUserStore::new(&config.database_url()).await?;
    Ok(Arc::new(store))
}

/// Wire the full pipeline from configuration.
async fn build_orchestrator(config: &AppConfig) -> CliResult<RequestOrchestrator> {
    let store = open_store(config).await?;
    let gate = AccessGate::from_config(store.clone(), config)?;
    let factory = Arc::new(OpenAiCompatFactory::from_config(config));
    let tokenizer = Arc::new(TiktokenTokenizer::for_model(&config.model)?);
    let index = memochat_memory::build_from_config(config)?;

    Ok(RequestOrchestrator::new(
        gate,
        factory,
        store,
        tokenizer,
        index,
        OrchestratorSettings::from_config(config),
    ))
}

//! `memochat config`: configuration management commands.

use memochat_config::AppConfig;

use super::CliResult;

pub fn show() -> CliResult<()> {
    let config = AppConfig::load()?;
    println!("{config:#?}");
    Ok(())
}

pub fn validate() -> CliResult<()> {
    println!("Validating configuration...");

    match AppConfig::load() {
        Ok(config) => {
            println!("   Config parsed successfully");

            if config.has_api_key() {
                println!("   All checks passed");
            } else {
                println!("   Warning: no API key set (MEMOCHAT_API_KEY or OPENAI_API_KEY)");
            }

            println!();
            println!("   Model:     {}", config.model);
            println!("   API URL:   {}", config.api_url);
            println!("   Ceiling:   {} tokens per request", config.budget.max_request_tokens);
            println!("   Memory:    {}", config.memory.backend);
            println!("   Trial:     {} tokens", config.access.max_trial_tokens);
            println!("   Database:  {}", config.database_url());
            Ok(())
        }
        Err(e) => {
            println!("   Config error: {e}");
            Err(e.into())
        }
    }
}

pub fn init() -> CliResult<()> {
    let dir = AppConfig::config_dir();
    let path = dir.join("config.toml");
    if path.exists() {
        println!("Config already exists at {}", path.display());
        return Ok(());
    }
    std::fs::create_dir_all(&dir)?;
    std::fs::write(&path, AppConfig::default_toml())?;
    println!("Wrote starter config to {}", path.display());
    Ok(())
}

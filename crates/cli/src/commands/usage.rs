//! `memochat usage`: a user's tier and trial consumption.

use memochat_core::user::{UsageLedger, UserStore};

use super::{CliResult, open_store};
use crate::UserArgs;

pub async fn run(user: UserArgs) -> CliResult<()> {
    let config = memochat_config::AppConfig::load()?;
    let store = open_store(&config).await?;

    let Some(record) = store.get(user.user_id).await? else {
        println!("No record for user {}.", user.user_id);
        return Ok(());
    };
    let used = store.lifetime_tokens_used(user.user_id).await?;
    let ceiling = config.access.max_trial_tokens;

    println!("Usage for user {}", record.user_id);
    println!("─────────────────────────────────────");
    if let Some(name) = &record.username {
        println!("  Username:    {name}");
    }
    println!(
        "  Tier:        {}",
        record.usage_tier.map_or("unknown", |t| t.as_str())
    );
    println!(
        "  Custom key:  {}",
        if record.custom_api_key.is_some() { "yes" } else { "no" }
    );
    let pct = if ceiling > 0 {
        (used as f64 / ceiling as f64 * 100.0).min(100.0)
    } else {
        100.0
    };
    println!("  Tokens used: {used} / {ceiling} trial tokens ({pct:.1}%)");

    Ok(())
}

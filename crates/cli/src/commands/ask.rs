//! `memochat ask`: one message through the full pipeline.

use memochat_core::message::Message;
use std::path::{Path, PathBuf};

use super::{CliResult, build_orchestrator, load_config};
use crate::UserArgs;

pub async fn run(
    user: UserArgs,
    message: String,
    history: Option<PathBuf>,
    save: bool,
) -> CliResult<()> {
    let config = load_config()?;
    let orchestrator = build_orchestrator(&config).await?;

    let mut messages = match &history {
        Some(path) => read_history(path)?,
        None => Vec::new(),
    };
    messages.push(Message::user(message));

    let reply = match orchestrator.handle(&user.identity(), &messages).await {
        Ok(reply) => reply,
        Err(e) if e.is_access_denied() => {
            eprintln!("Your trial is over. Register your own API key or upgrade to premium.");
            return Err(e.into());
        }
        Err(e) => return Err(e.into()),
    };

    println!("{}", reply.response.message.content.as_text());

    if let (Some(path), true) = (&history, save) {
        messages.push(reply.response.message.clone());
        write_history(path, &messages)?;
    }

    tracing::debug!(
        tier = %reply.tier,
        messages_sent = reply.messages_sent,
        tokens = reply.accounting.total(),
        "Reply delivered"
    );
    Ok(())
}

/// A missing file is an empty history.
fn read_history(path: &Path) -> CliResult<Vec<Message>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let raw = std::fs::read_to_string(path)?;
    let messages = serde_json::from_str(&raw)
        .map_err(|e| format!("Invalid history file {}: {e}", path.display()))?;
    Ok(messages)
}

fn write_history(path: &Path, messages: &[Message]) -> CliResult<()> {
    std::fs::write(path, serde_json::to_string_pretty(messages)?)?;
    Ok(())
}

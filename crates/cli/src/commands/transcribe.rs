//! `memochat transcribe`: audio file to text.

use std::path::PathBuf;

use super::{CliResult, build_orchestrator, load_config};
use crate::UserArgs;

pub async fn run(user: UserArgs, file: PathBuf) -> CliResult<()> {
    let config = load_config()?;
    let orchestrator = build_orchestrator(&config).await?;

    let audio = std::fs::read(&file)
        .map_err(|e| format!("Failed to read {}: {e}", file.display()))?;
    let file_name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "audio".into());

    let transcription = orchestrator
        .transcribe(&user.identity(), file_name, audio)
        .await?;
    println!("{}", transcription.text);
    Ok(())
}

//! memochat CLI, the main entry point.
//!
//! Commands:
//! - `ask`        Send a message (with optional history) through the pipeline
//! - `transcribe` Turn an audio file into text
//! - `usage`      Show a user's tier and trial consumption
//! - `config`     Show, validate or initialize configuration

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "memochat",
    about = "memochat: token-bounded, memory-augmented chat completions",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Who the request is made for.
#[derive(Args, Clone)]
pub struct UserArgs {
    /// Numeric user id
    #[arg(short = 'u', long, env = "MEMOCHAT_USER_ID")]
    user_id: i64,

    /// Username to store on the user record
    #[arg(long)]
    username: Option<String>,

    /// Language code to store on the user record
    #[arg(long)]
    lang: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a message through the full pipeline
    Ask {
        #[command(flatten)]
        user: UserArgs,

        /// The new user message
        message: String,

        /// JSON file with earlier messages, oldest first
        #[arg(long)]
        history: Option<PathBuf>,

        /// Append the exchange to the history file
        #[arg(long, requires = "history")]
        save: bool,
    },

    /// Transcribe an audio file
    Transcribe {
        #[command(flatten)]
        user: UserArgs,

        /// Path to the audio file
        file: PathBuf,
    },

    /// Show a user's access tier and token consumption
    Usage {
        #[command(flatten)]
        user: UserArgs,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration (secrets redacted)
    Show,
    /// Load and validate the configuration
    Validate,
    /// Write a starter config file if none exists
    Init,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Ask {
            user,
            message,
            history,
            save,
        } => commands::ask::run(user, message, history, save).await?,
        Commands::Transcribe { user, file } => commands::transcribe::run(user, file).await?,
        Commands::Usage { user } => commands::usage::run(user).await?,
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show()?,
            ConfigAction::Validate => commands::config_cmd::validate()?,
            ConfigAction::Init => commands::config_cmd::init()?,
        },
    }

    Ok(())
}

//! Banter CLI, the main entry point.
//!
//! Commands:
//! - `replay`  : run a recorded transcript through the engagement pipeline
//! - `score`   : show the engagement breakdown for one message
//! - `config`  : validate, show, locate or initialise the config file

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "banter",
    about = "Banter: engagement decisions for a group-chat agent",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file to use instead of ~/.banter/config.toml
    #[arg(short, long, global = true, env = "BANTER_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a JSONL transcript of chat messages and print each outcome
    Replay {
        /// One chat message (JSON) per line
        file: PathBuf,

        /// Never call the model; every plan comes from the fallback path
        #[arg(long)]
        offline: bool,
    },

    /// Score a single message and print the signal breakdown
    Score {
        /// The message text
        text: String,

        /// Treat the message as a direct message
        #[arg(long)]
        dm: bool,

        /// Treat the message as @mentioning the agent
        #[arg(long)]
        mention: bool,

        /// Print the decision as JSON
        #[arg(long)]
        json: bool,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Check the config file for errors
    Validate,
    /// Print the effective configuration as TOML
    Show,
    /// Print the config file path
    Path,
    /// Write a default config file if none exists
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

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Replay { file, offline } => {
            commands::replay::run(config_path, &file, offline).await?
        }
        Commands::Score {
            text,
            dm,
            mention,
            json,
        } => commands::score::run(config_path, &text, dm, mention, json).await?,
        Commands::Config { action } => match action {
            ConfigAction::Validate => commands::config_cmd::validate(config_path)?,
            ConfigAction::Show => commands::config_cmd::show(config_path)?,
            ConfigAction::Path => commands::config_cmd::path(config_path),
            ConfigAction::Init => commands::config_cmd::init(config_path)?,
        },
    }

    Ok(())
}

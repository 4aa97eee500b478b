//! craftbot CLI — the main entry point.
//!
//! Commands:
//! - `run`     — Presence monitor, supervisor, console and gateway
//! - `ping`    — Query the server status once
//! - `config`  — Print the default config, its path, or validate it

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "craftbot",
    about = "craftbot — a presence-aware game agent",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (default: ~/.craftbot/config.toml)
    #[arg(short, long, global = true, env = "CRAFTBOT_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the agent: join when players are online, leave when they are not
    Run,

    /// Query the server status once and print it
    Ping {
        /// Print the raw status as JSON
        #[arg(long)]
        json: bool,
    },

    /// Configuration helpers
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the default configuration as TOML
    Default,
    /// Print the config file path
    Path,
    /// Load and validate the configuration
    Validate,
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
        .init();

    let config = cli.config.as_deref();
    match cli.command {
        Commands::Run => commands::run::run(config).await?,
        Commands::Ping { json } => commands::ping::run(config, json).await?,
        Commands::Config { action } => match action {
            ConfigAction::Default => commands::config_cmd::show_default(),
            ConfigAction::Path => commands::config_cmd::path(config),
            ConfigAction::Validate => commands::config_cmd::validate(config)?,
        },
    }

    Ok(())
}

//! Mint Sniper - autonomous new-token trading agent
//!
//! # WARNING
//! - This bot trades with real money. Only use funds you can afford to lose.
//! - Most freshly minted tokens go to zero (rug pulls, abandonment).
//! - Devnet success does NOT equal mainnet success.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::error;

use mint_sniper::cli::commands;
use mint_sniper::config::Config;

/// Mint Sniper - watches the log stream and trades new tokens
#[derive(Parser)]
#[command(name = "mint-sniper")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the sniper
    Start {
        /// Run in dry-run mode (no transactions submitted)
        #[arg(long)]
        dry_run: bool,
    },

    /// Show the most recent journal entries
    Status {
        /// Number of entries to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Show current configuration (secrets masked)
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("mint_sniper=info".parse().unwrap()),
        )
        .with_target(true)
        .init();

    let cli = Cli::parse();

    // Credentials are validated here, before any network activity
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Start { dry_run } => commands::start(&config, dry_run).await,
        Commands::Status { limit } => commands::status(&config, limit),
        Commands::Config => commands::show_config(&config),
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        std::process::exit(1);
    }

    Ok(())
}

//! Picopayments Client CLI
//!
//! Inspect and update a persisted picopayments channel.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use picopayments_client::{config::default_config_path, ClientConfig};

mod commands;

#[derive(Parser)]
#[command(name = "picopayments-client")]
#[command(about = "Picopayments channel client")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Custom config file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the channel state
    Status,

    /// Queue a payment on the open channel
    Queue {
        /// Handle of the payee
        handle: String,

        /// Amount to pay
        amount: u64,

        /// Payment token (random if omitted)
        #[arg(long)]
        token: Option<String>,
    },

    /// Fetch a raw transaction through the hub
    GetTx {
        /// Transaction id
        txid: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let config_path = cli.config.unwrap_or_else(default_config_path);
    let config = ClientConfig::from_file(&config_path)?;

    match cli.command {
        Commands::Status => commands::status::run(&config).await,
        Commands::Queue {
            handle,
            amount,
            token,
        } => commands::queue::run(&config, &handle, amount, token).await,
        Commands::GetTx { txid } => commands::get_tx::run(&config, &txid).await,
    }
}

//! Valin - harvests staking rewards and validator commission via authz
//!
//! # WARNING
//! - Every sweep broadcasts real transactions and pays real fees.
//! - The grantee key must hold an authz grant from the granter for both
//!   withdrawal message types, and the fee payer a fee grant for the grantee.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use valin::cli::commands;
use valin::config::Config;

/// Valin - validator income harvester
#[derive(Parser)]
#[command(name = "valin")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file (TOML or JSON)
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve income over HTTP and harvest on the configured schedule
    Start {
        /// Run one sweep right away instead of waiting for the first tick
        #[arg(long)]
        run_now: bool,
    },

    /// Harvest once and exit
    RunOnce {
        /// Only harvest this network
        #[arg(long)]
        chain_id: Option<String>,
    },

    /// Print recorded income as JSON
    Income {
        /// Only records for this network
        #[arg(long)]
        chain_id: Option<String>,
    },

    /// Show current configuration
    Config,

    /// Validate networks and print withdrawal messages without broadcasting
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Parse CLI arguments
    let cli = Cli::parse();

    init_tracing(cli.json)?;

    // Load configuration
    let config = match Config::load(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {:#}", e);
            std::process::exit(1);
        }
    };
    info!("Loaded configuration from {}", cli.config);

    // Execute command
    let result = match cli.command {
        Commands::Start { run_now } => commands::start(&config, run_now).await,
        Commands::RunOnce { chain_id } => commands::run_once(&config, chain_id.as_deref()).await,
        Commands::Income { chain_id } => commands::income(&config, chain_id.as_deref()).await,
        Commands::Config => commands::show_config(&config),
        Commands::Check => commands::check(&config).await,
    };

    if let Err(e) = result {
        error!("Command failed: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

fn init_tracing(json: bool) -> Result<()> {
    let filter = EnvFilter::from_default_env().add_directive("valin=info".parse()?);

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

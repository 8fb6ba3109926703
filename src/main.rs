//! Legacy Vault - operator client for an on-chain inactivity vault
//!
//! # WARNING
//! - keepAlive and setBeneficiary send real transactions and cost gas.
//! - If no keepAlive lands before the countdown reaches zero, the vault
//!   releases its funds to the beneficiary.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{error, info};

use legacy_vault::cli::commands;
use legacy_vault::config::Config;

/// Legacy Vault - inactivity vault client
#[derive(Parser)]
#[command(name = "vault")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Log as JSON lines
    #[arg(long, env = "VAULT_LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show countdown, balance, owner and beneficiary
    Status {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Follow the vault and print every change until Ctrl+C
    Watch,

    /// Send keepAlive to reset the inactivity timer
    Heartbeat {
        /// Skip confirmation prompt
        #[arg(long)]
        force: bool,
    },

    /// Set the vault beneficiary
    SetBeneficiary {
        /// Beneficiary address (0x-prefixed, 40 hex digits)
        address: String,

        /// Skip confirmation prompt
        #[arg(long)]
        force: bool,
    },

    /// Show current configuration (secrets masked)
    Config,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive("legacy_vault=info".parse()?);
    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .init();
    }

    // Load configuration
    let config = match Config::load(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };
    info!(
        "Vault {} on {} (chain {})",
        config.vault.contract_address, config.network.name, config.network.required_chain_id
    );

    // Execute command
    let result = match cli.command {
        Commands::Status { json } => commands::status(&config, json).await,
        Commands::Watch => commands::watch(&config).await,
        Commands::Heartbeat { force } => commands::heartbeat(&config, force).await,
        Commands::SetBeneficiary { address, force } => {
            commands::set_beneficiary(&config, &address, force).await
        }
        Commands::Config => commands::show_config(&config),
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        std::process::exit(1);
    }

    Ok(())
}

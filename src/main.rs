//! Launchpad service entry point
//!
//! ## Commands
//!
//! - **serve**: confirmation, health and metrics endpoints
//! - **quote**: fee breakdown for a launch configuration
//! - **space**: mint account size and rent reservation for token details
//! - **config**: print the effective configuration

// Compiler warning configuration
#![deny(unused_imports)]
#![deny(unused_mut)]
#![deny(unused_variables)]
#![warn(dead_code)]
#![warn(unused_must_use)]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use launchpad::{
    config::Config,
    confirmation::ConfirmationPoller,
    endpoints::{self, EndpointState},
    ledger::RpcLedgerClient,
    metrics::try_metrics,
    tx_builder::{compute_fee_breakdown, lamports_to_sol, MintConfig, SpaceRentEstimator},
};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, env = "LAUNCHPAD_CONFIG")]
    config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP endpoints
    Serve {
        /// Override `server.bind`
        #[arg(long)]
        bind: Option<String>,
    },
    /// Print the fee breakdown for a launch
    Quote {
        #[arg(long)]
        revoke_mint: bool,
        #[arg(long)]
        revoke_freeze: bool,
        /// Referrer wallet (base58)
        #[arg(long)]
        referrer: Option<Pubkey>,
    },
    /// Print mint account size and rent reservation
    Space {
        #[arg(long)]
        name: String,
        #[arg(long)]
        symbol: String,
        #[arg(long, default_value = "")]
        uri: String,
    },
    /// Print the effective configuration as TOML
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::load(args.config.as_deref()).context("Failed to load configuration")?;
    init_logging(&config, args.verbose)?;
    info!(version = env!("CARGO_PKG_VERSION"), "Launchpad starting");
    try_metrics()?;

    match args.command {
        Command::Serve { bind } => {
            if let Some(bind) = bind {
                config.server.bind = bind;
            }
            serve(&config).await
        }
        Command::Quote {
            revoke_mint,
            revoke_freeze,
            referrer,
        } => {
            let fees = compute_fee_breakdown(
                &config.fee_schedule(),
                &MintConfig {
                    revoke_mint,
                    revoke_freeze,
                },
                referrer.is_some(),
            );
            println!("{}", serde_json::to_string_pretty(&fees)?);
            println!("total: {:.4} SOL", lamports_to_sol(fees.total));
            Ok(())
        }
        Command::Space { name, symbol, uri } => {
            let rpc = Arc::new(RpcLedgerClient::new(config.rpc.endpoint.clone(), config.rpc_timeout()));
            let space = SpaceRentEstimator::new(rpc).estimate(&name, &symbol, &uri).await?;
            println!("initial space: {} bytes", space.initial_space);
            println!("full space:    {} bytes", space.full_space);
            println!("metadata:      {} bytes", space.metadata_len);
            println!(
                "rent reserve:  {} lamports ({:.6} SOL)",
                space.rent_lamports,
                lamports_to_sol(space.rent_lamports)
            );
            Ok(())
        }
        Command::Config => {
            print!("{}", config.to_toml_string()?);
            Ok(())
        }
    }
}

async fn serve(config: &Config) -> Result<()> {
    let addr = config.bind_addr()?;
    let ledger = Arc::new(RpcLedgerClient::new(config.rpc.endpoint.clone(), config.rpc_timeout()));
    info!(rpc = %ledger.url(), %addr, "Serving confirmation endpoint");

    let state = EndpointState {
        poller: Arc::new(ConfirmationPoller::new(ledger)),
    };

    tokio::select! {
        result = endpoints::serve(addr, state) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
            Ok(())
        }
    }
}

/// Initialize logging subsystem
fn init_logging(config: &Config, verbose: bool) -> Result<()> {
    let default_filter = if verbose {
        "launchpad=debug,info".to_string()
    } else {
        config.monitoring.log_filter.clone()
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    let registry = tracing_subscriber::registry().with(filter);
    if config.monitoring.json_logs {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .try_init()?;
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init()?;
    }

    Ok(())
}

//! TestRPC node
//!
//! Entry point for the local Ethereum JSON-RPC test node. Loads configuration
//! from the environment/.env file, applies command line overrides and serves
//! JSON-RPC on the configured address.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use testrpc::config::Config;
use testrpc::server::start_server;

#[derive(Parser, Debug)]
#[command(
    name = "testrpc",
    about = "Simulate an Ethereum blockchain JSON-RPC server.",
    version
)]
struct Cli {
    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Host or address to bind
    #[arg(short, long)]
    domain: Option<String>,

    /// Number of accounts to provision
    #[arg(short, long)]
    accounts: Option<usize>,

    /// Genesis balance of each account, in ether
    #[arg(long)]
    balance: Option<u128>,

    /// Gas price in wei
    #[arg(long)]
    gas_price: Option<u128>,

    /// Block gas limit
    #[arg(long)]
    gas_limit: Option<u64>,

    /// Path to the solc binary
    #[arg(long, value_name = "PATH")]
    solc: Option<PathBuf>,
}

impl Cli {
    fn apply(self, config: &mut Config) {
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(domain) = self.domain {
            config.host = domain;
        }
        if let Some(accounts) = self.accounts {
            config.accounts = accounts;
        }
        if let Some(balance) = self.balance {
            config.balance = balance;
        }
        if let Some(gas_price) = self.gas_price {
            config.gas_price = gas_price;
        }
        if let Some(gas_limit) = self.gas_limit {
            config.gas_limit = gas_limit;
        }
        if let Some(solc) = self.solc {
            config.solc = solc;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Load configuration
    let mut config = Config::from_env()?;
    cli.apply(&mut config);

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&config.log_level)
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .init();

    info!("Configuration:");
    info!("  Accounts: {}", config.accounts);
    info!("  Balance: {} ether", config.balance);
    info!("  Gas price: {} wei", config.gas_price);
    info!("  Gas limit: {}", config.gas_limit);
    info!("  Solidity compiler: {}", config.solc.display());

    start_server(config).await?;

    Ok(())
}

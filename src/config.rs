use anyhow::{Context, Result};
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::ledger::memory::WEI_PER_ETHER;
use crate::ledger::GenesisConfig;

/// TestRPC node configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Interface to bind
    pub host: String,
    /// RPC server port
    pub port: u16,
    /// Number of provisioned accounts
    pub accounts: usize,
    /// Genesis balance of each account, in ether
    pub balance: u128,
    /// Gas price in wei
    pub gas_price: u128,
    /// Block gas limit
    pub gas_limit: u64,
    /// Path to the solc binary
    pub solc: PathBuf,
    /// Log level
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8545,
            accounts: 10,
            balance: 1_000_000,
            gas_price: 20_000_000_000,
            gas_limit: 4_712_388,
            solc: PathBuf::from("solc"),
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    /// Call dotenvy::dotenv() before calling this.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let host = lookup("TESTRPC_HOST").unwrap_or(defaults.host);

        let port: u16 = match lookup("TESTRPC_PORT") {
            Some(v) => v.parse().context("TESTRPC_PORT must be a valid u16")?,
            None => defaults.port,
        };

        let accounts: usize = match lookup("TESTRPC_ACCOUNTS") {
            Some(v) => v.parse().context("TESTRPC_ACCOUNTS must be a valid count")?,
            None => defaults.accounts,
        };

        let balance: u128 = match lookup("TESTRPC_BALANCE") {
            Some(v) => v.parse().context("TESTRPC_BALANCE must be a whole number of ether")?,
            None => defaults.balance,
        };

        let gas_price: u128 = match lookup("TESTRPC_GAS_PRICE") {
            Some(v) => v.parse().context("TESTRPC_GAS_PRICE must be a valid u128")?,
            None => defaults.gas_price,
        };

        let gas_limit: u64 = match lookup("TESTRPC_GAS_LIMIT") {
            Some(v) => v.parse().context("TESTRPC_GAS_LIMIT must be a valid u64")?,
            None => defaults.gas_limit,
        };

        let solc = lookup("TESTRPC_SOLC").map(PathBuf::from).unwrap_or(defaults.solc);

        let log_level = lookup("RUST_LOG").unwrap_or(defaults.log_level);

        Ok(Config {
            host,
            port,
            accounts,
            balance,
            gas_price,
            gas_limit,
            solc,
            log_level,
        })
    }

    /// Resolve the listen address. `localhost` is accepted as a host name.
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let host = if self.host == "localhost" { "127.0.0.1" } else { self.host.as_str() };
        let ip = host
            .parse()
            .with_context(|| format!("invalid listen host {:?}", self.host))?;
        Ok(SocketAddr::new(ip, self.port))
    }

    /// Genesis parameters for the in-memory ledger.
    pub fn genesis(&self) -> Result<GenesisConfig> {
        let balance = self
            .balance
            .checked_mul(WEI_PER_ETHER)
            .context("account balance overflows u128 wei")?;
        Ok(GenesisConfig {
            accounts: self.accounts,
            balance,
            gas_price: self.gas_price,
            gas_limit: self.gas_limit,
        })
    }
}

//! The ledger engine seam.
//!
//! Transaction execution and chain state live behind the [`Ledger`] trait.
//! The gateway never assumes the engine is thread-safe: every call into it
//! happens while the global execution lock is held.

pub mod json;
pub mod memory;
pub mod tx;

use serde_json::Value;

use crate::error::{RpcError, RpcResult};

pub use memory::{GenesisConfig, MemoryLedger};

/// A 20-byte account address.
pub type Address = [u8; 20];
/// A 32-byte hash (block, transaction, topic).
pub type H256 = [u8; 32];

/// Errors raised by the ledger engine when it rejects an operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("sender account not recognized: {0}")]
    UnknownAccount(String),

    #[error("nonce mismatch: expected {expected}, got {got}")]
    NonceMismatch { expected: u64, got: u64 },

    #[error("insufficient funds for gas * price + value: have {have}, need {need}")]
    InsufficientFunds { have: u128, need: u128 },

    #[error("intrinsic gas too low: need {need}, got {got}")]
    IntrinsicGasTooLow { need: u64, got: u64 },

    #[error("exceeds block gas limit: {got} > {limit}")]
    GasLimitExceeded { limit: u64, got: u64 },

    #[error("invalid transaction: {0}")]
    InvalidTransaction(String),

    #[error("invalid signature: {0}")]
    InvalidSignature(String),
}

/// A block selector as accepted by state and block queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockTag {
    Latest,
    Pending,
    Number(u64),
}

impl BlockTag {
    /// Parse a block parameter. Missing parameters mean `latest`.
    /// Handles "latest", "earliest", "pending", "safe", "finalized" and hex numbers.
    pub fn from_param(param: Option<&Value>) -> RpcResult<Self> {
        let Some(param) = param else {
            return Ok(Self::Latest);
        };
        match param {
            Value::Null => Ok(Self::Latest),
            Value::String(s) => match s.as_str() {
                "latest" | "safe" | "finalized" => Ok(Self::Latest),
                "earliest" => Ok(Self::Number(0)),
                "pending" => Ok(Self::Pending),
                _ => crate::codec::parse_u64(param).map(Self::Number),
            },
            Value::Number(_) => crate::codec::parse_u64(param).map(Self::Number),
            other => Err(RpcError::invalid_params(format!("invalid block tag {other}"))),
        }
    }

    /// Resolve against the current head. Blocks are mined as soon as a
    /// transaction arrives, so there is never a separate pending block.
    pub fn resolve(self, head: u64) -> u64 {
        match self {
            Self::Latest | Self::Pending => head,
            Self::Number(n) => n,
        }
    }
}

/// A log entry emitted by a mined transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Log {
    pub address: Address,
    pub topics: Vec<H256>,
    pub data: Vec<u8>,
    pub block_number: u64,
    pub block_hash: H256,
    pub transaction_hash: H256,
    pub transaction_index: u64,
    pub log_index: u64,
}

/// A mined block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub number: u64,
    pub hash: H256,
    pub parent_hash: H256,
    pub timestamp: u64,
    pub miner: Address,
    pub gas_limit: u64,
    pub gas_used: u64,
    pub transactions: Vec<H256>,
}

/// A mined transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub hash: H256,
    pub nonce: u64,
    pub from: Address,
    pub to: Option<Address>,
    pub value: u128,
    pub gas: u64,
    pub gas_price: u128,
    pub input: Vec<u8>,
    pub block_number: u64,
    pub block_hash: H256,
    pub transaction_index: u64,
}

/// The outcome of a mined transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub transaction_hash: H256,
    pub transaction_index: u64,
    pub block_number: u64,
    pub block_hash: H256,
    pub from: Address,
    pub to: Option<Address>,
    pub cumulative_gas_used: u64,
    pub gas_used: u64,
    pub contract_address: Option<Address>,
    pub logs: Vec<Log>,
    pub status: bool,
}

/// Transaction fields supplied by `eth_sendTransaction` and `eth_call`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionRequest {
    pub from: Option<Address>,
    pub to: Option<Address>,
    pub value: u128,
    pub data: Vec<u8>,
    pub gas: Option<u64>,
    pub gas_price: Option<u128>,
    pub nonce: Option<u64>,
}

/// Read access to the chain needed to evaluate filters.
pub trait ChainView {
    /// Number of the head block.
    fn block_number(&self) -> u64;

    /// Hash of the block at `number`, if it exists.
    fn block_hash(&self, number: u64) -> Option<H256>;

    /// Logs from blocks `from..=to`, in chain order.
    fn logs(&self, from: u64, to: u64) -> Vec<Log>;
}

/// The ledger/EVM engine.
///
/// Implementations need not be `Sync`; callers serialize all access.
pub trait Ledger: ChainView + Send + 'static {
    /// Captured engine state returned by [`Ledger::snapshot`].
    type Snapshot: Send + 'static;

    /// Discard all state and return to genesis.
    fn reset(&mut self);

    /// Capture the current state without modifying it.
    fn snapshot(&self) -> Self::Snapshot;

    /// Restore a previously captured state.
    fn revert(&mut self, snapshot: Self::Snapshot);

    /// Provisioned accounts, in order.
    fn accounts(&self) -> Vec<Address>;

    fn coinbase(&self) -> Address;

    fn gas_price(&self) -> u128;

    fn balance(&self, address: &Address) -> u128;

    fn nonce(&self, address: &Address) -> u64;

    fn code(&self, address: &Address) -> Vec<u8>;

    fn block(&self, number: u64) -> Option<Block>;

    fn transaction(&self, hash: &H256) -> Option<Transaction>;

    fn receipt(&self, hash: &H256) -> Option<Receipt>;

    /// Execute a message call without changing state.
    fn call(&self, request: &TransactionRequest) -> Result<Vec<u8>, LedgerError>;

    /// Execute and mine a transaction from a provisioned account.
    fn send_transaction(&mut self, request: TransactionRequest) -> Result<H256, LedgerError>;

    /// Execute and mine a signed, RLP-encoded transaction.
    fn send_raw_transaction(&mut self, raw: &[u8]) -> Result<H256, LedgerError>;
}

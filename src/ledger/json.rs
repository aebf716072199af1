//! JSON-RPC object shapes for blocks, transactions, receipts and logs.

use serde::{Deserialize, Serialize};

use super::{Block, Log, Receipt, Transaction};
use crate::codec::{data, quantity};

/// Keccak-256 of the RLP encoding of an empty list.
const EMPTY_UNCLES_HASH: &str =
    "0x1dcc4de8dec75d7aab85b567b6ccd41ad312451b948a7413f0a142fd40d49347";
/// Root of an empty trie.
const EMPTY_TRIE_ROOT: &str =
    "0x56e81f171bcc55a6ff8345e692c0f86e5b48e01b996cadc001622fb5e363b421";

/// EVM-formatted block object.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcBlock {
    pub number: String,
    pub hash: String,
    pub parent_hash: String,
    /// Nonce (no proof of work, always zero)
    pub nonce: String,
    pub sha3_uncles: String,
    pub logs_bloom: String,
    pub transactions_root: String,
    pub state_root: String,
    pub receipts_root: String,
    pub miner: String,
    pub difficulty: String,
    pub total_difficulty: String,
    pub extra_data: String,
    pub size: String,
    pub gas_limit: String,
    pub gas_used: String,
    pub timestamp: String,
    /// Transaction hashes, or full objects when requested
    pub transactions: serde_json::Value,
    pub uncles: Vec<String>,
}

impl RpcBlock {
    /// Format a block. `full_transactions` replaces the hash list when the
    /// caller asked for transaction objects.
    pub fn from_block(block: &Block, full_transactions: Option<Vec<RpcTransaction>>) -> Self {
        let transactions = match full_transactions {
            Some(txs) => serde_json::to_value(txs).unwrap_or_default(),
            None => serde_json::Value::Array(
                block
                    .transactions
                    .iter()
                    .map(|hash| serde_json::Value::String(data(hash)))
                    .collect(),
            ),
        };

        RpcBlock {
            number: quantity(block.number),
            hash: data(block.hash),
            parent_hash: data(block.parent_hash),
            nonce: "0x0000000000000000".to_string(),
            sha3_uncles: EMPTY_UNCLES_HASH.to_string(),
            logs_bloom: format!("0x{}", "0".repeat(512)),
            transactions_root: EMPTY_TRIE_ROOT.to_string(),
            state_root: EMPTY_TRIE_ROOT.to_string(),
            receipts_root: EMPTY_TRIE_ROOT.to_string(),
            miner: data(block.miner),
            difficulty: "0x0".to_string(),
            total_difficulty: "0x0".to_string(),
            extra_data: "0x".to_string(),
            size: quantity(1000 + block.transactions.len() as u64 * 200),
            gas_limit: quantity(block.gas_limit),
            gas_used: quantity(block.gas_used),
            timestamp: quantity(block.timestamp),
            transactions,
            uncles: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcTransaction {
    pub hash: String,
    pub nonce: String,
    pub block_hash: String,
    pub block_number: String,
    pub transaction_index: String,
    pub from: String,
    pub to: Option<String>,
    pub value: String,
    pub gas: String,
    pub gas_price: String,
    pub input: String,
}

impl From<&Transaction> for RpcTransaction {
    fn from(tx: &Transaction) -> Self {
        RpcTransaction {
            hash: data(tx.hash),
            nonce: quantity(tx.nonce),
            block_hash: data(tx.block_hash),
            block_number: quantity(tx.block_number),
            transaction_index: quantity(tx.transaction_index),
            from: data(tx.from),
            to: tx.to.map(data),
            value: quantity(tx.value),
            gas: quantity(tx.gas),
            gas_price: quantity(tx.gas_price),
            input: data(&tx.input),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcReceipt {
    pub transaction_hash: String,
    pub transaction_index: String,
    pub block_hash: String,
    pub block_number: String,
    pub from: String,
    pub to: Option<String>,
    pub cumulative_gas_used: String,
    pub gas_used: String,
    pub contract_address: Option<String>,
    pub logs: Vec<RpcLog>,
    pub logs_bloom: String,
    pub status: String,
}

impl From<&Receipt> for RpcReceipt {
    fn from(receipt: &Receipt) -> Self {
        RpcReceipt {
            transaction_hash: data(receipt.transaction_hash),
            transaction_index: quantity(receipt.transaction_index),
            block_hash: data(receipt.block_hash),
            block_number: quantity(receipt.block_number),
            from: data(receipt.from),
            to: receipt.to.map(data),
            cumulative_gas_used: quantity(receipt.cumulative_gas_used),
            gas_used: quantity(receipt.gas_used),
            contract_address: receipt.contract_address.map(data),
            logs: receipt.logs.iter().map(RpcLog::from).collect(),
            logs_bloom: format!("0x{}", "0".repeat(512)),
            status: if receipt.status { "0x1" } else { "0x0" }.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcLog {
    pub address: String,
    pub topics: Vec<String>,
    pub data: String,
    pub block_number: String,
    pub block_hash: String,
    pub transaction_hash: String,
    pub transaction_index: String,
    pub log_index: String,
    pub removed: bool,
}

impl From<&Log> for RpcLog {
    fn from(log: &Log) -> Self {
        RpcLog {
            address: data(log.address),
            topics: log.topics.iter().map(data).collect(),
            data: data(&log.data),
            block_number: quantity(log.block_number),
            block_hash: data(log.block_hash),
            transaction_hash: data(log.transaction_hash),
            transaction_index: quantity(log.transaction_index),
            log_index: quantity(log.log_index),
            removed: false,
        }
    }
}

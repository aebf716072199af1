//! In-process ledger engine.
//!
//! Keeps accounts, blocks, transactions and receipts in memory and mines a
//! block for every accepted transaction. Bytecode is stored but never
//! interpreted, so calls return empty data and receipts carry no logs.

use std::collections::HashMap;

use rlp::RlpStream;
use secp256k1::SecretKey;
use tracing::{debug, info};

use super::tx::{contract_address, decode_raw_transaction, secret_key_to_address, SignedTransaction};
use super::{
    Address, Block, ChainView, Ledger, LedgerError, Log, Receipt, Transaction,
    TransactionRequest, H256,
};
use crate::codec::{data, keccak256};

/// Wei per ether.
pub const WEI_PER_ETHER: u128 = 1_000_000_000_000_000_000;

const TX_GAS: u64 = 21_000;
const TX_CREATE_GAS: u64 = 32_000;
const TX_DATA_ZERO_GAS: u64 = 4;
const TX_DATA_NON_ZERO_GAS: u64 = 16;

/// Parameters of the genesis state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenesisConfig {
    /// Number of provisioned accounts
    pub accounts: usize,
    /// Initial balance of each account, in wei
    pub balance: u128,
    pub gas_price: u128,
    pub gas_limit: u64,
}

impl Default for GenesisConfig {
    fn default() -> Self {
        Self {
            accounts: 10,
            balance: 1_000_000 * WEI_PER_ETHER,
            gas_price: 20_000_000_000,
            gas_limit: 4_712_388,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct Account {
    balance: u128,
    nonce: u64,
    code: Vec<u8>,
}

/// Complete chain state. Cloned wholesale to take a snapshot.
#[derive(Debug, Clone, Default)]
pub struct LedgerState {
    accounts: HashMap<Address, Account>,
    blocks: Vec<Block>,
    transactions: HashMap<H256, Transaction>,
    receipts: HashMap<H256, Receipt>,
}

/// A pre-provisioned account with its signing key.
#[derive(Debug, Clone)]
pub struct ProvisionedAccount {
    pub address: Address,
    pub secret_key: SecretKey,
}

/// Derive the deterministic development accounts. The secret key of account
/// `i` is the Keccak-256 of the decimal string `i`.
pub fn provisioned_accounts(count: usize) -> Vec<ProvisionedAccount> {
    (0..count)
        .filter_map(|i| {
            let secret_key = SecretKey::from_slice(&keccak256(i.to_string())).ok()?;
            Some(ProvisionedAccount {
                address: secret_key_to_address(&secret_key),
                secret_key,
            })
        })
        .collect()
}

fn intrinsic_gas(data: &[u8], is_creation: bool) -> u64 {
    let data_gas: u64 = data
        .iter()
        .map(|b| if *b == 0 { TX_DATA_ZERO_GAS } else { TX_DATA_NON_ZERO_GAS })
        .sum();
    TX_GAS + data_gas + if is_creation { TX_CREATE_GAS } else { 0 }
}

/// Hash of a transaction submitted without a signature.
fn unsigned_transaction_hash(from: &Address, nonce: u64, request: &TransactionRequest, gas: u64, gas_price: u128) -> H256 {
    let mut stream = RlpStream::new_list(7);
    stream.append(&nonce);
    stream.append(&gas_price.to_be_bytes().to_vec());
    stream.append(&gas);
    match &request.to {
        Some(to) => stream.append(&to.to_vec()),
        None => stream.append_empty_data(),
    };
    stream.append(&request.value.to_be_bytes().to_vec());
    stream.append(&request.data);
    stream.append(&from.to_vec());
    keccak256(stream.out())
}

/// In-memory [`Ledger`] implementation.
pub struct MemoryLedger {
    genesis: GenesisConfig,
    accounts: Vec<ProvisionedAccount>,
    state: LedgerState,
}

impl MemoryLedger {
    /// Create a ledger at its genesis state.
    pub fn new(genesis: GenesisConfig) -> Self {
        let accounts = provisioned_accounts(genesis.accounts);
        let mut ledger = Self {
            genesis,
            accounts,
            state: LedgerState::default(),
        };
        ledger.reset();
        ledger
    }

    /// Provisioned accounts together with their signing keys.
    pub fn provisioned(&self) -> &[ProvisionedAccount] {
        &self.accounts
    }

    fn head(&self) -> &Block {
        // The genesis block is created by `reset` and never removed.
        &self.state.blocks[self.state.blocks.len() - 1]
    }

    fn is_provisioned(&self, address: &Address) -> bool {
        self.accounts.iter().any(|a| &a.address == address)
    }

    /// Validate, apply and mine a transaction.
    fn apply(&mut self, tx: SignedTransaction) -> Result<H256, LedgerError> {
        let is_creation = tx.to.is_none();
        let intrinsic = intrinsic_gas(&tx.data, is_creation);
        if tx.gas < intrinsic {
            return Err(LedgerError::IntrinsicGasTooLow { need: intrinsic, got: tx.gas });
        }
        if tx.gas > self.genesis.gas_limit {
            return Err(LedgerError::GasLimitExceeded { limit: self.genesis.gas_limit, got: tx.gas });
        }

        let sender = self.state.accounts.get(&tx.from).cloned().unwrap_or_default();
        if sender.nonce != tx.nonce {
            return Err(LedgerError::NonceMismatch { expected: sender.nonce, got: tx.nonce });
        }

        let max_fee = u128::from(tx.gas)
            .checked_mul(tx.gas_price)
            .and_then(|fee| fee.checked_add(tx.value))
            .ok_or(LedgerError::InsufficientFunds { have: sender.balance, need: u128::MAX })?;
        if sender.balance < max_fee {
            return Err(LedgerError::InsufficientFunds { have: sender.balance, need: max_fee });
        }

        let gas_used = intrinsic;
        let fee = u128::from(gas_used) * tx.gas_price;
        let coinbase = self.coinbase();

        let created = if is_creation {
            Some(contract_address(&tx.from, tx.nonce))
        } else {
            None
        };

        {
            let sender = self.state.accounts.entry(tx.from).or_default();
            sender.balance -= fee + tx.value;
            sender.nonce += 1;
        }
        let recipient = created.or(tx.to);
        if let Some(recipient) = recipient {
            let account = self.state.accounts.entry(recipient).or_default();
            account.balance = account.balance.saturating_add(tx.value);
            if is_creation {
                account.code = tx.data.clone();
            }
        }
        let miner = self.state.accounts.entry(coinbase).or_default();
        miner.balance = miner.balance.saturating_add(fee);

        let parent = self.head().clone();
        let number = parent.number + 1;
        let timestamp = (chrono::Utc::now().timestamp() as u64).max(parent.timestamp);
        let hash = block_hash(&parent.hash, number, timestamp, &[tx.hash]);

        self.state.transactions.insert(
            tx.hash,
            Transaction {
                hash: tx.hash,
                nonce: tx.nonce,
                from: tx.from,
                to: tx.to,
                value: tx.value,
                gas: tx.gas,
                gas_price: tx.gas_price,
                input: tx.data,
                block_number: number,
                block_hash: hash,
                transaction_index: 0,
            },
        );
        self.state.receipts.insert(
            tx.hash,
            Receipt {
                transaction_hash: tx.hash,
                transaction_index: 0,
                block_number: number,
                block_hash: hash,
                from: tx.from,
                to: tx.to,
                cumulative_gas_used: gas_used,
                gas_used,
                contract_address: created,
                logs: Vec::new(),
                status: true,
            },
        );
        self.state.blocks.push(Block {
            number,
            hash,
            parent_hash: parent.hash,
            timestamp,
            miner: coinbase,
            gas_limit: self.genesis.gas_limit,
            gas_used,
            transactions: vec![tx.hash],
        });

        info!("Mined block {} with transaction {}", number, data(tx.hash));
        Ok(tx.hash)
    }
}

fn block_hash(parent: &H256, number: u64, timestamp: u64, transactions: &[H256]) -> H256 {
    let mut preimage = Vec::with_capacity(48 + transactions.len() * 32);
    preimage.extend_from_slice(parent);
    preimage.extend_from_slice(&number.to_be_bytes());
    preimage.extend_from_slice(&timestamp.to_be_bytes());
    for tx in transactions {
        preimage.extend_from_slice(tx);
    }
    keccak256(&preimage)
}

impl ChainView for MemoryLedger {
    fn block_number(&self) -> u64 {
        self.head().number
    }

    fn block_hash(&self, number: u64) -> Option<H256> {
        self.state.blocks.get(number as usize).map(|b| b.hash)
    }

    fn logs(&self, from: u64, to: u64) -> Vec<Log> {
        let to = to.min(self.block_number());
        if from > to {
            return Vec::new();
        }
        self.state.blocks[from as usize..=to as usize]
            .iter()
            .flat_map(|block| block.transactions.iter())
            .filter_map(|hash| self.state.receipts.get(hash))
            .flat_map(|receipt| receipt.logs.iter().cloned())
            .collect()
    }
}

impl Ledger for MemoryLedger {
    type Snapshot = LedgerState;

    fn reset(&mut self) {
        let mut state = LedgerState::default();
        for account in &self.accounts {
            state.accounts.insert(
                account.address,
                Account {
                    balance: self.genesis.balance,
                    ..Default::default()
                },
            );
        }
        let timestamp = chrono::Utc::now().timestamp() as u64;
        let parent_hash = [0u8; 32];
        state.blocks.push(Block {
            number: 0,
            hash: block_hash(&parent_hash, 0, timestamp, &[]),
            parent_hash,
            timestamp,
            miner: self.accounts.first().map(|a| a.address).unwrap_or_default(),
            gas_limit: self.genesis.gas_limit,
            gas_used: 0,
            transactions: Vec::new(),
        });
        self.state = state;
        info!("Ledger reset to genesis ({} accounts)", self.accounts.len());
    }

    fn snapshot(&self) -> LedgerState {
        self.state.clone()
    }

    fn revert(&mut self, snapshot: LedgerState) {
        self.state = snapshot;
        debug!("Ledger reverted to block {}", self.block_number());
    }

    fn accounts(&self) -> Vec<Address> {
        self.accounts.iter().map(|a| a.address).collect()
    }

    fn coinbase(&self) -> Address {
        self.accounts.first().map(|a| a.address).unwrap_or_default()
    }

    fn gas_price(&self) -> u128 {
        self.genesis.gas_price
    }

    fn balance(&self, address: &Address) -> u128 {
        self.state.accounts.get(address).map_or(0, |a| a.balance)
    }

    fn nonce(&self, address: &Address) -> u64 {
        self.state.accounts.get(address).map_or(0, |a| a.nonce)
    }

    fn code(&self, address: &Address) -> Vec<u8> {
        self.state
            .accounts
            .get(address)
            .map(|a| a.code.clone())
            .unwrap_or_default()
    }

    fn block(&self, number: u64) -> Option<Block> {
        self.state.blocks.get(number as usize).cloned()
    }

    fn transaction(&self, hash: &H256) -> Option<Transaction> {
        self.state.transactions.get(hash).cloned()
    }

    fn receipt(&self, hash: &H256) -> Option<Receipt> {
        self.state.receipts.get(hash).cloned()
    }

    fn call(&self, request: &TransactionRequest) -> Result<Vec<u8>, LedgerError> {
        let from = request.from.unwrap_or_else(|| self.coinbase());
        let balance = self.balance(&from);
        if balance < request.value {
            return Err(LedgerError::InsufficientFunds { have: balance, need: request.value });
        }
        debug!(
            "eth_call against {:?}: {} bytes of code",
            request.to.map(data),
            request.to.map(|to| self.code(&to).len()).unwrap_or(0)
        );
        Ok(Vec::new())
    }

    fn send_transaction(&mut self, request: TransactionRequest) -> Result<H256, LedgerError> {
        let from = request.from.unwrap_or_else(|| self.coinbase());
        if !self.is_provisioned(&from) {
            return Err(LedgerError::UnknownAccount(data(from)));
        }
        let nonce = request.nonce.unwrap_or_else(|| self.nonce(&from));
        let gas = request.gas.unwrap_or(self.genesis.gas_limit);
        let gas_price = request.gas_price.unwrap_or(self.genesis.gas_price);
        let hash = unsigned_transaction_hash(&from, nonce, &request, gas, gas_price);

        self.apply(SignedTransaction {
            hash,
            from,
            nonce,
            gas_price,
            gas,
            to: request.to,
            value: request.value,
            data: request.data,
            chain_id: None,
        })
    }

    fn send_raw_transaction(&mut self, raw: &[u8]) -> Result<H256, LedgerError> {
        let tx = decode_raw_transaction(raw)?;
        debug!("Decoded raw transaction from {} nonce {}", data(tx.from), tx.nonce);
        self.apply(tx)
    }
}

//! The fixed RPC method surface.

pub mod eth;
pub mod evm;
pub mod web3;

use tracing::info;

use crate::ledger::Ledger;
use crate::registry::MethodRegistry;

/// Every method name served by the node.
pub const METHOD_NAMES: [&str; 25] = [
    "eth_coinbase",
    "eth_accounts",
    "eth_gasPrice",
    "eth_blockNumber",
    "eth_call",
    "eth_sendTransaction",
    "eth_sendRawTransaction",
    "eth_getCompilers",
    "eth_compileSolidity",
    "eth_getCode",
    "eth_getBalance",
    "eth_getTransactionCount",
    "eth_getTransactionByHash",
    "eth_getTransactionReceipt",
    "eth_getBlockByNumber",
    "eth_newBlockFilter",
    "eth_newFilter",
    "eth_getFilterChanges",
    "eth_getFilterLogs",
    "eth_uninstallFilter",
    "web3_sha3",
    "web3_clientVersion",
    "evm_reset",
    "evm_snapshot",
    "evm_revert",
];

/// Register all JSON-RPC methods on the registry.
pub fn register_all<L: Ledger>(registry: &mut MethodRegistry<L>) {
    // --- eth_* methods ---
    registry.register("eth_coinbase", eth::coinbase::<L>);
    registry.register("eth_accounts", eth::accounts::<L>);
    registry.register("eth_gasPrice", eth::gas_price::<L>);
    registry.register("eth_blockNumber", eth::block_number::<L>);
    registry.register("eth_call", eth::call::<L>);
    registry.register("eth_sendTransaction", eth::send_transaction::<L>);
    registry.register("eth_sendRawTransaction", eth::send_raw_transaction::<L>);
    registry.register("eth_getCompilers", eth::get_compilers::<L>);
    registry.register("eth_compileSolidity", eth::compile_solidity::<L>);
    registry.register("eth_getCode", eth::get_code::<L>);
    registry.register("eth_getBalance", eth::get_balance::<L>);
    registry.register("eth_getTransactionCount", eth::get_transaction_count::<L>);
    registry.register("eth_getTransactionByHash", eth::get_transaction_by_hash::<L>);
    registry.register("eth_getTransactionReceipt", eth::get_transaction_receipt::<L>);
    registry.register("eth_getBlockByNumber", eth::get_block_by_number::<L>);
    registry.register("eth_newBlockFilter", eth::new_block_filter::<L>);
    registry.register("eth_newFilter", eth::new_filter::<L>);
    registry.register("eth_getFilterChanges", eth::get_filter_changes::<L>);
    registry.register("eth_getFilterLogs", eth::get_filter_logs::<L>);
    registry.register("eth_uninstallFilter", eth::uninstall_filter::<L>);

    // --- web3_* methods ---
    registry.register("web3_sha3", web3::sha3::<L>);
    registry.register("web3_clientVersion", web3::client_version::<L>);

    // --- evm_* methods ---
    registry.register("evm_reset", evm::reset::<L>);
    registry.register("evm_snapshot", evm::snapshot::<L>);
    registry.register("evm_revert", evm::revert::<L>);

    info!("Registered {} RPC methods", registry.len());
}

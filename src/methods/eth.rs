use serde_json::{json, Value};
use tracing::{debug, info};

use crate::codec::{data, parse_address, parse_data, parse_hash, parse_quantity, parse_u64, quantity, str_param};
use crate::error::{RpcError, RpcResult};
use crate::filter::{FilterChanges, LogCriteria};
use crate::ledger::json::{RpcBlock, RpcLog, RpcReceipt, RpcTransaction};
use crate::ledger::{BlockTag, Ledger, TransactionRequest};
use crate::state::NodeState;

/// Handler for eth_coinbase
pub fn coinbase<L: Ledger>(state: &mut NodeState<L>, _params: &[Value]) -> RpcResult<Value> {
    Ok(Value::String(data(state.ledger.coinbase())))
}

/// Handler for eth_accounts
pub fn accounts<L: Ledger>(state: &mut NodeState<L>, _params: &[Value]) -> RpcResult<Value> {
    let accounts = state.ledger.accounts().iter().map(|a| Value::String(data(a))).collect();
    Ok(Value::Array(accounts))
}

/// Handler for eth_gasPrice
pub fn gas_price<L: Ledger>(state: &mut NodeState<L>, _params: &[Value]) -> RpcResult<Value> {
    Ok(Value::String(quantity(state.ledger.gas_price())))
}

/// Handler for eth_blockNumber
pub fn block_number<L: Ledger>(state: &mut NodeState<L>, _params: &[Value]) -> RpcResult<Value> {
    let number = state.ledger.block_number();
    debug!("eth_blockNumber -> {}", number);
    Ok(Value::String(quantity(number)))
}

/// Handler for eth_call (read-only message call)
pub fn call<L: Ledger>(state: &mut NodeState<L>, params: &[Value]) -> RpcResult<Value> {
    let call_obj = params
        .first()
        .ok_or_else(|| RpcError::invalid_params("eth_call requires call object parameter"))?;
    let request = transaction_request(call_obj)?;
    check_block(state, params.get(1))?;

    debug!("eth_call: to={:?}, data_len={}", request.to.map(data), request.data.len());
    let output = state.ledger.call(&request)?;
    Ok(Value::String(data(output)))
}

/// Handler for eth_sendTransaction
pub fn send_transaction<L: Ledger>(state: &mut NodeState<L>, params: &[Value]) -> RpcResult<Value> {
    let tx_obj = params
        .first()
        .ok_or_else(|| RpcError::invalid_params("eth_sendTransaction requires transaction object"))?;
    let request = transaction_request(tx_obj)?;

    info!(
        "eth_sendTransaction: from={:?}, to={:?}, value={}",
        request.from.map(data),
        request.to.map(data),
        request.value
    );
    let hash = state.ledger.send_transaction(request)?;
    Ok(Value::String(data(hash)))
}

/// Handler for eth_sendRawTransaction
pub fn send_raw_transaction<L: Ledger>(state: &mut NodeState<L>, params: &[Value]) -> RpcResult<Value> {
    let raw_tx = parse_data(str_param(params, 0, "raw transaction")?)?;
    info!("eth_sendRawTransaction: received {} bytes", raw_tx.len());
    let hash = state.ledger.send_raw_transaction(&raw_tx)?;
    Ok(Value::String(data(hash)))
}

/// Handler for eth_getCompilers
pub fn get_compilers<L: Ledger>(state: &mut NodeState<L>, _params: &[Value]) -> RpcResult<Value> {
    let compilers = match state.compiler.version() {
        Some(_) => json!(["solidity"]),
        None => json!([]),
    };
    Ok(compilers)
}

/// Handler for eth_compileSolidity
pub fn compile_solidity<L: Ledger>(state: &mut NodeState<L>, params: &[Value]) -> RpcResult<Value> {
    let source = str_param(params, 0, "source")?;
    info!("eth_compileSolidity: {} bytes of source", source.len());
    state.compiler.compile(source)
}

/// Handler for eth_getCode
pub fn get_code<L: Ledger>(state: &mut NodeState<L>, params: &[Value]) -> RpcResult<Value> {
    let address = parse_address(str_param(params, 0, "address")?)?;
    check_block(state, params.get(1))?;
    Ok(Value::String(data(state.ledger.code(&address))))
}

/// Handler for eth_getBalance
pub fn get_balance<L: Ledger>(state: &mut NodeState<L>, params: &[Value]) -> RpcResult<Value> {
    let address = parse_address(str_param(params, 0, "address")?)?;
    check_block(state, params.get(1))?;
    let balance = state.ledger.balance(&address);
    debug!("eth_getBalance: {} -> {}", data(address), balance);
    Ok(Value::String(quantity(balance)))
}

/// Handler for eth_getTransactionCount (nonce)
pub fn get_transaction_count<L: Ledger>(state: &mut NodeState<L>, params: &[Value]) -> RpcResult<Value> {
    let address = parse_address(str_param(params, 0, "address")?)?;
    check_block(state, params.get(1))?;
    Ok(Value::String(quantity(state.ledger.nonce(&address))))
}

/// Handler for eth_getTransactionByHash
pub fn get_transaction_by_hash<L: Ledger>(state: &mut NodeState<L>, params: &[Value]) -> RpcResult<Value> {
    let hash = parse_hash(str_param(params, 0, "transaction hash")?)?;
    debug!("eth_getTransactionByHash: hash={}", data(hash));
    match state.ledger.transaction(&hash) {
        Some(tx) => to_json(RpcTransaction::from(&tx)),
        None => Ok(Value::Null),
    }
}

/// Handler for eth_getTransactionReceipt
pub fn get_transaction_receipt<L: Ledger>(state: &mut NodeState<L>, params: &[Value]) -> RpcResult<Value> {
    let hash = parse_hash(str_param(params, 0, "transaction hash")?)?;
    debug!("eth_getTransactionReceipt: hash={}", data(hash));
    match state.ledger.receipt(&hash) {
        Some(receipt) => to_json(RpcReceipt::from(&receipt)),
        None => Ok(Value::Null),
    }
}

/// Handler for eth_getBlockByNumber
pub fn get_block_by_number<L: Ledger>(state: &mut NodeState<L>, params: &[Value]) -> RpcResult<Value> {
    let tag = BlockTag::from_param(params.first())?;
    let include_txs = params.get(1).and_then(Value::as_bool).unwrap_or(false);
    let number = tag.resolve(state.ledger.block_number());

    debug!("eth_getBlockByNumber: tag={:?}, number={}", tag, number);

    let Some(block) = state.ledger.block(number) else {
        return Ok(Value::Null);
    };
    let full_transactions = include_txs.then(|| {
        block
            .transactions
            .iter()
            .filter_map(|hash| state.ledger.transaction(hash))
            .map(|tx| RpcTransaction::from(&tx))
            .collect()
    });
    to_json(RpcBlock::from_block(&block, full_transactions))
}

/// Handler for eth_newBlockFilter
pub fn new_block_filter<L: Ledger>(state: &mut NodeState<L>, _params: &[Value]) -> RpcResult<Value> {
    let id = state.filters.new_block_filter(&state.ledger);
    Ok(Value::String(quantity(id)))
}

/// Handler for eth_newFilter
pub fn new_filter<L: Ledger>(state: &mut NodeState<L>, params: &[Value]) -> RpcResult<Value> {
    let criteria = LogCriteria::from_param(params.first())?;
    let id = state.filters.new_filter(criteria, &state.ledger);
    Ok(Value::String(quantity(id)))
}

/// Handler for eth_getFilterChanges
pub fn get_filter_changes<L: Ledger>(state: &mut NodeState<L>, params: &[Value]) -> RpcResult<Value> {
    let id = filter_id(params)?;
    let changes = match state.filters.get_filter_changes(id, &state.ledger)? {
        FilterChanges::Blocks(hashes) => hashes.iter().map(|h| Value::String(data(h))).collect(),
        FilterChanges::Logs(logs) => logs_to_json(&logs)?,
    };
    Ok(Value::Array(changes))
}

/// Handler for eth_getFilterLogs
pub fn get_filter_logs<L: Ledger>(state: &mut NodeState<L>, params: &[Value]) -> RpcResult<Value> {
    let id = filter_id(params)?;
    let logs = state.filters.get_filter_logs(id, &state.ledger)?;
    Ok(Value::Array(logs_to_json(&logs)?))
}

/// Handler for eth_uninstallFilter
pub fn uninstall_filter<L: Ledger>(state: &mut NodeState<L>, params: &[Value]) -> RpcResult<Value> {
    let id = filter_id(params)?;
    Ok(Value::Bool(state.filters.uninstall_filter(id)))
}

// --- Helper functions ---

/// Decode a transaction object (`from`, `to`, `value`, `data`/`input`,
/// `gas`, `gasPrice`, `nonce`).
fn transaction_request(obj: &Value) -> RpcResult<TransactionRequest> {
    if !obj.is_object() {
        return Err(RpcError::invalid_params("transaction must be an object"));
    }
    let field = |key: &str| obj.get(key).filter(|v| !v.is_null());
    let address = |key: &str| -> RpcResult<Option<_>> {
        match field(key) {
            Some(Value::String(s)) if !s.is_empty() => parse_address(s).map(Some),
            Some(Value::String(_)) | None => Ok(None),
            Some(other) => Err(RpcError::invalid_params(format!("invalid {key} {other}"))),
        }
    };

    let data = match field("data").or_else(|| field("input")) {
        Some(Value::String(s)) => parse_data(s)?,
        Some(other) => return Err(RpcError::invalid_params(format!("invalid data {other}"))),
        None => Vec::new(),
    };

    Ok(TransactionRequest {
        from: address("from")?,
        to: address("to")?,
        value: field("value").map(parse_quantity).transpose()?.unwrap_or(0),
        data,
        gas: field("gas").map(parse_u64).transpose()?,
        gas_price: field("gasPrice").map(parse_quantity).transpose()?,
        nonce: field("nonce").map(parse_u64).transpose()?,
    })
}

/// Validate a block parameter of a state query. State is only kept for the
/// head, so any existing block is answered from it.
fn check_block<L: Ledger>(state: &NodeState<L>, param: Option<&Value>) -> RpcResult<()> {
    let head = state.ledger.block_number();
    let number = BlockTag::from_param(param)?.resolve(head);
    if number > head {
        return Err(RpcError::invalid_params(format!("unknown block {}", quantity(number))));
    }
    Ok(())
}

fn filter_id(params: &[Value]) -> RpcResult<u64> {
    let param = params
        .first()
        .ok_or_else(|| RpcError::invalid_params("missing filter id parameter"))?;
    parse_u64(param)
}

fn logs_to_json(logs: &[crate::ledger::Log]) -> RpcResult<Vec<Value>> {
    logs.iter().map(|log| to_json(RpcLog::from(log))).collect()
}

fn to_json(value: impl serde::Serialize) -> RpcResult<Value> {
    serde_json::to_value(value)
        .map_err(|e| RpcError::invalid_params(format!("unserializable result: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::SolcCompiler;
    use crate::ledger::{GenesisConfig, MemoryLedger};

    fn node() -> NodeState<MemoryLedger> {
        NodeState::new(MemoryLedger::new(GenesisConfig::default()), SolcCompiler::new("/nonexistent/solc"))
    }

    fn account(state: &NodeState<MemoryLedger>, i: usize) -> String {
        data(state.ledger.accounts()[i])
    }

    #[test]
    fn test_transaction_request_parsing() {
        let request = transaction_request(&json!({
            "from": "0x82a978b3f5962a5b0957d9ee9eef472ee55b42f1",
            "to": null,
            "value": "0x10",
            "input": "0x6080",
            "gas": "0x5208",
            "nonce": 3
        }))
        .unwrap();
        assert!(request.from.is_some());
        assert_eq!(request.to, None);
        assert_eq!(request.value, 16);
        assert_eq!(request.data, vec![0x60, 0x80]);
        assert_eq!(request.gas, Some(21_000));
        assert_eq!(request.gas_price, None);
        assert_eq!(request.nonce, Some(3));

        assert!(transaction_request(&json!("0x")).is_err());
        assert!(transaction_request(&json!({"to": "0x12"})).is_err());
    }

    #[test]
    fn test_send_and_query_transaction() {
        let mut state = node();
        let from = account(&state, 0);
        let to = account(&state, 1);

        let hash = send_transaction(&mut state, &[json!({"from": from, "to": to, "value": "0x64"})]).unwrap();
        assert_eq!(block_number(&mut state, &[]).unwrap(), json!("0x1"));
        assert_eq!(get_transaction_count(&mut state, &[json!(from)]).unwrap(), json!("0x1"));

        let tx = get_transaction_by_hash(&mut state, &[hash.clone()]).unwrap();
        assert_eq!(tx["value"], "0x64");
        assert_eq!(tx["from"], json!(from));
        let receipt = get_transaction_receipt(&mut state, &[hash.clone()]).unwrap();
        assert_eq!(receipt["blockNumber"], "0x1");

        let block = get_block_by_number(&mut state, &[json!("latest"), json!(false)]).unwrap();
        assert_eq!(block["transactions"], json!([hash]));
        let block = get_block_by_number(&mut state, &[json!("0x1"), json!(true)]).unwrap();
        assert_eq!(block["transactions"][0]["value"], "0x64");
        assert_eq!(get_block_by_number(&mut state, &[json!("0x9")]).unwrap(), Value::Null);
    }

    #[test]
    fn test_unknown_transaction_is_null() {
        let mut state = node();
        let missing = json!(format!("0x{}", "ab".repeat(32)));
        assert_eq!(get_transaction_by_hash(&mut state, &[missing.clone()]).unwrap(), Value::Null);
        assert_eq!(get_transaction_receipt(&mut state, &[missing]).unwrap(), Value::Null);
    }

    #[test]
    fn test_state_queries_validate_block() {
        let mut state = node();
        let addr = json!(account(&state, 0));
        assert_eq!(
            get_balance(&mut state, &[addr.clone(), json!("latest")]).unwrap(),
            json!("0xd3c21bcecceda1000000")
        );
        assert!(matches!(
            get_balance(&mut state, &[addr.clone(), json!("0x5")]),
            Err(RpcError::InvalidParams(_))
        ));
        assert!(matches!(get_balance(&mut state, &[]), Err(RpcError::InvalidParams(_))));
        assert_eq!(get_code(&mut state, &[addr]).unwrap(), json!("0x"));
    }

    #[test]
    fn test_engine_rejection_surfaces_as_engine_error() {
        let mut state = node();
        let from = account(&state, 0);
        let err = send_transaction(&mut state, &[json!({"from": from, "nonce": "0x7"})]).unwrap_err();
        assert!(matches!(err, RpcError::Engine(_)));
        assert_eq!(block_number(&mut state, &[]).unwrap(), json!("0x0"));
    }

    #[test]
    fn test_filter_handlers() {
        let mut state = node();
        let id = new_block_filter(&mut state, &[]).unwrap();
        assert_eq!(get_filter_changes(&mut state, &[id.clone()]).unwrap(), json!([]));

        let from = account(&state, 0);
        send_transaction(&mut state, &[json!({"from": from, "to": from})]).unwrap();
        let changes = get_filter_changes(&mut state, &[id.clone()]).unwrap();
        assert_eq!(changes.as_array().unwrap().len(), 1);

        let log_filter = new_filter(&mut state, &[json!({"fromBlock": "earliest"})]).unwrap();
        assert_eq!(get_filter_logs(&mut state, &[log_filter]).unwrap(), json!([]));

        assert_eq!(uninstall_filter(&mut state, &[id.clone()]).unwrap(), json!(true));
        assert_eq!(uninstall_filter(&mut state, &[id.clone()]).unwrap(), json!(false));
        assert!(matches!(
            get_filter_changes(&mut state, &[id]),
            Err(RpcError::UnknownFilter(_))
        ));
    }

    #[test]
    fn test_compilers_without_solc() {
        let mut state = node();
        assert_eq!(get_compilers(&mut state, &[]).unwrap(), json!([]));
        assert!(matches!(
            compile_solidity(&mut state, &[json!("contract A {}")]),
            Err(RpcError::Compiler(_))
        ));
    }
}

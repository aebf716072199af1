//! Test-harness methods that checkpoint and rewind the whole node.

use serde_json::Value;

use crate::codec::{parse_u64, quantity};
use crate::error::{RpcError, RpcResult};
use crate::ledger::Ledger;
use crate::state::NodeState;

/// Handler for evm_reset
pub fn reset<L: Ledger>(state: &mut NodeState<L>, _params: &[Value]) -> RpcResult<Value> {
    state.reset();
    Ok(Value::Bool(true))
}

/// Handler for evm_snapshot
pub fn snapshot<L: Ledger>(state: &mut NodeState<L>, _params: &[Value]) -> RpcResult<Value> {
    Ok(Value::String(quantity(state.snapshot())))
}

/// Handler for evm_revert
pub fn revert<L: Ledger>(state: &mut NodeState<L>, params: &[Value]) -> RpcResult<Value> {
    let id = params
        .first()
        .ok_or_else(|| RpcError::invalid_params("missing snapshot id parameter"))
        .and_then(parse_u64)?;
    state.revert(id)?;
    Ok(Value::Bool(true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::SolcCompiler;
    use crate::ledger::{ChainView, GenesisConfig, MemoryLedger, TransactionRequest};
    use serde_json::json;

    fn node() -> NodeState<MemoryLedger> {
        NodeState::new(MemoryLedger::new(GenesisConfig::default()), SolcCompiler::new("solc"))
    }

    fn mine(state: &mut NodeState<MemoryLedger>) {
        let from = state.ledger.accounts()[0];
        state
            .ledger
            .send_transaction(TransactionRequest { from: Some(from), to: Some(from), ..Default::default() })
            .unwrap();
    }

    #[test]
    fn test_snapshot_ids_are_quantities() {
        let mut state = node();
        assert_eq!(snapshot(&mut state, &[]).unwrap(), json!("0x1"));
        assert_eq!(snapshot(&mut state, &[]).unwrap(), json!("0x2"));
    }

    #[test]
    fn test_revert_accepts_hex_and_number() {
        let mut state = node();
        let first = snapshot(&mut state, &[]).unwrap();
        mine(&mut state);
        assert_eq!(revert(&mut state, &[first]).unwrap(), json!(true));
        assert_eq!(state.ledger.block_number(), 0);

        let second = snapshot(&mut state, &[]).unwrap();
        assert_eq!(second, json!("0x2"));
        assert_eq!(revert(&mut state, &[json!(2)]).unwrap(), json!(true));
    }

    #[test]
    fn test_revert_unknown_id() {
        let mut state = node();
        assert!(matches!(revert(&mut state, &[json!("0x9")]), Err(RpcError::UnknownSnapshot(_))));
        assert!(matches!(revert(&mut state, &[]), Err(RpcError::InvalidParams(_))));
    }

    #[test]
    fn test_reset_keeps_snapshot_counter() {
        let mut state = node();
        snapshot(&mut state, &[]).unwrap();
        mine(&mut state);
        assert_eq!(reset(&mut state, &[]).unwrap(), json!(true));
        assert_eq!(state.ledger.block_number(), 0);
        assert_eq!(snapshot(&mut state, &[]).unwrap(), json!("0x2"));
    }
}

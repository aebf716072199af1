use serde_json::Value;
use tracing::debug;

use crate::codec::{data, keccak256, parse_data, str_param};
use crate::error::RpcResult;
use crate::ledger::Ledger;
use crate::state::NodeState;

/// Client version string reported by `web3_clientVersion`.
pub fn version_string() -> String {
    format!("TestRPC/v{}/rust", env!("CARGO_PKG_VERSION"))
}

/// Handler for web3_clientVersion
pub fn client_version<L: Ledger>(_state: &mut NodeState<L>, _params: &[Value]) -> RpcResult<Value> {
    let version = version_string();
    debug!("web3_clientVersion -> {}", version);
    Ok(Value::String(version))
}

/// Handler for web3_sha3
/// Returns the Keccak-256 hash of the given hex data.
pub fn sha3<L: Ledger>(_state: &mut NodeState<L>, params: &[Value]) -> RpcResult<Value> {
    let data_bytes = parse_data(str_param(params, 0, "data")?)?;
    let result = data(keccak256(&data_bytes));

    debug!("web3_sha3: input_len={} -> {}", data_bytes.len(), result);
    Ok(Value::String(result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::SolcCompiler;
    use crate::error::RpcError;
    use crate::ledger::{GenesisConfig, MemoryLedger};
    use serde_json::json;

    fn node() -> NodeState<MemoryLedger> {
        NodeState::new(MemoryLedger::new(GenesisConfig::default()), SolcCompiler::new("solc"))
    }

    #[test]
    fn test_client_version() {
        let version = client_version(&mut node(), &[]).unwrap();
        let version = version.as_str().unwrap();
        assert!(version.starts_with("TestRPC/v"));
        assert!(version.ends_with("/rust"));
    }

    #[test]
    fn test_sha3() {
        let mut state = node();
        assert_eq!(
            sha3(&mut state, &[json!("0x68656c6c6f20776f726c64")]).unwrap(),
            json!("0x47173285a8d7341e5e972fc677286384f802f8ef42a5ec5f03bbfa254cb01fad")
        );
        assert!(matches!(sha3(&mut state, &[json!("0xzz")]), Err(RpcError::InvalidParams(_))));
        assert!(matches!(sha3(&mut state, &[]), Err(RpcError::InvalidParams(_))));
    }
}

//! Hex encodings used on the wire: quantities, byte strings, addresses and
//! 32-byte hashes, all `0x`-prefixed.

use serde_json::Value;
use sha3::{Digest, Keccak256};

use crate::error::{RpcError, RpcResult};
use crate::ledger::{Address, H256};

/// Keccak-256 of `data`.
pub fn keccak256(data: impl AsRef<[u8]>) -> H256 {
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&Keccak256::digest(data.as_ref()));
    hash
}

/// Encode an unsigned integer as a JSON-RPC quantity (`0x0`, `0x2a`).
pub fn quantity(value: impl Into<u128>) -> String {
    format!("0x{:x}", value.into())
}

/// Encode bytes as `0x`-prefixed hex.
pub fn data(bytes: impl AsRef<[u8]>) -> String {
    format!("0x{}", hex::encode(bytes.as_ref()))
}

fn strip_0x(s: &str) -> &str {
    s.strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s)
}

/// Decode `0x`-prefixed hex into bytes. Odd-length input is left-padded.
pub fn parse_data(s: &str) -> RpcResult<Vec<u8>> {
    let digits = strip_0x(s);
    let decoded = if digits.len() % 2 == 1 {
        hex::decode(format!("0{digits}"))
    } else {
        hex::decode(digits)
    };
    decoded.map_err(|e| RpcError::invalid_params(format!("invalid hex data {s:?}: {e}")))
}

/// Decode a quantity. Accepts hex strings as well as plain JSON numbers.
pub fn parse_quantity(value: &Value) -> RpcResult<u128> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .map(u128::from)
            .ok_or_else(|| RpcError::invalid_params(format!("invalid quantity {n}"))),
        Value::String(s) => {
            let digits = strip_0x(s);
            if digits.is_empty() {
                return Err(RpcError::invalid_params("empty quantity"));
            }
            u128::from_str_radix(digits, 16)
                .map_err(|e| RpcError::invalid_params(format!("invalid quantity {s:?}: {e}")))
        }
        other => Err(RpcError::invalid_params(format!(
            "expected quantity, got {other}"
        ))),
    }
}

/// Decode a quantity that must fit into 64 bits.
pub fn parse_u64(value: &Value) -> RpcResult<u64> {
    let q = parse_quantity(value)?;
    u64::try_from(q).map_err(|_| RpcError::invalid_params(format!("quantity {q} overflows u64")))
}

fn parse_fixed<const N: usize>(s: &str, what: &str) -> RpcResult<[u8; N]> {
    let bytes = parse_data(s)?;
    bytes.try_into().map_err(|b: Vec<u8>| {
        RpcError::invalid_params(format!("{what} must be {N} bytes, got {}", b.len()))
    })
}

/// Decode a 20-byte address.
pub fn parse_address(s: &str) -> RpcResult<Address> {
    parse_fixed(s, "address")
}

/// Decode a 32-byte hash.
pub fn parse_hash(s: &str) -> RpcResult<H256> {
    parse_fixed(s, "hash")
}

/// Fetch a required string parameter at `index`.
pub fn str_param<'a>(params: &'a [Value], index: usize, name: &str) -> RpcResult<&'a str> {
    params
        .get(index)
        .and_then(Value::as_str)
        .ok_or_else(|| RpcError::invalid_params(format!("missing {name} parameter")))
}

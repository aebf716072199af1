use jsonrpsee::types::ErrorObjectOwned;

use crate::ledger::LedgerError;

/// JSON-RPC error code for an unknown method.
pub const METHOD_NOT_FOUND_CODE: i32 = -32601;
/// JSON-RPC error code for malformed parameters.
pub const INVALID_PARAMS_CODE: i32 = -32602;
/// Generic server error code, used for engine and state errors.
pub const SERVER_ERROR_CODE: i32 = -32000;

/// Errors surfaced to RPC clients.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    /// No handler is registered under the requested name.
    #[error("the method {0} does not exist/is not available")]
    MethodNotFound(String),

    /// Parameters could not be decoded for the method.
    #[error("invalid params: {0}")]
    InvalidParams(String),

    /// The snapshot id was never issued or has been retired by a revert.
    #[error("unknown snapshot id {0}")]
    UnknownSnapshot(String),

    /// The filter id is not installed.
    #[error("filter not found")]
    UnknownFilter(String),

    /// The ledger engine rejected the operation.
    #[error(transparent)]
    Engine(#[from] LedgerError),

    /// The Solidity compiler is missing or failed.
    #[error("compiler error: {0}")]
    Compiler(String),
}

impl RpcError {
    /// Shorthand for an [`RpcError::InvalidParams`].
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::InvalidParams(message.into())
    }

    /// The JSON-RPC error code for this error.
    pub fn code(&self) -> i32 {
        match self {
            Self::MethodNotFound(_) => METHOD_NOT_FOUND_CODE,
            Self::InvalidParams(_) => INVALID_PARAMS_CODE,
            Self::UnknownSnapshot(_)
            | Self::UnknownFilter(_)
            | Self::Engine(_)
            | Self::Compiler(_) => SERVER_ERROR_CODE,
        }
    }
}

impl From<RpcError> for ErrorObjectOwned {
    fn from(err: RpcError) -> Self {
        ErrorObjectOwned::owned(err.code(), err.to_string(), None::<()>)
    }
}

/// Result type returned by every RPC handler.
pub type RpcResult<T> = Result<T, RpcError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(RpcError::MethodNotFound("foo_bar".into()).code(), -32601);
        assert_eq!(RpcError::invalid_params("missing address").code(), -32602);
        assert_eq!(RpcError::UnknownSnapshot("0x3".into()).code(), -32000);
        assert_eq!(RpcError::UnknownFilter("0x1".into()).code(), -32000);
    }

    #[test]
    fn test_engine_error_message_is_verbatim() {
        let err = RpcError::from(LedgerError::NonceMismatch { expected: 2, got: 5 });
        let obj = ErrorObjectOwned::from(err);
        assert_eq!(obj.code(), -32000);
        assert_eq!(obj.message(), "nonce mismatch: expected 2, got 5");
    }
}

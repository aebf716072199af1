//! TestRPC: a local Ethereum JSON-RPC node for development and testing.
//!
//! The node accepts JSON-RPC over HTTP from any number of concurrent clients
//! and executes each call against a single in-memory ledger. Handler
//! execution is serialized by one process-wide lock, so clients observe a
//! strict total order of calls. Test frameworks checkpoint and rewind the
//! ledger through `evm_snapshot`, `evm_revert` and `evm_reset`.
//!
//! # Architecture
//!
//! ```text
//! Client (web3 / test framework)
//!     |
//!     | HTTP POST JSON-RPC, CORS preflight
//!     v
//! server      jsonrpsee transport + CORS middleware
//!     |
//!     v
//! dispatch    global lock around the node context
//!     |
//!     v
//! registry -> methods::{eth, web3, evm}
//!     |
//!     v
//! state       ledger + snapshots + filters
//! ```
//!
//! # Modules
//!
//! - `config` - Environment and configuration management
//! - `server` - JSON-RPC server setup and CORS
//! - `dispatch` - Serialized handler execution
//! - `registry` - Method name to handler table
//! - `methods` - Individual RPC method implementations (eth, web3, evm)
//! - `ledger` - Ledger engine seam and the in-memory engine
//! - `snapshot` / `filter` - Checkpoint and filter tables
//! - `compiler` - Solidity compilation through `solc`

pub mod codec;
pub mod compiler;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod filter;
pub mod ledger;
pub mod methods;
pub mod registry;
pub mod server;
pub mod snapshot;
pub mod state;

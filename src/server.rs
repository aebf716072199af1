use std::net::SocketAddr;

use anyhow::{Context, Result};
use http::header::ACCESS_CONTROL_ALLOW_HEADERS;
use http::HeaderValue;
use jsonrpsee::server::{RpcModule, Server, ServerHandle};
use jsonrpsee::types::ErrorObjectOwned;
use serde_json::Value;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::info;

use crate::codec::data;
use crate::compiler::SolcCompiler;
use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::ledger::{Ledger, MemoryLedger};
use crate::methods::{self, web3};
use crate::registry::{positional, MethodRegistry};
use crate::state::NodeState;

/// Headers a browser client may send on a cross-origin request.
const ALLOWED_HEADERS: &str = "Origin, X-Requested-With, Content-Type, Accept";

/// Start the JSON-RPC server and serve until it is stopped.
pub async fn start_server(config: Config) -> Result<()> {
    let ledger = MemoryLedger::new(config.genesis()?);
    let mut state = NodeState::new(ledger, SolcCompiler::new(&config.solc));
    state.reset();

    info!("{}", web3::version_string());
    info!("Available Accounts");
    info!("==================");
    for account in state.ledger.accounts() {
        info!("{}", data(account));
    }

    let (addr, handle) = spawn_server(&config, state).await?;
    info!("Listening on {}:{} ({})", config.host, config.port, addr);

    // Runs until the handle is stopped
    handle.stopped().await;

    info!("TestRPC server stopped");
    Ok(())
}

/// Bind the server and start serving `state` in the background. Returns the
/// bound address, which differs from the configured one when port 0 is used.
pub async fn spawn_server<L: Ledger>(config: &Config, state: NodeState<L>) -> Result<(SocketAddr, ServerHandle)> {
    let addr = config.socket_addr()?;

    let mut registry = MethodRegistry::new();
    methods::register_all(&mut registry);
    let module = rpc_module(Dispatcher::new(registry, state))?;

    // Every response carries the CORS headers; OPTIONS is answered with an
    // empty 200 before it reaches the RPC service.
    let middleware = tower::ServiceBuilder::new()
        .layer(SetResponseHeaderLayer::overriding(
            ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOWED_HEADERS),
        ))
        .layer(CorsLayer::new().allow_origin(Any));

    let server = Server::builder()
        .set_http_middleware(middleware)
        .http_only()
        .build(addr)
        .await
        .with_context(|| format!("Failed to bind server to {}", addr))?;
    let local_addr = server.local_addr().context("Failed getting local address")?;

    let handle = server.start(module);
    info!("TestRPC server listening on http://{}", local_addr);
    Ok((local_addr, handle))
}

/// Expose every registered name on a jsonrpsee module. Handlers run on the
/// blocking pool since they hold the global lock for their whole duration.
/// Unregistered names never reach the dispatcher; jsonrpsee answers them with
/// a method-not-found error.
fn rpc_module<L: Ledger>(dispatcher: Dispatcher<L>) -> Result<RpcModule<Dispatcher<L>>> {
    let names = dispatcher.registry().names();
    let mut module = RpcModule::new(dispatcher);

    for name in names {
        module.register_blocking_method(name, move |params, ctx, _| -> Result<Value, ErrorObjectOwned> {
            let params: Value = params.parse()?;
            ctx.call(name, &positional(params)).map_err(ErrorObjectOwned::from)
        })?;
    }

    info!("Registered {} RPC methods on the server", module.method_names().count());
    Ok(module)
}

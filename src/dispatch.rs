//! Serialized execution of RPC handlers.
//!
//! The ledger engine is not safe for concurrent use, not even for a read
//! running next to a write. Every handler therefore runs while holding the
//! single lock around [`NodeState`]. There is no timeout: a handler that never
//! returns stalls all RPC traffic.

use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::RpcResult;
use crate::ledger::Ledger;
use crate::registry::MethodRegistry;
use crate::state::NodeState;

/// Owns the method table and the lock-guarded node context.
pub struct Dispatcher<L: Ledger> {
    registry: MethodRegistry<L>,
    state: Mutex<NodeState<L>>,
}

impl<L: Ledger> Dispatcher<L> {
    pub fn new(registry: MethodRegistry<L>, state: NodeState<L>) -> Self {
        Self {
            registry,
            state: Mutex::new(state),
        }
    }

    /// Run `method` under the global lock. The guard is dropped on every
    /// exit path, including errors and panics inside the handler.
    pub fn call(&self, method: &str, params: &[Value]) -> RpcResult<Value> {
        let mut state = self.state.lock();
        debug!("Dispatching {}", method);
        let result = self.registry.dispatch(&mut state, method, params);
        if let Err(err) = &result {
            warn!("{} failed: {}", method, err);
        }
        result
    }

    pub fn registry(&self) -> &MethodRegistry<L> {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::SolcCompiler;
    use crate::error::RpcError;
    use crate::ledger::{GenesisConfig, MemoryLedger};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn node() -> NodeState<MemoryLedger> {
        NodeState::new(MemoryLedger::new(GenesisConfig::default()), SolcCompiler::new("solc"))
    }

    #[test]
    fn test_handlers_never_overlap() {
        let active = Arc::new(AtomicUsize::new(0));
        let overlaps = Arc::new(AtomicUsize::new(0));

        let mut registry = MethodRegistry::new();
        {
            let active = active.clone();
            let overlaps = overlaps.clone();
            registry.register("test_slow", move |_: &mut NodeState<MemoryLedger>, _: &[Value]| {
                if active.fetch_add(1, Ordering::SeqCst) != 0 {
                    overlaps.fetch_add(1, Ordering::SeqCst);
                }
                thread::sleep(Duration::from_millis(2));
                active.fetch_sub(1, Ordering::SeqCst);
                Ok(Value::Null)
            });
        }
        let dispatcher = Arc::new(Dispatcher::new(registry, node()));

        let workers: Vec<_> = (0..8)
            .map(|_| {
                let dispatcher = dispatcher.clone();
                thread::spawn(move || {
                    for _ in 0..5 {
                        dispatcher.call("test_slow", &[]).unwrap();
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        assert_eq!(overlaps.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_lock_released_after_error() {
        let mut registry = MethodRegistry::<MemoryLedger>::new();
        registry.register("test_fail", |_, _| Err(RpcError::invalid_params("boom")));
        registry.register("test_ok", |_, _| Ok(json!(true)));
        let dispatcher = Dispatcher::new(registry, node());

        assert!(dispatcher.call("test_fail", &[]).is_err());
        assert_eq!(dispatcher.call("test_ok", &[]).unwrap(), json!(true));
    }

    #[test]
    fn test_lock_released_after_panic() {
        let mut registry = MethodRegistry::<MemoryLedger>::new();
        registry.register("test_panic", |_, _| panic!("handler bug"));
        registry.register("test_ok", |_, _| Ok(json!(true)));
        let dispatcher = Arc::new(Dispatcher::new(registry, node()));

        let d = dispatcher.clone();
        assert!(thread::spawn(move || d.call("test_panic", &[])).join().is_err());
        assert_eq!(dispatcher.call("test_ok", &[]).unwrap(), json!(true));
    }

    #[test]
    fn test_unknown_method() {
        let dispatcher = Dispatcher::new(MethodRegistry::<MemoryLedger>::new(), node());
        assert!(matches!(
            dispatcher.call("foo_bar", &[]),
            Err(RpcError::MethodNotFound(_))
        ));
    }
}

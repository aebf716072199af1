//! Method name to handler table, built once at startup.

use std::collections::HashMap;

use serde_json::Value;
use tracing::debug;

use crate::error::{RpcError, RpcResult};
use crate::ledger::Ledger;
use crate::state::NodeState;

/// An RPC handler. Receives the node context and positional parameters.
pub type Handler<L> = Box<dyn Fn(&mut NodeState<L>, &[Value]) -> RpcResult<Value> + Send + Sync>;

/// Flatten decoded JSON-RPC params into positional arguments. A named
/// object is passed as the single argument.
pub fn positional(params: Value) -> Vec<Value> {
    match params {
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        other => vec![other],
    }
}

pub struct MethodRegistry<L: Ledger> {
    methods: HashMap<&'static str, Handler<L>>,
}

impl<L: Ledger> Default for MethodRegistry<L> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: Ledger> MethodRegistry<L> {
    pub fn new() -> Self {
        Self {
            methods: HashMap::new(),
        }
    }

    /// Store `handler` under `name`. Registering a name twice replaces the
    /// earlier handler.
    pub fn register<F>(&mut self, name: &'static str, handler: F)
    where
        F: Fn(&mut NodeState<L>, &[Value]) -> RpcResult<Value> + Send + Sync + 'static,
    {
        if self.methods.insert(name, Box::new(handler)).is_some() {
            debug!("Replaced handler for {}", name);
        }
    }

    /// Invoke the handler registered under `name`.
    pub fn dispatch(&self, state: &mut NodeState<L>, name: &str, params: &[Value]) -> RpcResult<Value> {
        let handler = self
            .methods
            .get(name)
            .ok_or_else(|| RpcError::MethodNotFound(name.to_string()))?;
        handler(state, params)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    /// Registered method names, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.methods.keys().copied().collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::SolcCompiler;
    use crate::ledger::{GenesisConfig, MemoryLedger};
    use serde_json::json;

    fn node() -> NodeState<MemoryLedger> {
        NodeState::new(MemoryLedger::new(GenesisConfig::default()), SolcCompiler::new("solc"))
    }

    #[test]
    fn test_dispatch_and_method_not_found() {
        let mut registry = MethodRegistry::new();
        registry.register("test_echo", |_state: &mut NodeState<MemoryLedger>, params: &[Value]| {
            Ok(Value::Array(params.to_vec()))
        });

        let mut state = node();
        assert_eq!(
            registry.dispatch(&mut state, "test_echo", &[json!(1)]).unwrap(),
            json!([1])
        );
        let err = registry.dispatch(&mut state, "foo_bar", &[]).unwrap_err();
        assert!(matches!(err, RpcError::MethodNotFound(ref name) if name == "foo_bar"));
    }

    #[test]
    fn test_register_overwrites() {
        let mut registry = MethodRegistry::<MemoryLedger>::new();
        registry.register("test_value", |_, _| Ok(json!("first")));
        registry.register("test_value", |_, _| Ok(json!("second")));

        assert_eq!(registry.len(), 1);
        let mut state = node();
        assert_eq!(
            registry.dispatch(&mut state, "test_value", &[]).unwrap(),
            json!("second")
        );
    }

    #[test]
    fn test_positional_params() {
        assert_eq!(positional(json!([1, "a"])), vec![json!(1), json!("a")]);
        assert_eq!(positional(Value::Null), Vec::<Value>::new());
        assert_eq!(positional(json!({"to": "0x"})), vec![json!({"to": "0x"})]);
    }
}

//! Client-installed block and log filters.

use std::collections::HashMap;

use serde_json::Value;
use tracing::debug;

use crate::codec::{parse_address, parse_hash, quantity};
use crate::error::{RpcError, RpcResult};
use crate::ledger::{Address, BlockTag, ChainView, Log, H256};

/// Identifier handed out by `eth_newFilter` / `eth_newBlockFilter`.
pub type FilterId = u64;

/// Log selection criteria of `eth_newFilter`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogCriteria {
    pub from_block: Option<BlockTag>,
    pub to_block: Option<BlockTag>,
    /// Empty means any address.
    pub addresses: Vec<Address>,
    /// Positional topic constraints. `None` is a wildcard, a list is an OR.
    pub topics: Vec<Option<Vec<H256>>>,
}

impl LogCriteria {
    /// Parse a filter object (`fromBlock`, `toBlock`, `address`, `topics`).
    pub fn from_param(param: Option<&Value>) -> RpcResult<Self> {
        let Some(param) = param.filter(|v| !v.is_null()) else {
            return Ok(Self::default());
        };
        let Value::Object(obj) = param else {
            return Err(RpcError::invalid_params("filter criteria must be an object"));
        };

        let block = |key: &str| -> RpcResult<Option<BlockTag>> {
            match obj.get(key) {
                None | Some(Value::Null) => Ok(None),
                Some(v) => BlockTag::from_param(Some(v)).map(Some),
            }
        };

        let addresses = match obj.get("address") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::String(s)) => vec![parse_address(s)?],
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_str()
                        .ok_or_else(|| RpcError::invalid_params("address must be a string"))
                        .and_then(parse_address)
                })
                .collect::<RpcResult<_>>()?,
            Some(other) => {
                return Err(RpcError::invalid_params(format!("invalid address {other}")))
            }
        };

        let topics = match obj.get("topics") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .map(parse_topic)
                .collect::<RpcResult<_>>()?,
            Some(other) => return Err(RpcError::invalid_params(format!("invalid topics {other}"))),
        };

        Ok(Self {
            from_block: block("fromBlock")?,
            to_block: block("toBlock")?,
            addresses,
            topics,
        })
    }

    /// Whether `log` satisfies the address and topic constraints.
    pub fn matches(&self, log: &Log) -> bool {
        if !self.addresses.is_empty() && !self.addresses.contains(&log.address) {
            return false;
        }
        self.topics.iter().enumerate().all(|(i, wanted)| match wanted {
            None => true,
            Some(options) => log.topics.get(i).is_some_and(|t| options.contains(t)),
        })
    }

    /// Block range the criteria select, resolved against `head`.
    fn range(&self, head: u64) -> (u64, u64) {
        let from = self.from_block.unwrap_or(BlockTag::Latest).resolve(head);
        let to = self.to_block.unwrap_or(BlockTag::Latest).resolve(head);
        (from, to)
    }

    /// Explicit numeric bounds only; `latest`/`pending` do not bound polling.
    fn numeric_bounds(&self) -> (u64, u64) {
        let lower = match self.from_block {
            Some(BlockTag::Number(n)) => n,
            _ => 0,
        };
        let upper = match self.to_block {
            Some(BlockTag::Number(n)) => n,
            _ => u64::MAX,
        };
        (lower, upper)
    }
}

fn parse_topic(item: &Value) -> RpcResult<Option<Vec<H256>>> {
    match item {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(vec![parse_hash(s)?])),
        Value::Array(options) => options
            .iter()
            .map(|o| {
                o.as_str()
                    .ok_or_else(|| RpcError::invalid_params("topic must be a string"))
                    .and_then(parse_hash)
            })
            .collect::<RpcResult<Vec<_>>>()
            .map(Some),
        other => Err(RpcError::invalid_params(format!("invalid topic {other}"))),
    }
}

#[derive(Debug, Clone)]
enum FilterKind {
    Block,
    Log(LogCriteria),
}

#[derive(Debug, Clone)]
struct Filter {
    kind: FilterKind,
    /// Last block already reported to the client.
    cursor: u64,
}

/// Items reported by `eth_getFilterChanges`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterChanges {
    /// Hashes of blocks mined since the last poll
    Blocks(Vec<H256>),
    /// Matching logs mined since the last poll
    Logs(Vec<Log>),
}

/// Installed filters and their cursors.
#[derive(Debug)]
pub struct FilterRegistry {
    next_id: FilterId,
    filters: HashMap<FilterId, Filter>,
}

impl Default for FilterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FilterRegistry {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            filters: HashMap::new(),
        }
    }

    fn install<C: ChainView + ?Sized>(&mut self, kind: FilterKind, chain: &C) -> FilterId {
        let id = self.next_id;
        self.next_id += 1;
        let cursor = chain.block_number();
        debug!("Installed filter {} at block {}: {:?}", id, cursor, kind);
        self.filters.insert(id, Filter { kind, cursor });
        id
    }

    /// Install a log filter. Only blocks mined after installation are
    /// reported as changes.
    pub fn new_filter<C: ChainView + ?Sized>(&mut self, criteria: LogCriteria, chain: &C) -> FilterId {
        self.install(FilterKind::Log(criteria), chain)
    }

    /// Install a filter reporting new block hashes.
    pub fn new_block_filter<C: ChainView + ?Sized>(&mut self, chain: &C) -> FilterId {
        self.install(FilterKind::Block, chain)
    }

    /// Report items since the last poll and advance the cursor to the head.
    pub fn get_filter_changes<C: ChainView + ?Sized>(
        &mut self,
        id: FilterId,
        chain: &C,
    ) -> RpcResult<FilterChanges> {
        let filter = self
            .filters
            .get_mut(&id)
            .ok_or_else(|| RpcError::UnknownFilter(quantity(id)))?;
        let head = chain.block_number();
        let start = filter.cursor + 1;

        let changes = match &filter.kind {
            FilterKind::Block => FilterChanges::Blocks(
                (start..=head).filter_map(|n| chain.block_hash(n)).collect(),
            ),
            FilterKind::Log(criteria) => {
                let (lower, upper) = criteria.numeric_bounds();
                let from = start.max(lower);
                let to = head.min(upper);
                let logs = if from > to {
                    Vec::new()
                } else {
                    chain
                        .logs(from, to)
                        .into_iter()
                        .filter(|log| criteria.matches(log))
                        .collect()
                };
                FilterChanges::Logs(logs)
            }
        };

        filter.cursor = head;
        Ok(changes)
    }

    /// All logs matching a log filter's criteria. The cursor is not moved.
    pub fn get_filter_logs<C: ChainView + ?Sized>(&self, id: FilterId, chain: &C) -> RpcResult<Vec<Log>> {
        let filter = self
            .filters
            .get(&id)
            .ok_or_else(|| RpcError::UnknownFilter(quantity(id)))?;
        let FilterKind::Log(criteria) = &filter.kind else {
            return Err(RpcError::invalid_params(format!(
                "filter {} is not a log filter",
                quantity(id)
            )));
        };

        let (from, to) = criteria.range(chain.block_number());
        if from > to {
            return Ok(Vec::new());
        }
        Ok(chain
            .logs(from, to)
            .into_iter()
            .filter(|log| criteria.matches(log))
            .collect())
    }

    /// Remove a filter, returning whether it was installed.
    pub fn uninstall_filter(&mut self, id: FilterId) -> bool {
        let existed = self.filters.remove(&id).is_some();
        debug!("Uninstall filter {}: existed={}", id, existed);
        existed
    }

    /// Pull every cursor back to `head` after the chain was rewound, so that
    /// blocks from the discarded branch are never reported.
    pub fn rewind(&mut self, head: u64) {
        for filter in self.filters.values_mut() {
            filter.cursor = filter.cursor.min(head);
        }
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Chain of blocks with pre-baked logs.
    #[derive(Default)]
    struct FakeChain {
        blocks: Vec<(H256, Vec<Log>)>,
    }

    impl FakeChain {
        fn new() -> Self {
            let mut chain = Self::default();
            chain.mine(Vec::new());
            chain
        }

        fn mine(&mut self, logs: Vec<(Address, Vec<H256>)>) -> H256 {
            let number = self.blocks.len() as u64;
            let hash = [number as u8 + 1; 32];
            let logs = logs
                .into_iter()
                .enumerate()
                .map(|(i, (address, topics))| Log {
                    address,
                    topics,
                    data: Vec::new(),
                    block_number: number,
                    block_hash: hash,
                    transaction_hash: [0xee; 32],
                    transaction_index: 0,
                    log_index: i as u64,
                })
                .collect();
            self.blocks.push((hash, logs));
            hash
        }

        fn truncate(&mut self, head: u64) {
            self.blocks.truncate(head as usize + 1);
        }
    }

    impl ChainView for FakeChain {
        fn block_number(&self) -> u64 {
            self.blocks.len() as u64 - 1
        }

        fn block_hash(&self, number: u64) -> Option<H256> {
            self.blocks.get(number as usize).map(|(h, _)| *h)
        }

        fn logs(&self, from: u64, to: u64) -> Vec<Log> {
            self.blocks[from as usize..=to as usize]
                .iter()
                .flat_map(|(_, logs)| logs.clone())
                .collect()
        }
    }

    const TOKEN: Address = [0xaa; 20];
    const OTHER: Address = [0xbb; 20];
    const TRANSFER: H256 = [0x01; 32];
    const APPROVAL: H256 = [0x02; 32];

    #[test]
    fn test_fresh_filter_has_no_changes() {
        let chain = FakeChain::new();
        let mut filters = FilterRegistry::new();
        let block_filter = filters.new_block_filter(&chain);
        let log_filter = filters.new_filter(LogCriteria::default(), &chain);

        assert_eq!(
            filters.get_filter_changes(block_filter, &chain).unwrap(),
            FilterChanges::Blocks(Vec::new())
        );
        assert_eq!(
            filters.get_filter_changes(log_filter, &chain).unwrap(),
            FilterChanges::Logs(Vec::new())
        );
    }

    #[test]
    fn test_block_filter_reports_each_block_once() {
        let mut chain = FakeChain::new();
        let mut filters = FilterRegistry::new();
        let id = filters.new_block_filter(&chain);

        let h1 = chain.mine(Vec::new());
        let h2 = chain.mine(Vec::new());
        assert_eq!(
            filters.get_filter_changes(id, &chain).unwrap(),
            FilterChanges::Blocks(vec![h1, h2])
        );
        assert_eq!(
            filters.get_filter_changes(id, &chain).unwrap(),
            FilterChanges::Blocks(Vec::new())
        );
    }

    #[test]
    fn test_log_filter_matches_address_and_topics() {
        let mut chain = FakeChain::new();
        let mut filters = FilterRegistry::new();
        let criteria = LogCriteria {
            addresses: vec![TOKEN],
            topics: vec![Some(vec![TRANSFER])],
            ..Default::default()
        };
        let id = filters.new_filter(criteria, &chain);

        chain.mine(vec![
            (TOKEN, vec![TRANSFER]),
            (TOKEN, vec![APPROVAL]),
            (OTHER, vec![TRANSFER]),
        ]);

        let FilterChanges::Logs(logs) = filters.get_filter_changes(id, &chain).unwrap() else {
            panic!("expected logs");
        };
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].address, TOKEN);
        assert_eq!(logs[0].topics, vec![TRANSFER]);
    }

    #[test]
    fn test_filter_logs_does_not_move_cursor() {
        let mut chain = FakeChain::new();
        let mut filters = FilterRegistry::new();
        let criteria = LogCriteria {
            from_block: Some(BlockTag::Number(0)),
            ..Default::default()
        };
        chain.mine(vec![(TOKEN, vec![TRANSFER])]);
        let id = filters.new_filter(criteria, &chain);
        chain.mine(vec![(OTHER, vec![APPROVAL])]);

        // Full history, twice, without side effects.
        assert_eq!(filters.get_filter_logs(id, &chain).unwrap().len(), 2);
        assert_eq!(filters.get_filter_logs(id, &chain).unwrap().len(), 2);

        // Changes only cover blocks after installation.
        let FilterChanges::Logs(logs) = filters.get_filter_changes(id, &chain).unwrap() else {
            panic!("expected logs");
        };
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].address, OTHER);
    }

    #[test]
    fn test_filter_logs_on_block_filter_is_rejected() {
        let chain = FakeChain::new();
        let mut filters = FilterRegistry::new();
        let id = filters.new_block_filter(&chain);
        assert!(matches!(
            filters.get_filter_logs(id, &chain),
            Err(RpcError::InvalidParams(_))
        ));
    }

    #[test]
    fn test_unknown_and_uninstalled_filters() {
        let chain = FakeChain::new();
        let mut filters = FilterRegistry::new();
        assert!(matches!(
            filters.get_filter_changes(7, &chain),
            Err(RpcError::UnknownFilter(_))
        ));

        let id = filters.new_block_filter(&chain);
        assert!(filters.uninstall_filter(id));
        assert!(!filters.uninstall_filter(id));
        assert!(matches!(
            filters.get_filter_changes(id, &chain),
            Err(RpcError::UnknownFilter(_))
        ));
        assert!(filters.is_empty());
    }

    #[test]
    fn test_rewind_hides_discarded_history() {
        let mut chain = FakeChain::new();
        let mut filters = FilterRegistry::new();
        let id = filters.new_block_filter(&chain);
        chain.mine(Vec::new());
        chain.mine(Vec::new());
        filters.get_filter_changes(id, &chain).unwrap();

        // Chain goes back to genesis and grows a new branch.
        chain.truncate(0);
        filters.rewind(chain.block_number());
        let fresh = chain.mine(Vec::new());

        assert_eq!(
            filters.get_filter_changes(id, &chain).unwrap(),
            FilterChanges::Blocks(vec![fresh])
        );
    }

    #[test]
    fn test_parse_criteria() {
        let criteria = LogCriteria::from_param(Some(&json!({
            "fromBlock": "0x1",
            "toBlock": "latest",
            "address": ["0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"],
            "topics": [null, [format!("0x{}", "01".repeat(32))]]
        })))
        .unwrap();
        assert_eq!(criteria.from_block, Some(BlockTag::Number(1)));
        assert_eq!(criteria.to_block, Some(BlockTag::Latest));
        assert_eq!(criteria.addresses, vec![TOKEN]);
        assert_eq!(criteria.topics, vec![None, Some(vec![TRANSFER])]);

        assert_eq!(LogCriteria::from_param(None).unwrap(), LogCriteria::default());
        assert!(LogCriteria::from_param(Some(&json!("nope"))).is_err());
    }
}

//! Ledger checkpoints for `evm_snapshot` / `evm_revert`.
//!
//! Ids come from a counter that only moves forward. Reverting to an id
//! consumes it together with every id issued after it.

use std::collections::BTreeMap;

use tracing::debug;

use crate::codec::quantity;
use crate::error::{RpcError, RpcResult};

/// Identifier handed out by `evm_snapshot`.
pub type SnapshotId = u64;

/// Table of captured ledger states keyed by snapshot id.
#[derive(Debug)]
pub struct SnapshotManager<S> {
    next_id: SnapshotId,
    snapshots: BTreeMap<SnapshotId, S>,
}

impl<S> Default for SnapshotManager<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> SnapshotManager<S> {
    /// Create an empty table. The first id issued is 1.
    pub fn new() -> Self {
        Self {
            next_id: 1,
            snapshots: BTreeMap::new(),
        }
    }

    /// Store a captured state and return its id.
    pub fn snapshot(&mut self, state: S) -> SnapshotId {
        let id = self.next_id;
        self.next_id += 1;
        self.snapshots.insert(id, state);
        debug!("Snapshot {} taken ({} live)", id, self.snapshots.len());
        id
    }

    /// Take the state captured under `id`, retiring `id` and all later ids.
    /// Unknown ids leave the table untouched.
    pub fn revert(&mut self, id: SnapshotId) -> RpcResult<S> {
        let state = self
            .snapshots
            .remove(&id)
            .ok_or_else(|| RpcError::UnknownSnapshot(quantity(id)))?;
        let retired = self.snapshots.split_off(&id);
        debug!("Reverted to snapshot {}, retired {} later snapshots", id, retired.len());
        Ok(state)
    }

    /// Discard every snapshot. The id counter keeps counting.
    pub fn clear(&mut self) {
        self.snapshots.clear();
    }

    /// Number of snapshots that can still be reverted to.
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn contains(&self, id: SnapshotId) -> bool {
        self.snapshots.contains_key(&id)
    }
}

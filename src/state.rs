//! Process-wide node context: the ledger plus the snapshot and filter tables
//! that track it. Only ever touched while the global execution lock is held.

use tracing::info;

use crate::compiler::SolcCompiler;
use crate::error::RpcResult;
use crate::filter::FilterRegistry;
use crate::ledger::Ledger;
use crate::snapshot::{SnapshotId, SnapshotManager};

pub struct NodeState<L: Ledger> {
    pub ledger: L,
    pub snapshots: SnapshotManager<L::Snapshot>,
    pub filters: FilterRegistry,
    pub compiler: SolcCompiler,
}

impl<L: Ledger> NodeState<L> {
    pub fn new(ledger: L, compiler: SolcCompiler) -> Self {
        Self {
            ledger,
            snapshots: SnapshotManager::new(),
            filters: FilterRegistry::new(),
            compiler,
        }
    }

    /// Return the ledger to genesis and drop all snapshots. Installed filters
    /// survive but will not report anything from before the reset.
    pub fn reset(&mut self) {
        self.ledger.reset();
        self.snapshots.clear();
        self.filters.rewind(self.ledger.block_number());
        info!("Node reset to genesis");
    }

    /// Capture the current ledger state.
    pub fn snapshot(&mut self) -> SnapshotId {
        let captured = self.ledger.snapshot();
        let id = self.snapshots.snapshot(captured);
        info!("Saved snapshot {} at block {}", id, self.ledger.block_number());
        id
    }

    /// Rewind the ledger to snapshot `id`. Fails without side effects when
    /// `id` is unknown or already retired.
    pub fn revert(&mut self, id: SnapshotId) -> RpcResult<()> {
        let captured = self.snapshots.revert(id)?;
        self.ledger.revert(captured);
        let head = self.ledger.block_number();
        self.filters.rewind(head);
        info!("Reverted to snapshot {} (block {})", id, head);
        Ok(())
    }
}

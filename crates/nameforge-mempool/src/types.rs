//! Core type definitions for the mempool.

use bitcoin::{Transaction, Txid};
use slotmap::DefaultKey;
use std::sync::Arc;

/// Handle to entry in mempool arena (not an iterator).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntryId(pub(crate) DefaultKey);

/// Reason for removing transactions from mempool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalReason {
    /// Included in a block.
    Block,
    /// Chain reorganization.
    Reorg,
    /// Conflicted with another transaction.
    Conflict,
    /// Removed explicitly, along with its descendants.
    Recursive,
    /// Removed explicitly, descendants stay.
    Direct,
    /// Evicted due to mempool size limit.
    SizeLimit,
    /// Expired (too old).
    Expiry,
}

impl RemovalReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Block => "block",
            Self::Reorg => "reorg",
            Self::Conflict => "conflict",
            Self::Recursive => "recursive",
            Self::Direct => "direct",
            Self::SizeLimit => "sizelimit",
            Self::Expiry => "expiry",
        }
    }
}

/// Collects transactions evicted by conflict removal.
///
/// The tracker is handed to the removal paths by mutable reference and
/// receives every evicted transaction in removal order, so that wallets can
/// mark their own transactions as conflicted.
#[derive(Debug, Default, Clone)]
pub struct ConflictTracker {
    removed: Vec<Arc<Transaction>>,
}

impl ConflictTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record(&mut self, tx: Arc<Transaction>) {
        self.removed.push(tx);
    }

    /// Evicted transactions in removal order.
    pub fn conflicts(&self) -> &[Arc<Transaction>] {
        &self.removed
    }

    /// Ids of the evicted transactions in removal order.
    pub fn txids(&self) -> Vec<Txid> {
        self.removed.iter().map(|tx| tx.compute_txid()).collect()
    }

    pub fn len(&self) -> usize {
        self.removed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.removed.is_empty()
    }

    pub fn into_inner(self) -> Vec<Arc<Transaction>> {
        self.removed
    }
}

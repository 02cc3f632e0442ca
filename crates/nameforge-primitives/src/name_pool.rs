//! Name-aware transaction pool abstraction for wallet and RPC integration.

use crate::{Name, NameView, PendingNameOp};
use bitcoin::{OutPoint, Transaction};

/// Queries a wallet or RPC layer needs from the pool's unconfirmed name state.
///
/// All methods are synchronous and bounded by the pool size. Methods taking a
/// [`NameView`] expect the caller to already hold the ledger lock, which must
/// always be acquired before the pool lock.
pub trait NamePool: Send + Sync + 'static {
    /// Whether a pooled transaction registers `name`.
    fn registers_name(&self, name: &Name) -> bool;

    /// Whether a pooled transaction updates `name`.
    fn updates_name(&self, name: &Name) -> bool;

    /// Output that a new update of `name` has to spend to extend the pending chain.
    ///
    /// Returns `None` if the pool holds no operation for `name`; the confirmed
    /// record's outpoint is the one to spend in that case.
    fn last_name_output(&self, name: &Name) -> Option<OutPoint>;

    /// Whether the name operation of `tx` (if any) could enter the pool now.
    fn check_name_ops(&self, tx: &Transaction, view: &dyn NameView) -> bool;

    /// Pending name operations, optionally restricted to a single name.
    fn pending_name_ops(&self, filter: Option<&Name>) -> Vec<PendingNameOp>;
}

/// Pool without any pending name operation that admits everything.
#[derive(Debug, Default, Clone)]
pub struct NoOpNamePool;

impl NamePool for NoOpNamePool {
    fn registers_name(&self, _name: &Name) -> bool {
        false
    }

    fn updates_name(&self, _name: &Name) -> bool {
        false
    }

    fn last_name_output(&self, _name: &Name) -> Option<OutPoint> {
        None
    }

    fn check_name_ops(&self, _tx: &Transaction, _view: &dyn NameView) -> bool {
        true
    }

    fn pending_name_ops(&self, _filter: Option<&Name>) -> Vec<PendingNameOp> {
        Vec::new()
    }
}

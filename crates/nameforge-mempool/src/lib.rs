//! # Name Mempool Overview
//!
//! 1. Name Index.
//!     - Every pooled transaction carrying a name operation is indexed by name,
//!       registrations and updates separately, plus a reverse index by txid.
//! 2. Admission.
//!     - A registration is admitted only for an unregistered name without a
//!       pending registration; an update only for a registered name, and only if
//!       it extends the pending chain of that name.
//! 3. Chain Resolution.
//!     - The terminal output of a name's pending chain is what the next update
//!       has to spend.
//! 4. Eviction.
//!     - Every removal path keeps the name index in sync, conflict removals are
//!       reported to a [`ConflictTracker`].
//! 5. Audit.
//!     - The name index can be re-derived from the pool and checked against the
//!       confirmed registry at any time.
//!
//! The pool lock is always acquired after the ledger lock guarding the confirmed
//! registry; operations needing the registry take it as a [`NameView`].

mod admission;
mod arena;
mod audit;
mod error;
mod inner;
mod names;
mod options;
mod prepare;
mod resolver;
mod types;

#[cfg(test)]
mod tests;

pub use self::arena::{MemPoolArena, TxMemPoolEntry};
pub use self::error::{InconsistencyError, MempoolError, NameRejection, PrepareError};
pub use self::inner::MemPoolInner;
pub use self::names::NameIndex;
pub use self::options::{MemPoolLimits, MemPoolOptions, MemPoolOptionsBuilder, NameLimits};
pub use self::prepare::PreparedUpdate;
pub use self::types::{ConflictTracker, EntryId, RemovalReason};

use bitcoin::{OutPoint, Transaction, Txid};
use nameforge_primitives::name_pool::NamePool;
use nameforge_primitives::{Name, NameView, PendingNameOp};
use parking_lot::RwLock;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

pub(crate) const LOG_TARGET: &str = "mempool::names";

/// Thread-safe name-aware mempool.
///
/// A single lock guards the pool together with its name index. Callers holding
/// the ledger lock may call in; the pool never acquires the ledger lock itself.
pub struct MemPool {
    /// Configuration (immutable after creation).
    options: MemPoolOptions,

    /// Thread-safe inner state.
    inner: RwLock<MemPoolInner>,

    /// Atomic counters (lockless).
    transactions_updated: AtomicU32,
    sequence_number: AtomicU64,
}

impl MemPool {
    /// Create a new mempool with default options.
    pub fn new() -> Self {
        Self::with_options(MemPoolOptions::default())
    }

    /// Create a new mempool with custom options.
    pub fn with_options(options: MemPoolOptions) -> Self {
        Self {
            options,
            inner: RwLock::new(MemPoolInner::new()),
            transactions_updated: AtomicU32::new(0),
            sequence_number: AtomicU64::new(1),
        }
    }

    /// Accept a single transaction into the mempool.
    ///
    /// Holds the write lock for the entire check and commit, so the name index
    /// cannot change between admission and insertion.
    pub fn accept_transaction(
        &self,
        tx: Transaction,
        view: &dyn NameView,
    ) -> Result<Txid, MempoolError> {
        let mut inner = self.inner.write();

        let entry = TxMemPoolEntry::new(Arc::new(tx), now(), self.next_sequence());
        let txid = entry.txid;

        if inner.contains_txid(&txid) {
            return Err(MempoolError::AlreadyInMempool);
        }

        if entry.tx.is_coinbase() {
            return Err(MempoolError::Coinbase);
        }

        if let Some(conflict) = inner.find_conflict(&entry.tx) {
            return Err(MempoolError::TxConflict(conflict));
        }

        inner.check_name_op(&entry.tx, entry.name_op.as_ref(), view)?;

        inner.check_chain_limits(&entry.tx, &self.options.limits)?;

        let max_size = self.options.max_size_bytes();
        if !inner.fits_after_trim(&entry.tx, entry.vsize, max_size) {
            return Err(MempoolError::MempoolFull);
        }

        inner.add_entry(entry);

        inner.trim_to_size(max_size);
        if !inner.contains_txid(&txid) {
            return Err(MempoolError::MempoolFull);
        }

        self.transactions_updated.fetch_add(1, Ordering::SeqCst);

        Ok(txid)
    }

    /// Add a transaction without any policy check.
    ///
    /// Used to re-add transactions of disconnected blocks. The name operation
    /// is indexed as is, the caller is responsible for its validity.
    pub fn add_unchecked(&self, tx: Transaction) -> Txid {
        let tx = Arc::new(tx);
        let txid = tx.compute_txid();
        self.inner
            .write()
            .add_unchecked(tx, now(), self.next_sequence());
        self.transactions_updated.fetch_add(1, Ordering::SeqCst);
        txid
    }

    /// Remove a single transaction, its descendants stay in the pool.
    pub fn remove_unchecked(&self, txid: &Txid) -> Option<Arc<Transaction>> {
        let removed = self.inner.write().remove_unchecked(txid);
        if removed.is_some() {
            self.transactions_updated.fetch_add(1, Ordering::SeqCst);
        }
        removed
    }

    /// Remove `tx` and all of its in-pool descendants.
    ///
    /// Works for transactions that are not pooled themselves, in which case the
    /// pooled spenders of their outputs are removed.
    pub fn remove_recursive(&self, tx: &Transaction) -> Vec<Arc<Transaction>> {
        let removed = self
            .inner
            .write()
            .remove_recursive(tx, RemovalReason::Recursive);
        self.transactions_updated
            .fetch_add(removed.len() as u32, Ordering::SeqCst);
        removed
    }

    /// Remove every transaction conflicting with `tx`, reporting them to
    /// `tracker` in removal order.
    ///
    /// Conflicts are the spenders of any input of `tx`, the pending registrations
    /// of the name `tx` registers and all of their descendants.
    pub fn remove_conflicts(&self, tx: &Transaction, tracker: &mut ConflictTracker) {
        let before = tracker.len();
        self.inner.write().remove_conflicts(tx, tracker);
        self.transactions_updated
            .fetch_add((tracker.len() - before) as u32, Ordering::SeqCst);
    }

    /// Remove transactions confirmed in a block.
    ///
    /// `view` must already reflect the connected block. Conflicts of the
    /// confirmed transactions and name operations made impossible by the block
    /// are reported to `tracker`.
    pub fn remove_for_block(
        &self,
        confirmed_txs: &[Transaction],
        view: &dyn NameView,
        tracker: &mut ConflictTracker,
    ) {
        let mut inner = self.inner.write();
        let size_before = inner.size();

        inner.remove_for_block(confirmed_txs, view, tracker);

        self.transactions_updated
            .fetch_add((size_before - inner.size()) as u32, Ordering::SeqCst);

        tracing::debug!(
            target: LOG_TARGET,
            confirmed = confirmed_txs.len(),
            conflicts = tracker.len(),
            "Updated mempool for connected block",
        );

        if self.options.check_names {
            check_inner(&inner, view);
        }
    }

    /// Remove name operations invalidated by a reorganization.
    ///
    /// `view` must reflect the new tip. Registrations of names that now exist
    /// and updates of names that no longer exist are removed together with
    /// their descendants and reported to `tracker`.
    pub fn remove_for_reorg(&self, view: &dyn NameView, tracker: &mut ConflictTracker) {
        let mut inner = self.inner.write();
        let size_before = inner.size();

        inner.remove_invalid_name_ops(view, tracker, RemovalReason::Reorg);

        self.transactions_updated
            .fetch_add((size_before - inner.size()) as u32, Ordering::SeqCst);

        if self.options.check_names {
            check_inner(&inner, view);
        }
    }

    /// Trim mempool to maximum size.
    ///
    /// Returns the number of evicted transactions.
    pub fn trim_to_size(&self, max_size: u64) -> usize {
        let evicted = self.inner.write().trim_to_size(max_size);
        self.transactions_updated
            .fetch_add(evicted as u32, Ordering::SeqCst);
        evicted
    }

    /// Expire old transactions.
    ///
    /// Returns the number of expired transactions.
    pub fn expire(&self, max_age_seconds: i64) -> usize {
        let expired = self.inner.write().expire(now(), max_age_seconds);
        self.transactions_updated
            .fetch_add(expired as u32, Ordering::SeqCst);
        expired
    }

    /// Expire transactions older than the configured expiry.
    ///
    /// Returns the number of expired transactions.
    pub fn expire_stale(&self) -> usize {
        let max_age = self.options.expiry_duration().as_secs();
        self.expire(i64::try_from(max_age).unwrap_or(i64::MAX))
    }

    /// Remove all transactions.
    pub fn clear(&self) {
        let mut inner = self.inner.write();
        let removed = inner.size();
        inner.clear();
        self.transactions_updated
            .fetch_add(removed as u32, Ordering::SeqCst);
    }

    /// Get number of transactions in mempool.
    pub fn size(&self) -> usize {
        self.inner.read().size()
    }

    /// Get total virtual size of all transactions.
    pub fn total_size(&self) -> u64 {
        self.inner.read().total_size()
    }

    pub fn contains(&self, txid: &Txid) -> bool {
        self.inner.read().contains_txid(txid)
    }

    pub fn get(&self, txid: &Txid) -> Option<Arc<Transaction>> {
        self.inner
            .read()
            .get_entry(txid)
            .map(|entry| entry.tx.clone())
    }

    /// Pending registration of `name`, if any.
    pub fn pending_registration(&self, name: &Name) -> Option<Txid> {
        self.inner.read().names.registration(name)
    }

    /// Pending updates of `name`, ordered by txid.
    pub fn pending_updates(&self, name: &Name) -> Vec<Txid> {
        self.inner
            .read()
            .names
            .updates(name)
            .map(|updates| updates.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Structured form of [`NamePool::check_name_ops`].
    pub fn check_name_admission(
        &self,
        tx: &Transaction,
        view: &dyn NameView,
    ) -> Result<(), NameRejection> {
        let name_op = nameforge_script::classify(tx);
        self.inner.read().check_name_op(tx, name_op.as_ref(), view)
    }

    /// Audit the name index against the pool contents and `view`.
    pub fn audit(&self, view: &dyn NameView) -> Result<(), InconsistencyError> {
        self.inner.read().audit(view)
    }

    /// Audit the name index, treating any divergence as an internal fault.
    ///
    /// Panics in debug builds, logs at error level otherwise.
    pub fn check_names(&self, view: &dyn NameView) {
        check_inner(&self.inner.read(), view);
    }

    /// Number of pool changes since creation.
    pub fn transactions_updated(&self) -> u32 {
        self.transactions_updated.load(Ordering::SeqCst)
    }

    /// Get mempool options.
    pub fn options(&self) -> &MemPoolOptions {
        &self.options
    }

    fn next_sequence(&self) -> u64 {
        self.sequence_number.fetch_add(1, Ordering::SeqCst)
    }
}

impl Default for MemPool {
    fn default() -> Self {
        Self::new()
    }
}

impl NamePool for MemPool {
    fn registers_name(&self, name: &Name) -> bool {
        self.inner.read().names.registers_name(name)
    }

    fn updates_name(&self, name: &Name) -> bool {
        self.inner.read().names.updates_name(name)
    }

    fn last_name_output(&self, name: &Name) -> Option<OutPoint> {
        self.inner.read().last_name_output(name)
    }

    fn check_name_ops(&self, tx: &Transaction, view: &dyn NameView) -> bool {
        match self.check_name_admission(tx, view) {
            Ok(()) => true,
            Err(rejection) => {
                tracing::debug!(
                    target: LOG_TARGET,
                    txid = %tx.compute_txid(),
                    %rejection,
                    "Name operation not admissible",
                );
                false
            }
        }
    }

    fn pending_name_ops(&self, filter: Option<&Name>) -> Vec<PendingNameOp> {
        self.inner.read().pending_name_ops(filter)
    }
}

fn check_inner(inner: &MemPoolInner, view: &dyn NameView) {
    if let Err(err) = inner.audit(view) {
        if cfg!(debug_assertions) {
            panic!("Name mempool inconsistency: {err}");
        }
        tracing::error!(target: LOG_TARGET, %err, "Name mempool inconsistency");
    }
}

fn now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|duration| duration.as_secs() as i64)
        .unwrap_or_default()
}

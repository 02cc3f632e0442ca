//! Inner mempool state protected by RwLock.

use crate::LOG_TARGET;
use crate::arena::{MemPoolArena, TxMemPoolEntry};
use crate::error::MempoolError;
use crate::names::NameIndex;
use crate::options::MemPoolLimits;
use crate::types::{ConflictTracker, EntryId, RemovalReason};
use bitcoin::{OutPoint, Transaction, Txid};
use indexmap::IndexSet;
use nameforge_primitives::{Name, NameView, PendingNameOp};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

/// Inner mempool state (protected by RwLock in main MemPool).
pub struct MemPoolInner {
    /// Arena-based entry storage.
    pub(crate) arena: MemPoolArena,

    /// Track which outputs are spent by mempool transactions.
    /// Maps outpoint -> txids spending it. Policy admission keeps a single
    /// spender, unchecked insertion may add competing ones.
    pub(crate) map_next_tx: HashMap<OutPoint, BTreeSet<Txid>>,

    /// Pending name operations.
    pub(crate) names: NameIndex,

    /// Total virtual size of all transactions.
    pub(crate) total_tx_size: u64,
}

impl MemPoolInner {
    /// Create new empty mempool inner state.
    pub fn new() -> Self {
        Self {
            arena: MemPoolArena::new(),
            map_next_tx: HashMap::new(),
            names: NameIndex::new(),
            total_tx_size: 0,
        }
    }

    /// Get entry by txid.
    pub fn get_entry(&self, txid: &Txid) -> Option<&TxMemPoolEntry> {
        self.arena.entry_by_txid(txid)
    }

    /// Check if transaction exists in mempool by txid.
    pub fn contains_txid(&self, txid: &Txid) -> bool {
        self.arena.get_by_txid(txid).is_some()
    }

    /// Pool transactions spending `outpoint`, lowest txid first.
    pub fn spenders(&self, outpoint: OutPoint) -> impl Iterator<Item = Txid> + '_ {
        self.map_next_tx
            .get(&outpoint)
            .into_iter()
            .flat_map(|spenders| spenders.iter().copied())
    }

    /// Returns a pooled transaction spending one of the inputs of `tx`.
    pub fn find_conflict(&self, tx: &Transaction) -> Option<Txid> {
        tx.input
            .iter()
            .find_map(|input| self.spenders(input.previous_output).next())
    }

    /// Add a transaction without any policy check.
    pub fn add_unchecked(&mut self, tx: Arc<Transaction>, time: i64, sequence: u64) -> EntryId {
        self.add_entry(TxMemPoolEntry::new(tx, time, sequence))
    }

    /// Commit an entry and update all indices.
    ///
    /// Inserting a transaction that is already pooled returns the existing handle.
    pub fn add_entry(&mut self, entry: TxMemPoolEntry) -> EntryId {
        let txid = entry.txid;

        if let Some(existing) = self.arena.get_by_txid(&txid) {
            tracing::debug!(target: LOG_TARGET, %txid, "Transaction already in mempool");
            return existing;
        }

        let tx = entry.tx.clone();
        let vsize = entry.vsize;
        let name_op = entry.name_op.clone();

        let id = self.arena.insert(entry);

        // In-pool parents.
        let parents: HashSet<EntryId> = tx
            .input
            .iter()
            .filter_map(|input| self.arena.get_by_txid(&input.previous_output.txid))
            .filter(|parent| *parent != id)
            .collect();

        // In-pool children, only present if they were inserted before us.
        let children: HashSet<EntryId> = (0..tx.output.len() as u32)
            .flat_map(|vout| self.spenders(OutPoint::new(txid, vout)).collect::<Vec<_>>())
            .filter_map(|spender| self.arena.get_by_txid(&spender))
            .collect();

        for parent in &parents {
            if let Some(parent_entry) = self.arena.get_mut(*parent) {
                parent_entry.children.insert(id);
            }
        }

        for child in &children {
            if let Some(child_entry) = self.arena.get_mut(*child) {
                child_entry.parents.insert(id);
            }
        }

        if let Some(entry) = self.arena.get_mut(id) {
            entry.parents = parents;
            entry.children = children;
        }

        for input in &tx.input {
            self.map_next_tx
                .entry(input.previous_output)
                .or_default()
                .insert(txid);
        }

        if let Some(name_op) = &name_op {
            self.names.on_admit(txid, name_op);
        }

        self.total_tx_size += vsize;

        tracing::debug!(
            target: LOG_TARGET,
            %txid,
            name = ?name_op.as_ref().map(|op| op.name().to_string()),
            "Added transaction to mempool",
        );

        id
    }

    /// Check the in-pool ancestor and descendant limits for `tx`.
    pub fn check_chain_limits(
        &self,
        tx: &Transaction,
        limits: &MemPoolLimits,
    ) -> Result<(), MempoolError> {
        let mut ancestors = HashSet::new();
        for input in &tx.input {
            if let Some(parent) = self.arena.get_by_txid(&input.previous_output.txid) {
                self.calculate_ancestors(parent, &mut ancestors);
            }
        }

        let count_with_ancestors = ancestors.len() + 1;
        if count_with_ancestors > limits.max_ancestors {
            return Err(MempoolError::TooManyAncestors(count_with_ancestors));
        }

        for &ancestor in &ancestors {
            let mut descendants = IndexSet::new();
            self.calculate_descendants(ancestor, &mut descendants);
            let count_with_descendants = descendants.len() + 1;
            if count_with_descendants > limits.max_descendants {
                return Err(MempoolError::TooManyDescendants(count_with_descendants));
            }
        }

        Ok(())
    }

    /// Calculate descendants of a transaction (recursively).
    ///
    /// Collects all descendant entry IDs (including the starting entry) in
    /// depth-first pre-order, visiting children by ascending txid.
    pub fn calculate_descendants(&self, entry_id: EntryId, descendants: &mut IndexSet<EntryId>) {
        if !descendants.insert(entry_id) {
            return; // Already visited
        }

        if let Some(entry) = self.arena.get(entry_id) {
            for child_id in self.sorted_children(entry) {
                self.calculate_descendants(child_id, descendants);
            }
        }
    }

    /// Calculate ancestors of a transaction (recursively).
    ///
    /// Returns set of all ancestor entry IDs (including the starting entry).
    pub fn calculate_ancestors(&self, entry_id: EntryId, ancestors: &mut HashSet<EntryId>) {
        if !ancestors.insert(entry_id) {
            return; // Already visited
        }

        if let Some(entry) = self.arena.get(entry_id) {
            for &parent_id in &entry.parents {
                self.calculate_ancestors(parent_id, ancestors);
            }
        }
    }

    fn sorted_children(&self, entry: &TxMemPoolEntry) -> Vec<EntryId> {
        let mut children: Vec<(Txid, EntryId)> = entry
            .children
            .iter()
            .filter_map(|id| self.arena.get(*id).map(|child| (child.txid, *id)))
            .collect();
        children.sort();
        children.into_iter().map(|(_, id)| id).collect()
    }

    /// Remove a single entry and unlink it from every index.
    ///
    /// Children stay in the pool, their parent link is cleared.
    fn remove_entry(&mut self, entry_id: EntryId, reason: RemovalReason) -> Option<TxMemPoolEntry> {
        let entry = self.arena.remove(entry_id)?;

        for input in &entry.tx.input {
            if let Some(spenders) = self.map_next_tx.get_mut(&input.previous_output) {
                spenders.remove(&entry.txid);
                if spenders.is_empty() {
                    self.map_next_tx.remove(&input.previous_output);
                }
            }
        }

        for parent in &entry.parents {
            if let Some(parent_entry) = self.arena.get_mut(*parent) {
                parent_entry.children.remove(&entry_id);
            }
        }

        for child in &entry.children {
            if let Some(child_entry) = self.arena.get_mut(*child) {
                child_entry.parents.remove(&entry_id);
            }
        }

        self.names.on_remove(&entry.txid);

        self.total_tx_size = self.total_tx_size.saturating_sub(entry.vsize);

        tracing::debug!(
            target: LOG_TARGET,
            txid = %entry.txid,
            reason = reason.as_str(),
            "Removed transaction from mempool",
        );

        Some(entry)
    }

    /// Remove transactions in the given order.
    ///
    /// Returns the removed transactions in removal order.
    pub fn remove_staged(
        &mut self,
        to_remove: &IndexSet<EntryId>,
        reason: RemovalReason,
    ) -> Vec<Arc<Transaction>> {
        to_remove
            .iter()
            .filter_map(|&entry_id| self.remove_entry(entry_id, reason))
            .map(|entry| entry.tx)
            .collect()
    }

    /// Remove a single transaction, leaving its descendants in the pool.
    pub fn remove_unchecked(&mut self, txid: &Txid) -> Option<Arc<Transaction>> {
        let entry_id = self.arena.get_by_txid(txid)?;
        self.remove_entry(entry_id, RemovalReason::Direct)
            .map(|entry| entry.tx)
    }

    /// Remove `tx` and all of its in-pool descendants.
    ///
    /// If `tx` itself is not pooled, the pooled spenders of its outputs and
    /// their descendants are removed.
    pub fn remove_recursive(
        &mut self,
        tx: &Transaction,
        reason: RemovalReason,
    ) -> Vec<Arc<Transaction>> {
        let txid = tx.compute_txid();

        let roots: Vec<EntryId> = match self.arena.get_by_txid(&txid) {
            Some(entry_id) => vec![entry_id],
            None => (0..tx.output.len() as u32)
                .flat_map(|vout| self.spenders(OutPoint::new(txid, vout)).collect::<Vec<_>>())
                .filter_map(|spender| self.arena.get_by_txid(&spender))
                .collect(),
        };

        let mut to_remove = IndexSet::new();
        for root in roots {
            self.calculate_descendants(root, &mut to_remove);
        }

        self.remove_staged(&to_remove, reason)
    }

    /// Collect pool transactions conflicting with `tx`.
    ///
    /// These are the spenders of any input of `tx` and, if `tx` registers a
    /// name, the pending registrations of the same name. `tx` itself is never
    /// reported.
    pub fn collect_conflicts(&self, tx: &Transaction) -> IndexSet<EntryId> {
        let txid = tx.compute_txid();
        let mut conflicts = IndexSet::new();

        for input in &tx.input {
            for spender in self.spenders(input.previous_output) {
                if spender == txid {
                    continue;
                }
                if let Some(entry_id) = self.arena.get_by_txid(&spender) {
                    conflicts.insert(entry_id);
                }
            }
        }

        if let Some(name_op) = nameforge_script::classify(tx) {
            if name_op.is_registration() {
                let registrations = self.names.registrations_of(name_op.name());
                for registration in registrations.into_iter().flatten() {
                    if *registration == txid {
                        continue;
                    }
                    if let Some(entry_id) = self.arena.get_by_txid(registration) {
                        conflicts.insert(entry_id);
                    }
                }
            }
        }

        conflicts
    }

    /// Remove every pool transaction conflicting with `tx`, along with its
    /// descendants, reporting each of them to `tracker`.
    pub fn remove_conflicts(&mut self, tx: &Transaction, tracker: &mut ConflictTracker) {
        let conflicts = self.collect_conflicts(tx);
        if conflicts.is_empty() {
            return;
        }

        let mut to_remove = IndexSet::new();
        for entry_id in conflicts {
            self.calculate_descendants(entry_id, &mut to_remove);
        }

        for removed in self.remove_staged(&to_remove, RemovalReason::Conflict) {
            tracker.record(removed);
        }
    }

    /// Remove transactions confirmed in a block.
    ///
    /// Confirmed transactions leave silently, their conflicts and any name
    /// operation invalidated by the new registry state are reported to `tracker`.
    pub fn remove_for_block(
        &mut self,
        confirmed_txs: &[Transaction],
        view: &dyn NameView,
        tracker: &mut ConflictTracker,
    ) {
        for tx in confirmed_txs {
            let txid = tx.compute_txid();
            if let Some(entry_id) = self.arena.get_by_txid(&txid) {
                self.remove_entry(entry_id, RemovalReason::Block);
            }
            self.remove_conflicts(tx, tracker);
        }

        self.remove_invalid_name_ops(view, tracker, RemovalReason::Block);
    }

    /// Remove name operations that are impossible at the registry state `view`:
    /// registrations of existing names and updates of unknown names.
    pub fn remove_invalid_name_ops(
        &mut self,
        view: &dyn NameView,
        tracker: &mut ConflictTracker,
        reason: RemovalReason,
    ) {
        let mut invalid: BTreeSet<(&Name, Txid)> = BTreeSet::new();

        for (name, registrations) in self.names.registrations() {
            if view.has_name(name) {
                invalid.extend(registrations.iter().map(|txid| (name, *txid)));
            }
        }

        for (name, updates) in self.names.all_updates() {
            if !view.has_name(name) {
                invalid.extend(updates.iter().map(|txid| (name, *txid)));
            }
        }

        let mut to_remove = IndexSet::new();
        for (name, txid) in invalid {
            if let Some(entry_id) = self.arena.get_by_txid(&txid) {
                tracing::debug!(
                    target: LOG_TARGET,
                    %name,
                    %txid,
                    "Name operation invalidated by registry state",
                );
                self.calculate_descendants(entry_id, &mut to_remove);
            }
        }

        for removed in self.remove_staged(&to_remove, reason) {
            tracker.record(removed);
        }
    }

    /// Trim mempool to maximum size by evicting the oldest transaction
    /// clusters first.
    ///
    /// Returns the number of evicted transactions.
    pub fn trim_to_size(&mut self, max_size: u64) -> usize {
        let mut evicted = 0;

        while self.total_tx_size > max_size {
            let Some((entry_id, _)) = self.arena.iter_by_entry_time().next() else {
                break;
            };

            let mut to_remove = IndexSet::new();
            self.calculate_descendants(entry_id, &mut to_remove);

            evicted += self
                .remove_staged(&to_remove, RemovalReason::SizeLimit)
                .len();
        }

        evicted
    }

    /// Whether a transaction `tx` of `vsize` would remain after adding it and
    /// trimming the pool to `max_size`.
    ///
    /// Mirrors [`Self::trim_to_size`] without mutating the pool. The candidate
    /// is doomed once trimming would have to evict one of its in-pool
    /// ancestors, since the candidate would follow as a descendant.
    pub fn fits_after_trim(&self, tx: &Transaction, vsize: u64, max_size: u64) -> bool {
        if vsize > max_size {
            return false;
        }

        let mut ancestors = HashSet::new();
        for input in &tx.input {
            if let Some(parent_id) = self.arena.get_by_txid(&input.previous_output.txid) {
                self.calculate_ancestors(parent_id, &mut ancestors);
            }
        }

        let mut total = self.total_tx_size + vsize;
        let mut evicted = IndexSet::new();

        for (entry_id, _) in self.arena.iter_by_entry_time() {
            if total <= max_size {
                return true;
            }
            if evicted.contains(&entry_id) {
                continue;
            }

            let mut cluster = IndexSet::new();
            self.calculate_descendants(entry_id, &mut cluster);
            for id in cluster {
                if !evicted.insert(id) {
                    continue;
                }
                if ancestors.contains(&id) {
                    return false;
                }
                if let Some(entry) = self.arena.get(id) {
                    total -= entry.vsize;
                }
            }
        }

        total <= max_size
    }

    /// Expire old transactions, along with their descendants.
    ///
    /// Returns the number of expired transactions.
    pub fn expire(&mut self, current_time: i64, max_age_seconds: i64) -> usize {
        let cutoff_time = current_time.saturating_sub(max_age_seconds);

        let expired: Vec<EntryId> = self
            .arena
            .iter_by_entry_time()
            .take_while(|(_, entry)| entry.time < cutoff_time)
            .map(|(entry_id, _)| entry_id)
            .collect();

        let mut to_remove = IndexSet::new();
        for entry_id in expired {
            self.calculate_descendants(entry_id, &mut to_remove);
        }

        self.remove_staged(&to_remove, RemovalReason::Expiry).len()
    }

    /// Pending name operations, optionally restricted to `filter`, sorted by
    /// name then txid.
    pub fn pending_name_ops(&self, filter: Option<&Name>) -> Vec<PendingNameOp> {
        let mut ops: Vec<PendingNameOp> = self
            .arena
            .iter()
            .filter_map(|(_, entry)| {
                let name_op = entry.name_op.as_ref()?;
                if filter.is_some_and(|name| name != name_op.name()) {
                    return None;
                }
                Some(PendingNameOp {
                    name: name_op.name().clone(),
                    value: name_op.op.value.clone(),
                    kind: name_op.kind(),
                    txid: entry.txid,
                    vout: name_op.vout,
                })
            })
            .collect();

        ops.sort_by(|a, b| (&a.name, a.txid).cmp(&(&b.name, b.txid)));
        ops
    }

    pub fn clear(&mut self) {
        self.arena.clear();
        self.map_next_tx.clear();
        self.names.clear();
        self.total_tx_size = 0;
    }

    /// Get total number of transactions.
    pub fn size(&self) -> usize {
        self.arena.len()
    }

    /// Get total transaction size in virtual bytes.
    pub fn total_size(&self) -> u64 {
        self.total_tx_size
    }
}

impl Default for MemPoolInner {
    fn default() -> Self {
        Self::new()
    }
}

//! Arena-based mempool entry storage.
//!
//! The arena uses SlotMap for handle-based entry storage, avoiding reference cycles
//! between parents and children. Every entry caches its classified name operation
//! so that the name index and the chain resolver never re-parse scripts.

use crate::types::EntryId;
use bitcoin::{OutPoint, Transaction, Txid};
use nameforge_primitives::{Name, NameOpKind};
use nameforge_script::{ClassifiedNameOp, classify};
use slotmap::{DefaultKey, SlotMap};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

/// Mempool entry.
pub struct TxMemPoolEntry {
    /// Transaction data.
    pub tx: Arc<Transaction>,

    /// Cached transaction id.
    pub txid: Txid,

    /// Name operation carried by the transaction, if any.
    pub name_op: Option<ClassifiedNameOp>,

    /// Cached virtual size.
    pub vsize: u64,

    /// Entry timestamp (seconds since epoch).
    pub time: i64,

    /// Sequence number, unique per entry.
    pub entry_sequence: u64,

    // === Graph links (handles only, no direct references) ===
    /// Parent entries (in-mempool dependencies).
    pub parents: HashSet<EntryId>,

    /// Child entries (in-mempool dependents).
    pub children: HashSet<EntryId>,
}

impl TxMemPoolEntry {
    pub fn new(tx: Arc<Transaction>, time: i64, entry_sequence: u64) -> Self {
        Self {
            txid: tx.compute_txid(),
            name_op: classify(&tx),
            vsize: tx.vsize() as u64,
            tx,
            time,
            entry_sequence,
            parents: HashSet::new(),
            children: HashSet::new(),
        }
    }

    /// Name touched by this entry.
    pub fn name(&self) -> Option<&Name> {
        self.name_op.as_ref().map(|op| op.name())
    }

    pub fn is_name_registration(&self) -> bool {
        self.name_op
            .as_ref()
            .is_some_and(|op| op.kind() == NameOpKind::Registration)
    }

    pub fn is_name_update(&self) -> bool {
        self.name_op
            .as_ref()
            .is_some_and(|op| op.kind() == NameOpKind::Update)
    }

    /// Whether this entry carries a name operation on `name`.
    pub fn touches_name(&self, name: &Name) -> bool {
        self.name() == Some(name)
    }

    /// Output holding the name after this transaction.
    pub fn name_outpoint(&self) -> Option<OutPoint> {
        self.name_op.as_ref().map(|op| op.outpoint(self.txid))
    }
}

/// Arena holding all mempool entries.
///
/// Provides O(1) lookups by txid and iteration in entry order.
pub struct MemPoolArena {
    /// Primary storage: handle -> entry.
    entries: SlotMap<DefaultKey, TxMemPoolEntry>,

    /// Index by transaction ID.
    by_txid: HashMap<Txid, EntryId>,

    /// Sorted by entry time (for expiration and eviction).
    /// Key: (time, sequence, EntryId)
    by_entry_time: BTreeSet<(i64, u64, EntryId)>,
}

impl MemPoolArena {
    /// Create a new empty arena.
    pub fn new() -> Self {
        Self {
            entries: SlotMap::new(),
            by_txid: HashMap::new(),
            by_entry_time: BTreeSet::new(),
        }
    }

    /// Insert a new entry into the arena.
    ///
    /// Returns the handle to the inserted entry.
    pub fn insert(&mut self, entry: TxMemPoolEntry) -> EntryId {
        let txid = entry.txid;
        let time = entry.time;
        let sequence = entry.entry_sequence;

        let id = EntryId(self.entries.insert(entry));

        self.by_txid.insert(txid, id);
        self.by_entry_time.insert((time, sequence, id));

        id
    }

    /// Get entry by ID (immutable).
    pub fn get(&self, id: EntryId) -> Option<&TxMemPoolEntry> {
        self.entries.get(id.0)
    }

    /// Get entry by ID (mutable).
    pub fn get_mut(&mut self, id: EntryId) -> Option<&mut TxMemPoolEntry> {
        self.entries.get_mut(id.0)
    }

    /// Lookup entry ID by txid.
    pub fn get_by_txid(&self, txid: &Txid) -> Option<EntryId> {
        self.by_txid.get(txid).copied()
    }

    /// Lookup entry by txid.
    pub fn entry_by_txid(&self, txid: &Txid) -> Option<&TxMemPoolEntry> {
        self.get(self.get_by_txid(txid)?)
    }

    /// Remove entry from arena.
    ///
    /// Returns the removed entry if it existed. Graph links of other entries
    /// are left untouched.
    pub fn remove(&mut self, id: EntryId) -> Option<TxMemPoolEntry> {
        let entry = self.entries.remove(id.0)?;

        self.by_txid.remove(&entry.txid);
        self.by_entry_time
            .remove(&(entry.time, entry.entry_sequence, id));

        Some(entry)
    }

    /// Iterate entries sorted by entry time (oldest first).
    pub fn iter_by_entry_time(&self) -> impl Iterator<Item = (EntryId, &TxMemPoolEntry)> {
        self.by_entry_time
            .iter()
            .map(|(_, _, id)| (*id, &self.entries[id.0]))
    }

    /// Iterate entries in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (EntryId, &TxMemPoolEntry)> {
        self.entries.iter().map(|(key, entry)| (EntryId(key), entry))
    }

    /// Get total number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if arena is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.by_txid.clear();
        self.by_entry_time.clear();
    }
}

impl Default for MemPoolArena {
    fn default() -> Self {
        Self::new()
    }
}

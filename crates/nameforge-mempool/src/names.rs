//! Index of unconfirmed name operations.

use bitcoin::Txid;
use nameforge_primitives::{Name, NameOpKind};
use nameforge_script::ClassifiedNameOp;
use std::collections::{BTreeSet, HashMap};

/// Pending name operations keyed by name, plus the reverse mapping used for
/// removal.
///
/// Entries are only created when a transaction enters the pool and destroyed
/// when it leaves, so admitting and then removing a transaction leaves the
/// index exactly as it was.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct NameIndex {
    /// Pending registrations per name. Admission keeps at most one, unchecked
    /// insertion may add more.
    registrations: HashMap<Name, BTreeSet<Txid>>,

    /// Pending updates per name, forming the name's pending chain.
    updates: HashMap<Name, BTreeSet<Txid>>,

    /// Names touched by each transaction.
    by_tx: HashMap<Txid, BTreeSet<Name>>,
}

impl NameIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the name operation of a newly admitted transaction.
    pub fn on_admit(&mut self, txid: Txid, name_op: &ClassifiedNameOp) {
        let name = name_op.name();

        match name_op.kind() {
            NameOpKind::Registration => {
                let registrations = self.registrations.entry(name.clone()).or_default();
                if let Some(existing) = registrations.iter().find(|existing| **existing != txid) {
                    // Only reachable through unchecked insertion; the auditor
                    // reports the resulting divergence.
                    tracing::warn!(
                        target: crate::LOG_TARGET,
                        %name,
                        %txid,
                        %existing,
                        "Second pending registration of the same name",
                    );
                }
                registrations.insert(txid);
            }
            NameOpKind::Update => {
                self.updates.entry(name.clone()).or_default().insert(txid);
            }
        }

        self.by_tx.entry(txid).or_default().insert(name.clone());
    }

    /// Forgets every name operation of `txid`.
    ///
    /// Entries are matched by transaction identity, an entry of another
    /// transaction for the same name is left alone.
    pub fn on_remove(&mut self, txid: &Txid) {
        let Some(names) = self.by_tx.remove(txid) else {
            return;
        };

        for name in names {
            if let Some(registrations) = self.registrations.get_mut(&name) {
                registrations.remove(txid);
                if registrations.is_empty() {
                    self.registrations.remove(&name);
                }
            }

            if let Some(updates) = self.updates.get_mut(&name) {
                updates.remove(txid);
                if updates.is_empty() {
                    self.updates.remove(&name);
                }
            }
        }
    }

    /// Pending registration of `name`, the lowest txid if there are several.
    pub fn registration(&self, name: &Name) -> Option<Txid> {
        self.registrations
            .get(name)
            .and_then(|registrations| registrations.first().copied())
    }

    /// Every pending registration of `name`, ordered by txid.
    pub fn registrations_of(&self, name: &Name) -> Option<&BTreeSet<Txid>> {
        self.registrations.get(name)
    }

    /// Pending updates of `name`, ordered by txid.
    pub fn updates(&self, name: &Name) -> Option<&BTreeSet<Txid>> {
        self.updates.get(name)
    }

    pub fn registers_name(&self, name: &Name) -> bool {
        self.registrations.contains_key(name)
    }

    pub fn updates_name(&self, name: &Name) -> bool {
        self.updates.contains_key(name)
    }

    /// Whether the pool holds any operation on `name`.
    pub fn touches_name(&self, name: &Name) -> bool {
        self.registers_name(name) || self.updates_name(name)
    }

    /// Names touched by `txid`.
    pub fn names_of(&self, txid: &Txid) -> Option<&BTreeSet<Name>> {
        self.by_tx.get(txid)
    }

    pub fn registrations(&self) -> impl Iterator<Item = (&Name, &BTreeSet<Txid>)> {
        self.registrations.iter()
    }

    pub fn all_updates(&self) -> impl Iterator<Item = (&Name, &BTreeSet<Txid>)> {
        self.updates.iter()
    }

    pub fn reverse_entries(&self) -> impl Iterator<Item = (&Txid, &BTreeSet<Name>)> {
        self.by_tx.iter()
    }

    /// Every name with a pending operation, sorted.
    pub fn names(&self) -> BTreeSet<&Name> {
        self.registrations.keys().chain(self.updates.keys()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.by_tx.is_empty()
    }

    pub fn clear(&mut self) {
        self.registrations.clear();
        self.updates.clear();
        self.by_tx.clear();
    }
}

//! Consistency audit of the name index.
//!
//! The audit re-derives every pending name operation from the pool contents
//! and compares the result against the live index and the confirmed registry.
//! It never mutates the pool.

use crate::error::InconsistencyError;
use crate::inner::MemPoolInner;
use bitcoin::{OutPoint, Txid};
use nameforge_primitives::{Name, NameOpKind, NameView};
use std::collections::{BTreeMap, BTreeSet};

impl MemPoolInner {
    /// Audit the name index against the pool and the registry state `view`.
    pub fn audit(&self, view: &dyn NameView) -> Result<(), InconsistencyError> {
        let mut registrations: BTreeMap<&Name, BTreeSet<Txid>> = BTreeMap::new();
        let mut updates: BTreeMap<&Name, BTreeSet<Txid>> = BTreeMap::new();

        for (_, entry) in self.arena.iter() {
            let Some(name_op) = &entry.name_op else {
                if self.names.names_of(&entry.txid).is_some() {
                    return Err(InconsistencyError::ReverseIndexMismatch(entry.txid));
                }
                continue;
            };

            let name = name_op.name();
            let derived = match name_op.kind() {
                NameOpKind::Registration => &mut registrations,
                NameOpKind::Update => &mut updates,
            };
            derived.entry(name).or_default().insert(entry.txid);

            let indexed = self.names.names_of(&entry.txid);
            if indexed.is_none_or(|names| names.len() != 1 || !names.contains(name)) {
                return Err(InconsistencyError::ReverseIndexMismatch(entry.txid));
            }
        }

        for (txid, _) in self.names.reverse_entries() {
            if !self.contains_txid(txid) {
                return Err(InconsistencyError::ReverseIndexMismatch(*txid));
            }
        }

        // Registrations: a single indexed one, never a confirmed name.
        for (name, txids) in &registrations {
            if txids.len() != 1 || self.names.registrations_of(name) != Some(txids) {
                return Err(InconsistencyError::RegistrationMismatch((*name).clone()));
            }
            if view.has_name(name) {
                return Err(InconsistencyError::RegisteredNameExists((*name).clone()));
            }
            if updates.contains_key(name) {
                return Err(InconsistencyError::RegistrationAndUpdates((*name).clone()));
            }
        }
        for (name, _) in self.names.registrations() {
            if !registrations.contains_key(name) {
                return Err(InconsistencyError::RegistrationMismatch(name.clone()));
            }
        }

        // Updates: same sets, confirmed names only, one linear chain each.
        for (name, txids) in &updates {
            if self.names.updates(name) != Some(txids) {
                return Err(InconsistencyError::UpdateMismatch((*name).clone()));
            }
            if !view.has_name(name) {
                return Err(InconsistencyError::UpdatedNameMissing((*name).clone()));
            }
            self.check_linear_chain(name, txids)?;
        }
        for (name, _) in self.names.all_updates() {
            if !updates.contains_key(name) {
                return Err(InconsistencyError::UpdateMismatch(name.clone()));
            }
        }

        self.check_spend_index()
    }

    /// The updates of `name` must form a path: a single head, a single tail and
    /// one spend link between consecutive operations.
    fn check_linear_chain(
        &self,
        name: &Name,
        txids: &BTreeSet<Txid>,
    ) -> Result<(), InconsistencyError> {
        let mut links: BTreeSet<(Txid, Txid)> = BTreeSet::new();

        for txid in txids {
            let Some(entry) = self.arena.entry_by_txid(txid) else {
                return Err(InconsistencyError::UpdateMismatch(name.clone()));
            };
            for input in &entry.tx.input {
                let parent = input.previous_output.txid;
                if parent != *txid && txids.contains(&parent) {
                    links.insert((parent, *txid));
                }
            }
        }

        let spending: BTreeSet<Txid> = links.iter().map(|(_, child)| *child).collect();
        let spent: BTreeSet<Txid> = links.iter().map(|(parent, _)| *parent).collect();

        let heads = txids.len() - spending.len();
        let tails = txids.len() - spent.len();

        if heads != 1 || tails != 1 || links.len() + 1 != txids.len() {
            return Err(InconsistencyError::NonLinearChain {
                name: name.clone(),
                heads,
            });
        }

        Ok(())
    }

    fn check_spend_index(&self) -> Result<(), InconsistencyError> {
        let mut spends = 0;

        for (_, entry) in self.arena.iter() {
            for input in &entry.tx.input {
                let outpoint: OutPoint = input.previous_output;
                if !self.spenders(outpoint).any(|spender| spender == entry.txid) {
                    return Err(InconsistencyError::SpendIndexMismatch(outpoint));
                }
            }
            spends += entry
                .tx
                .input
                .iter()
                .map(|input| input.previous_output)
                .collect::<BTreeSet<_>>()
                .len();
        }

        let indexed: usize = self.map_next_tx.values().map(|spenders| spenders.len()).sum();
        if indexed != spends {
            let outpoint = self
                .map_next_tx
                .iter()
                .find(|(_, spenders)| {
                    spenders
                        .iter()
                        .any(|spender| !self.contains_txid(spender))
                })
                .map(|(outpoint, _)| *outpoint)
                .unwrap_or_else(OutPoint::null);
            return Err(InconsistencyError::SpendIndexMismatch(outpoint));
        }

        Ok(())
    }
}

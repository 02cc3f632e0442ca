//! Resolution of the terminal output of a name's pending chain.

use crate::LOG_TARGET;
use crate::arena::TxMemPoolEntry;
use crate::inner::MemPoolInner;
use bitcoin::{OutPoint, Txid};
use nameforge_primitives::Name;
use std::collections::HashSet;

impl MemPoolInner {
    /// Output a new update of `name` has to spend.
    ///
    /// Walks the pending chain of `name` from its head to the last pooled
    /// operation and returns that operation's name output. `None` if the pool
    /// has no operation on `name`, the confirmed record is authoritative then.
    pub fn last_name_output(&self, name: &Name) -> Option<OutPoint> {
        let head = self.chain_head(name)?;
        let mut current = self.arena.entry_by_txid(&head)?;

        let mut visited = HashSet::from([current.txid]);

        while let Some(next) = self.chain_successor(current, name) {
            if !visited.insert(next.txid) {
                tracing::warn!(
                    target: LOG_TARGET,
                    %name,
                    txid = %next.txid,
                    "Pending chain revisits a transaction",
                );
                break;
            }
            current = next;
        }

        current.name_outpoint()
    }

    /// First transaction of the pending chain of `name`.
    ///
    /// The pending registration if there is one, otherwise the pending update
    /// that spends no other pending update of the same name.
    pub(crate) fn chain_head(&self, name: &Name) -> Option<Txid> {
        if let Some(registration) = self.names.registration(name) {
            return Some(registration);
        }

        let updates = self.names.updates(name)?;

        // Updates are ordered by txid, the first head wins ties.
        updates
            .iter()
            .copied()
            .find(|txid| {
                self.arena.entry_by_txid(txid).is_some_and(|entry| {
                    entry
                        .tx
                        .input
                        .iter()
                        .all(|input| !updates.contains(&input.previous_output.txid))
                })
            })
            .or_else(|| updates.first().copied())
    }

    /// Next operation on `name` after `current`.
    ///
    /// Prefers a same-name spender of the exact name output, falling back to a
    /// same-name spender of any other output of `current`. Ties are broken by
    /// lowest txid.
    fn chain_successor(&self, current: &TxMemPoolEntry, name: &Name) -> Option<&TxMemPoolEntry> {
        let name_outpoint = current.name_outpoint()?;

        let mut other_spenders = false;
        for spender in self.spenders(name_outpoint) {
            let Some(entry) = self.arena.entry_by_txid(&spender) else {
                continue;
            };
            if entry.touches_name(name) {
                return Some(entry);
            }
            other_spenders = true;
        }

        if other_spenders {
            tracing::warn!(
                target: LOG_TARGET,
                %name,
                outpoint = %name_outpoint,
                "Name output spent by a transaction without a matching name operation",
            );
        }

        (0..current.tx.output.len() as u32)
            .filter(|vout| *vout != name_outpoint.vout)
            .flat_map(|vout| self.spenders(OutPoint::new(current.txid, vout)).collect::<Vec<_>>())
            .filter_map(|spender| self.arena.entry_by_txid(&spender))
            .filter(|entry| entry.touches_name(name))
            .min_by_key(|entry| entry.txid)
    }
}

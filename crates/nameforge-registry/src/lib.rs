//! Confirmed name registry.
//!
//! The registry holds the state of every name at the best chain tip and is only
//! ever mutated by connecting and disconnecting blocks. Readers access it through
//! [`NameView`]; writers are expected to guard it with the ledger lock, which is
//! always acquired before the pool lock.

mod error;
mod undo;

pub use self::error::RegistryError;
pub use self::undo::NameUndo;

use bitcoin::{Transaction, Txid};
use nameforge_primitives::{Name, NameOpKind, NameRecord, NameView};
use nameforge_script::{ClassifiedNameOp, classify};
use std::collections::HashMap;

const LOG_TARGET: &str = "names::registry";

/// In-memory name registry.
#[derive(Debug, Default, Clone)]
pub struct NameRegistry {
    names: HashMap<Name, NameRecord>,
}

impl NameRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a record directly, bypassing block connection.
    pub fn insert(&mut self, record: NameRecord) -> Option<NameRecord> {
        self.names.insert(record.name.clone(), record)
    }

    /// Returns the number of registered names.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Iterates over all confirmed records in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = &NameRecord> {
        self.names.values()
    }

    /// Applies the name operations of the block at `height`.
    ///
    /// Either every name operation of the block is applied or, on error, none
    /// of them.
    pub fn connect_block(
        &mut self,
        height: u32,
        txs: &[Transaction],
    ) -> Result<NameUndo, RegistryError> {
        let mut undo = NameUndo::new(height);

        for tx in txs {
            let Some(classified) = classify(tx) else {
                continue;
            };

            if let Err(err) = self.apply(height, tx.compute_txid(), classified, &mut undo) {
                self.restore(&undo);
                return Err(err);
            }
        }

        tracing::debug!(
            target: LOG_TARGET,
            height,
            name_ops = undo.len(),
            "Connected block to name registry",
        );

        Ok(undo)
    }

    /// Reverts the name operations recorded in `undo`.
    ///
    /// Every name touched by the block must still be in the state the block
    /// left it in, otherwise nothing is changed.
    pub fn disconnect_block(&mut self, undo: &NameUndo) -> Result<(), RegistryError> {
        for (name, _) in &undo.previous {
            let current_height = self.names.get(name).map(|record| record.height);
            if current_height != Some(undo.height) {
                return Err(RegistryError::UndoMismatch {
                    height: undo.height,
                    name: name.clone(),
                });
            }
        }

        self.restore(undo);

        tracing::debug!(
            target: LOG_TARGET,
            height = undo.height,
            name_ops = undo.len(),
            "Disconnected block from name registry",
        );

        Ok(())
    }

    fn apply(
        &mut self,
        height: u32,
        txid: Txid,
        classified: ClassifiedNameOp,
        undo: &mut NameUndo,
    ) -> Result<(), RegistryError> {
        let outpoint = classified.outpoint(txid);
        let ClassifiedNameOp { op, address, .. } = classified;

        let previous = self.names.get(&op.name).cloned();

        match (op.kind, previous.is_some()) {
            (NameOpKind::Registration, true) => {
                return Err(RegistryError::NameExists {
                    name: op.name,
                    txid,
                });
            }
            (NameOpKind::Update, false) => {
                return Err(RegistryError::UpdateOfUnknownName {
                    name: op.name,
                    txid,
                });
            }
            _ => {}
        }

        tracing::trace!(
            target: LOG_TARGET,
            name = %op.name,
            kind = %op.kind,
            %txid,
            height,
            "Applying name operation",
        );

        undo.record(op.name.clone(), previous);

        self.names.insert(
            op.name.clone(),
            NameRecord {
                name: op.name,
                value: op.value,
                outpoint,
                address,
                height,
            },
        );

        Ok(())
    }

    fn restore(&mut self, undo: &NameUndo) {
        for (name, previous) in undo.previous.iter().rev() {
            match previous {
                Some(record) => {
                    self.names.insert(name.clone(), record.clone());
                }
                None => {
                    self.names.remove(name);
                }
            }
        }
    }
}

impl NameView for NameRegistry {
    fn get_name(&self, name: &Name) -> Option<NameRecord> {
        self.names.get(name).cloned()
    }

    fn has_name(&self, name: &Name) -> bool {
        self.names.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::hashes::Hash;
    use bitcoin::opcodes::OP_TRUE;
    use bitcoin::script::Builder;
    use bitcoin::{Amount, OutPoint, ScriptBuf, TxIn, TxOut, absolute, transaction};
    use nameforge_script::NameScript;

    fn address() -> ScriptBuf {
        Builder::new().push_opcode(OP_TRUE).into_script()
    }

    fn name_tx(seed: u32, script: ScriptBuf) -> Transaction {
        Transaction {
            version: transaction::Version::TWO,
            lock_time: absolute::LockTime::ZERO,
            input: vec![TxIn {
                previous_output: OutPoint::new(Txid::all_zeros(), seed),
                ..Default::default()
            }],
            output: vec![TxOut {
                value: Amount::from_sat(1_000),
                script_pubkey: script,
            }],
        }
    }

    fn register(seed: u32, name: &str, value: &str) -> Transaction {
        let script =
            NameScript::build_register(&address(), &Name::from(name), value.as_bytes()).unwrap();
        name_tx(seed, script)
    }

    fn update(seed: u32, name: &str, value: &str) -> Transaction {
        let script =
            NameScript::build_update(&address(), &Name::from(name), value.as_bytes()).unwrap();
        name_tx(seed, script)
    }

    #[test]
    fn test_connect_and_disconnect() {
        let mut registry = NameRegistry::new();
        let foo = Name::from("foo");

        let reg = register(0, "foo", "a");
        let undo1 = registry.connect_block(1, &[reg.clone()]).unwrap();
        assert_eq!(undo1.len(), 1);

        let record = registry.get_name(&foo).unwrap();
        assert_eq!(record.value, b"a".to_vec());
        assert_eq!(record.height, 1);
        assert_eq!(record.outpoint, OutPoint::new(reg.compute_txid(), 0));

        let upd = update(1, "foo", "b");
        let undo2 = registry.connect_block(2, &[upd.clone()]).unwrap();
        let record = registry.get_name(&foo).unwrap();
        assert_eq!(record.value, b"b".to_vec());
        assert_eq!(record.height, 2);
        assert_eq!(record.outpoint, OutPoint::new(upd.compute_txid(), 0));

        registry.disconnect_block(&undo2).unwrap();
        assert_eq!(registry.get_name(&foo).unwrap().value, b"a".to_vec());

        registry.disconnect_block(&undo1).unwrap();
        assert!(!registry.has_name(&foo));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_block_without_name_ops() {
        let mut registry = NameRegistry::new();
        let plain = name_tx(0, address());
        let undo = registry.connect_block(5, &[plain]).unwrap();
        assert!(undo.is_empty());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_failed_block_is_not_applied() {
        let mut registry = NameRegistry::new();
        registry.connect_block(1, &[register(0, "foo", "a")]).unwrap();

        // The first registration would succeed, the second clashes with `foo`.
        let err = registry
            .connect_block(2, &[register(1, "bar", "x"), register(2, "foo", "y")])
            .unwrap_err();
        assert!(matches!(err, RegistryError::NameExists { .. }));
        assert!(!registry.has_name(&Name::from("bar")));
        assert_eq!(
            registry.get_name(&Name::from("foo")).unwrap().value,
            b"a".to_vec()
        );

        let err = registry
            .connect_block(2, &[update(3, "baz", "z")])
            .unwrap_err();
        assert!(matches!(err, RegistryError::UpdateOfUnknownName { .. }));
    }

    #[test]
    fn test_name_touched_twice_in_one_block() {
        let mut registry = NameRegistry::new();
        let undo = registry
            .connect_block(1, &[register(0, "foo", "a"), update(1, "foo", "b")])
            .unwrap();
        assert_eq!(undo.len(), 2);
        assert_eq!(
            registry.get_name(&Name::from("foo")).unwrap().value,
            b"b".to_vec()
        );

        registry.disconnect_block(&undo).unwrap();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_disconnect_mismatch() {
        let mut registry = NameRegistry::new();
        let undo1 = registry.connect_block(1, &[register(0, "foo", "a")]).unwrap();
        registry.connect_block(2, &[update(1, "foo", "b")]).unwrap();

        // Block 2 has not been disconnected yet.
        let err = registry.disconnect_block(&undo1).unwrap_err();
        assert!(matches!(err, RegistryError::UndoMismatch { height: 1, .. }));
        assert_eq!(
            registry.get_name(&Name::from("foo")).unwrap().value,
            b"b".to_vec()
        );
    }

    #[test]
    fn test_undo_serialization() {
        let mut registry = NameRegistry::new();
        let undo = registry.connect_block(7, &[register(0, "foo", "a")]).unwrap();

        let json = serde_json::to_string(&undo).unwrap();
        let decoded: NameUndo = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, undo);
    }
}

//! Scenario tests for the name mempool.

use bitcoin::hashes::Hash;
use bitcoin::opcodes::OP_TRUE;
use bitcoin::opcodes::all::OP_RETURN;
use bitcoin::script::Builder;
use bitcoin::{Amount, OutPoint, ScriptBuf, Transaction, TxIn, TxOut, Txid, absolute, transaction};
use nameforge_primitives::{Name, NameRecord};
use nameforge_registry::NameRegistry;
use nameforge_script::NameScript;

use crate::MemPool;

mod chain_tests;

/// Owner script used throughout the tests.
pub fn addr() -> ScriptBuf {
    Builder::new().push_opcode(OP_TRUE).into_script()
}

/// A second, distinct owner script.
pub fn other_addr() -> ScriptBuf {
    Builder::new()
        .push_opcode(OP_TRUE)
        .push_opcode(OP_RETURN)
        .into_script()
}

pub fn register_script(address: &ScriptBuf, name: &str, value: &str) -> ScriptBuf {
    NameScript::build_register(address, &Name::from(name), value.as_bytes()).unwrap()
}

pub fn update_script(address: &ScriptBuf, name: &str, value: &str) -> ScriptBuf {
    NameScript::build_update(address, &Name::from(name), value.as_bytes()).unwrap()
}

/// Confirmed coin not spent by anything in the pool.
pub fn funding(n: u32) -> OutPoint {
    OutPoint::new(Txid::from_byte_array([0xaa; 32]), n)
}

/// Fluent transaction builder for tests.
pub struct TxBuilder {
    inputs: Vec<TxIn>,
    outputs: Vec<TxOut>,
}

impl TxBuilder {
    pub fn new() -> Self {
        Self {
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    pub fn input(mut self, outpoint: OutPoint) -> Self {
        self.inputs.push(TxIn {
            previous_output: outpoint,
            ..Default::default()
        });
        self
    }

    pub fn output(mut self, script_pubkey: ScriptBuf) -> Self {
        self.outputs.push(TxOut {
            value: Amount::from_sat(100_000),
            script_pubkey,
        });
        self
    }

    pub fn name_register(self, name: &str, value: &str) -> Self {
        self.output(register_script(&addr(), name, value))
    }

    pub fn name_update(self, name: &str, value: &str) -> Self {
        self.output(update_script(&addr(), name, value))
    }

    pub fn build(self) -> Transaction {
        Transaction {
            version: transaction::Version::TWO,
            lock_time: absolute::LockTime::ZERO,
            input: self.inputs,
            output: self.outputs,
        }
    }
}

impl Default for TxBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Registration of `name` funded by `funding(seed)`, name output at index 0.
pub fn register_tx(seed: u32, name: &str, value: &str) -> Transaction {
    TxBuilder::new()
        .input(funding(seed))
        .name_register(name, value)
        .build()
}

/// Update of `name` spending `prev`, name output at index 0.
pub fn update_tx(prev: OutPoint, name: &str, value: &str) -> Transaction {
    TxBuilder::new()
        .input(prev)
        .name_update(name, value)
        .build()
}

/// Plain transaction spending `prev` with a single output.
pub fn spend_tx(prev: OutPoint) -> Transaction {
    TxBuilder::new().input(prev).output(addr()).build()
}

/// Registry holding `name` at `outpoint`.
pub fn registry_with(names: &[(&str, OutPoint)]) -> NameRegistry {
    let mut registry = NameRegistry::new();
    for (name, outpoint) in names {
        registry.insert(NameRecord {
            name: Name::from(*name),
            value: b"confirmed".to_vec(),
            outpoint: *outpoint,
            address: addr(),
            height: 100,
        });
    }
    registry
}

/// Install a log subscriber honouring `RUST_LOG`, once per test binary.
pub fn init_logger() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Helper: Assert transaction is in mempool.
pub fn assert_in_mempool(mempool: &MemPool, txid: &Txid) {
    assert!(
        mempool.inner.read().arena.get_by_txid(txid).is_some(),
        "Expected transaction {txid} to be in mempool"
    );
}

/// Helper: Assert transaction is NOT in mempool.
pub fn assert_not_in_mempool(mempool: &MemPool, txid: &Txid) {
    assert!(
        mempool.inner.read().arena.get_by_txid(txid).is_none(),
        "Expected transaction {txid} to NOT be in mempool"
    );
}

/// Helper: Assert mempool size.
pub fn assert_mempool_size(mempool: &MemPool, expected: usize) {
    let actual = mempool.size();
    assert_eq!(
        actual, expected,
        "Expected mempool size {expected}, got {actual}"
    );
}

//! Pending chain resolution and chain extension.

use super::*;
use crate::{MemPoolOptions, MempoolError, NameRejection, PrepareError, PreparedUpdate};
use nameforge_primitives::EmptyNameView;
use nameforge_primitives::name_pool::NamePool;

#[test]
fn test_last_name_output() {
    let mempool = MemPool::new();

    let tx_reg = register_tx(0, "reg", "x");
    let tx_upd = update_tx(funding(1), "upd", "y");
    mempool.add_unchecked(tx_reg.clone());
    mempool.add_unchecked(tx_upd.clone());

    // A real chain with matching inputs and outputs. The name moves from
    // chain1:0 to chain2:1, while chain3 continues from the currency output
    // chain2:0 and carries the name to chain3:1.
    let chain1 = TxBuilder::new()
        .input(funding(2))
        .name_register("chain", "x")
        .output(addr())
        .output(other_addr())
        .build();
    mempool.add_unchecked(chain1.clone());

    let chain2 = TxBuilder::new()
        .input(OutPoint::new(chain1.compute_txid(), 0))
        .output(addr())
        .name_update("chain", "y")
        .build();
    mempool.add_unchecked(chain2.clone());

    let chain3 = TxBuilder::new()
        .input(OutPoint::new(chain2.compute_txid(), 0))
        .input(OutPoint::new(chain1.compute_txid(), 1))
        .output(other_addr())
        .name_update("chain", "z")
        .build();
    mempool.add_unchecked(chain3.clone());

    let currency = TxBuilder::new()
        .input(OutPoint::new(chain1.compute_txid(), 2))
        .input(OutPoint::new(chain3.compute_txid(), 0))
        .build();
    mempool.add_unchecked(currency);

    assert_eq!(
        mempool.last_name_output(&Name::from("reg")),
        Some(OutPoint::new(tx_reg.compute_txid(), 0))
    );
    assert_eq!(
        mempool.last_name_output(&Name::from("upd")),
        Some(OutPoint::new(tx_upd.compute_txid(), 0))
    );
    assert_eq!(
        mempool.last_name_output(&Name::from("chain")),
        Some(OutPoint::new(chain3.compute_txid(), 1))
    );
    assert!(mempool.last_name_output(&Name::from("none")).is_none());
}

#[test]
fn test_chained_updates() {
    let confirmed = funding(7);
    let registry = registry_with(&[("chain", confirmed)]);
    let mempool = MemPool::new();

    let chain1 = update_tx(confirmed, "chain", "1");
    let chain2 = TxBuilder::new()
        .input(OutPoint::new(chain1.compute_txid(), 0))
        .output(addr())
        .name_update("chain", "2")
        .build();
    let chain3 = TxBuilder::new()
        .input(OutPoint::new(chain2.compute_txid(), 1))
        .name_update("chain", "3")
        .build();

    mempool.accept_transaction(chain1.clone(), &registry).unwrap();
    assert_eq!(
        mempool.last_name_output(&Name::from("chain")),
        Some(OutPoint::new(chain1.compute_txid(), 0))
    );

    mempool.accept_transaction(chain2.clone(), &registry).unwrap();
    mempool.accept_transaction(chain3.clone(), &registry).unwrap();

    let tip = OutPoint::new(chain3.compute_txid(), 0);
    assert_eq!(mempool.last_name_output(&Name::from("chain")), Some(tip));

    // An update not spending the tip would fork the chain.
    let fork = update_tx(funding(8), "chain", "fork");
    assert_eq!(
        mempool.check_name_admission(&fork, &registry),
        Err(NameRejection::ChainFork {
            name: Name::from("chain"),
            tip,
        })
    );
    assert!(matches!(
        mempool.accept_transaction(fork, &registry),
        Err(MempoolError::NameConflict(NameRejection::ChainFork { .. }))
    ));

    // Spending an earlier link of the chain is a plain double spend.
    let double_spend = update_tx(OutPoint::new(chain1.compute_txid(), 0), "chain", "ds");
    assert!(matches!(
        mempool.accept_transaction(double_spend, &registry),
        Err(MempoolError::TxConflict(txid)) if txid == chain2.compute_txid()
    ));

    let extension = update_tx(tip, "chain", "4");
    mempool.accept_transaction(extension, &registry).unwrap();
    assert_eq!(mempool.pending_updates(&Name::from("chain")).len(), 4);

    mempool.check_names(&registry);
}

#[test]
fn test_competing_spenders_tie_break() {
    let mempool = MemPool::new();

    let first = update_tx(funding(0), "foo", "1");
    let name_output = OutPoint::new(first.compute_txid(), 0);
    mempool.add_unchecked(first.clone());

    // A spender without a name operation is not part of the chain.
    mempool.add_unchecked(spend_tx(name_output));
    assert_eq!(mempool.last_name_output(&Name::from("foo")), Some(name_output));

    let a = update_tx(name_output, "foo", "a");
    let b = update_tx(name_output, "foo", "b");
    mempool.add_unchecked(a.clone());
    mempool.add_unchecked(b.clone());

    let lowest = std::cmp::min(a.compute_txid(), b.compute_txid());
    assert_eq!(
        mempool.last_name_output(&Name::from("foo")),
        Some(OutPoint::new(lowest, 0))
    );

    // The forked pool no longer passes the audit.
    let registry = registry_with(&[("foo", funding(0))]);
    assert!(mempool.audit(&registry).is_err());
}

#[test]
fn test_chain_head_without_registration() {
    let mempool = MemPool::new();

    // Added out of order, the second update arrives before the first one.
    let u1 = update_tx(funding(0), "foo", "1");
    let u2 = update_tx(OutPoint::new(u1.compute_txid(), 0), "foo", "2");
    mempool.add_unchecked(u2.clone());
    mempool.add_unchecked(u1.clone());

    assert_eq!(
        mempool.inner.read().chain_head(&Name::from("foo")),
        Some(u1.compute_txid())
    );
    assert_eq!(
        mempool.last_name_output(&Name::from("foo")),
        Some(OutPoint::new(u2.compute_txid(), 0))
    );

    let registry = registry_with(&[("foo", funding(0))]);
    mempool.check_names(&registry);
}

#[test]
fn test_prepare_register() {
    let mempool = MemPool::with_options(MemPoolOptions::builder().max_name_length(8).build());
    let registry = registry_with(&[("taken", funding(9))]);

    let script = mempool
        .prepare_register(&Name::from("fresh"), b"v", &addr(), &registry)
        .unwrap();
    assert_eq!(script, register_script(&addr(), "fresh", "v"));

    assert!(matches!(
        mempool.prepare_register(&Name::from("taken"), b"v", &addr(), &registry),
        Err(PrepareError::NameExists)
    ));
    assert!(matches!(
        mempool.prepare_register(&Name::from("much-too-long"), b"v", &addr(), &registry),
        Err(PrepareError::NameTooLong)
    ));
    assert!(matches!(
        mempool.prepare_register(&Name::from("v"), &[0u8; 4096], &addr(), &registry),
        Err(PrepareError::ValueTooLong)
    ));

    mempool
        .accept_transaction(register_tx(0, "fresh", "v"), &registry)
        .unwrap();
    let err = mempool
        .prepare_register(&Name::from("fresh"), b"w", &addr(), &registry)
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "there is already a pending registration for this name"
    );
}

#[test]
fn test_prepare_update() {
    let confirmed = funding(5);
    let registry = registry_with(&[("foo", confirmed)]);
    let mempool = MemPool::new();

    let prepared = mempool
        .prepare_update(&Name::from("foo"), b"1", &other_addr(), &registry)
        .unwrap();
    assert_eq!(
        prepared,
        PreparedUpdate {
            name_input: confirmed,
            name_script: update_script(&other_addr(), "foo", "1"),
        }
    );

    let update = TxBuilder::new()
        .input(prepared.name_input)
        .output(prepared.name_script)
        .build();
    let txid = mempool.accept_transaction(update, &registry).unwrap();

    // The follow-up extends the pending chain.
    let prepared = mempool
        .prepare_update(&Name::from("foo"), b"2", &addr(), &registry)
        .unwrap();
    assert_eq!(prepared.name_input, OutPoint::new(txid, 0));

    let err = mempool
        .prepare_update(&Name::from("bar"), b"1", &addr(), &EmptyNameView)
        .unwrap_err();
    assert_eq!(err.to_string(), "this name can not be updated");
}

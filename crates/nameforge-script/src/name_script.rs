use crate::ScriptError;
use bitcoin::opcodes::all::{OP_2DROP, OP_DROP, OP_PUSHNUM_1, OP_PUSHNUM_2};
use bitcoin::script::{Builder, Instruction, PushBytes};
use bitcoin::{OutPoint, Opcode, Script, ScriptBuf, Transaction, Txid};
use nameforge_primitives::{Name, NameOpKind, NameValue};

const LOG_TARGET: &str = "names::script";

/// Opcode introducing a name registration.
pub const OP_NAME_REGISTER: Opcode = OP_PUSHNUM_1;

/// Opcode introducing a name update.
pub const OP_NAME_UPDATE: Opcode = OP_PUSHNUM_2;

/// Name operation carried by a script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameOp {
    pub kind: NameOpKind,
    pub name: Name,
    pub value: NameValue,
}

/// Decoded name script: the operation prefix and the owner's script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameScript {
    pub op: NameOp,
    /// Script following the name prefix, i.e. the new owner of the name.
    pub address: ScriptBuf,
}

impl NameScript {
    /// Decodes `script`, returning `None` for anything that is not a name script.
    ///
    /// Malformed scripts (truncated pushes, wrong opcodes) are simply not name
    /// scripts.
    pub fn parse(script: &Script) -> Option<Self> {
        let mut instructions = script.instruction_indices();

        let kind = match instructions.next()?.ok()? {
            (_, Instruction::Op(op)) if op == OP_NAME_REGISTER => NameOpKind::Registration,
            (_, Instruction::Op(op)) if op == OP_NAME_UPDATE => NameOpKind::Update,
            _ => return None,
        };

        let name = match instructions.next()?.ok()? {
            (_, Instruction::PushBytes(bytes)) => Name::from(bytes.as_bytes()),
            _ => return None,
        };

        let value = match instructions.next()?.ok()? {
            (_, Instruction::PushBytes(bytes)) => bytes.as_bytes().to_vec(),
            _ => return None,
        };

        match instructions.next()?.ok()? {
            (_, Instruction::Op(op)) if op == OP_2DROP => {}
            _ => return None,
        }

        let address_start = match instructions.next()?.ok()? {
            (index, Instruction::Op(op)) if op == OP_DROP => index + 1,
            _ => return None,
        };

        Some(Self {
            op: NameOp { kind, name, value },
            address: ScriptBuf::from_bytes(script.as_bytes()[address_start..].to_vec()),
        })
    }

    /// Builds a script registering `name` with `value` to `address`.
    pub fn build_register(
        address: &Script,
        name: &Name,
        value: &[u8],
    ) -> Result<ScriptBuf, ScriptError> {
        build(OP_NAME_REGISTER, address, name, value)
    }

    /// Builds a script updating `name` to `value`, owned by `address` afterwards.
    pub fn build_update(
        address: &Script,
        name: &Name,
        value: &[u8],
    ) -> Result<ScriptBuf, ScriptError> {
        build(OP_NAME_UPDATE, address, name, value)
    }
}

fn build(
    opcode: Opcode,
    address: &Script,
    name: &Name,
    value: &[u8],
) -> Result<ScriptBuf, ScriptError> {
    let name_push = <&PushBytes>::try_from(name.as_bytes())
        .map_err(|_| ScriptError::NameTooLarge(name.len()))?;
    let value_push =
        <&PushBytes>::try_from(value).map_err(|_| ScriptError::ValueTooLarge(value.len()))?;

    let mut bytes = Builder::new()
        .push_opcode(opcode)
        .push_slice(name_push)
        .push_slice(value_push)
        .push_opcode(OP_2DROP)
        .push_opcode(OP_DROP)
        .into_script()
        .into_bytes();
    bytes.extend_from_slice(address.as_bytes());

    Ok(ScriptBuf::from_bytes(bytes))
}

/// Whether `script` carries a name operation.
pub fn is_name_script(script: &Script) -> bool {
    NameScript::parse(script).is_some()
}

/// Name operation of a transaction along with the output carrying it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedNameOp {
    pub op: NameOp,
    /// Owner script of the name output.
    pub address: ScriptBuf,
    /// Index of the name output.
    pub vout: u32,
    /// Further name outputs in the same transaction, which are ignored.
    pub ignored_outputs: usize,
}

impl ClassifiedNameOp {
    pub fn name(&self) -> &Name {
        &self.op.name
    }

    pub fn kind(&self) -> NameOpKind {
        self.op.kind
    }

    pub fn is_registration(&self) -> bool {
        self.op.kind == NameOpKind::Registration
    }

    pub fn is_update(&self) -> bool {
        self.op.kind == NameOpKind::Update
    }

    /// Outpoint of the name output within the transaction `txid`.
    pub fn outpoint(&self, txid: Txid) -> OutPoint {
        OutPoint::new(txid, self.vout)
    }
}

/// Finds the name operation of `tx`.
///
/// The first output carrying a name script wins. A transaction with several
/// name outputs is invalid under consensus; it is still classified by its
/// first one and the anomaly is logged and counted in
/// [`ClassifiedNameOp::ignored_outputs`].
pub fn classify(tx: &Transaction) -> Option<ClassifiedNameOp> {
    let mut found: Option<ClassifiedNameOp> = None;

    for (vout, output) in tx.output.iter().enumerate() {
        let Some(script) = NameScript::parse(&output.script_pubkey) else {
            continue;
        };

        match found.as_mut() {
            Some(first) => first.ignored_outputs += 1,
            None => {
                found = Some(ClassifiedNameOp {
                    op: script.op,
                    address: script.address,
                    vout: vout as u32,
                    ignored_outputs: 0,
                });
            }
        }
    }

    if let Some(first) = &found {
        if first.ignored_outputs > 0 {
            tracing::warn!(
                target: LOG_TARGET,
                txid = %tx.compute_txid(),
                name = %first.op.name,
                vout = first.vout,
                ignored = first.ignored_outputs,
                "Transaction carries multiple name outputs, using the first one",
            );
        }
    }

    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::hashes::Hash;
    use bitcoin::opcodes::OP_TRUE;
    use bitcoin::opcodes::all::OP_RETURN;
    use bitcoin::{Amount, TxIn, TxOut, absolute, transaction};

    fn address() -> ScriptBuf {
        Builder::new().push_opcode(OP_TRUE).into_script()
    }

    fn tx_with_outputs(scripts: Vec<ScriptBuf>) -> Transaction {
        Transaction {
            version: transaction::Version::TWO,
            lock_time: absolute::LockTime::ZERO,
            input: vec![TxIn {
                previous_output: OutPoint::new(Txid::all_zeros(), 0),
                ..Default::default()
            }],
            output: scripts
                .into_iter()
                .map(|script_pubkey| TxOut {
                    value: Amount::from_sat(1_000),
                    script_pubkey,
                })
                .collect(),
        }
    }

    #[test]
    fn test_parse_register_script() {
        let name = Name::from("d/foo");
        let script = NameScript::build_register(&address(), &name, b"value").unwrap();

        let parsed = NameScript::parse(&script).unwrap();
        assert_eq!(parsed.op.kind, NameOpKind::Registration);
        assert_eq!(parsed.op.name, name);
        assert_eq!(parsed.op.value, b"value".to_vec());
        assert_eq!(parsed.address, address());
    }

    #[test]
    fn test_parse_update_with_empty_value() {
        let name = Name::new(vec![0u8, 1, 2]);
        let owner = Builder::new()
            .push_opcode(OP_TRUE)
            .push_opcode(OP_RETURN)
            .into_script();
        let script = NameScript::build_update(&owner, &name, b"").unwrap();

        let parsed = NameScript::parse(&script).unwrap();
        assert_eq!(parsed.op.kind, NameOpKind::Update);
        assert_eq!(parsed.op.name, name);
        assert!(parsed.op.value.is_empty());
        assert_eq!(parsed.address, owner);
    }

    #[test]
    fn test_non_name_scripts() {
        assert!(!is_name_script(&address()));
        assert!(!is_name_script(Script::new()));

        // Registration opcode without arguments.
        let bare = Builder::new().push_opcode(OP_NAME_REGISTER).into_script();
        assert!(!is_name_script(&bare));

        // Missing OP_DROP.
        let truncated = Builder::new()
            .push_opcode(OP_NAME_UPDATE)
            .push_slice(b"foo")
            .push_slice(b"bar")
            .push_opcode(OP_2DROP)
            .into_script();
        assert!(!is_name_script(&truncated));

        // Push claiming more bytes than the script holds.
        let garbage = ScriptBuf::from_bytes(vec![OP_NAME_REGISTER.to_u8(), 0x4c, 0xff, 0x01]);
        assert!(!is_name_script(&garbage));

        // OP_3 is not a name operation.
        let other = ScriptBuf::from_bytes(vec![0x53, 0x01, b'a', 0x01, b'b', 0x6d, 0x75]);
        assert!(!is_name_script(&other));
    }

    #[test]
    fn test_classify_plain_transaction() {
        let tx = tx_with_outputs(vec![address(), address()]);
        assert!(classify(&tx).is_none());

        let empty = tx_with_outputs(vec![]);
        assert!(classify(&empty).is_none());
    }

    #[test]
    fn test_classify_finds_name_output() {
        let name = Name::from("foo");
        let script = NameScript::build_update(&address(), &name, b"x").unwrap();
        let tx = tx_with_outputs(vec![address(), script]);

        let classified = classify(&tx).unwrap();
        assert!(classified.is_update());
        assert_eq!(classified.name(), &name);
        assert_eq!(classified.vout, 1);
        assert_eq!(classified.ignored_outputs, 0);

        let txid = tx.compute_txid();
        assert_eq!(classified.outpoint(txid), OutPoint::new(txid, 1));
    }

    #[test]
    fn test_classify_multiple_name_outputs_first_wins() {
        let scripts = vec![
            NameScript::build_register(&address(), &Name::from("a"), b"").unwrap(),
            NameScript::build_update(&address(), &Name::from("b"), b"").unwrap(),
            NameScript::build_register(&address(), &Name::from("c"), b"").unwrap(),
            NameScript::build_update(&address(), &Name::from("d"), b"").unwrap(),
        ];
        let tx = tx_with_outputs(scripts);

        let classified = classify(&tx).unwrap();
        assert!(classified.is_registration());
        assert_eq!(classified.name(), &Name::from("a"));
        assert_eq!(classified.vout, 0);
        assert_eq!(classified.ignored_outputs, 3);
    }
}

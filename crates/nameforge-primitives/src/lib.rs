//! Primitives shared by the name pool, the script classifier and the registry.

pub mod name_pool;

use bitcoin::{OutPoint, ScriptBuf, Txid};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Registrable identifier.
///
/// Names are arbitrary, case-sensitive byte strings. Length limits are a
/// policy concern of the caller, not of this type.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Name(Vec<u8>);

impl Name {
    /// Create a name from raw bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for Name {
    fn from(s: &str) -> Self {
        Self(s.as_bytes().to_vec())
    }
}

impl From<&[u8]> for Name {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl From<Vec<u8>> for Name {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Name {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Borrow<[u8]> for Name {
    fn borrow(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Name {
    /// Printable ASCII names are shown verbatim, anything else as `0x`-prefixed hex.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match std::str::from_utf8(&self.0) {
            Ok(s) if s.chars().all(|c| c.is_ascii_graphic() || c == ' ') => f.write_str(s),
            _ => write!(f, "0x{}", hex::encode(&self.0)),
        }
    }
}

/// Value attached to a name.
pub type NameValue = Vec<u8>;

/// Kind of a name operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NameOpKind {
    /// Claims a name that is not registered.
    Registration,
    /// Changes the value and/or owner of a registered name.
    Update,
}

impl NameOpKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Registration => "name_register",
            Self::Update => "name_update",
        }
    }
}

impl fmt::Display for NameOpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Confirmed state of a name at the best chain tip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameRecord {
    /// The name itself.
    pub name: Name,
    /// Current value.
    pub value: NameValue,
    /// Output currently holding the name. The next update must spend it.
    pub outpoint: OutPoint,
    /// Owner script of the name output.
    pub address: ScriptBuf,
    /// Height of the block that last registered or updated the name.
    pub height: u32,
}

/// Read access to the confirmed name registry.
///
/// Implementations answer queries at the current best chain tip. The pool only
/// reads through this trait; the registry is mutated exclusively by block
/// connection and disconnection.
pub trait NameView {
    /// Returns the confirmed record of `name`, if it is registered.
    fn get_name(&self, name: &Name) -> Option<NameRecord>;

    /// Whether `name` is registered.
    fn has_name(&self, name: &Name) -> bool {
        self.get_name(name).is_some()
    }
}

impl NameView for HashMap<Name, NameRecord> {
    fn get_name(&self, name: &Name) -> Option<NameRecord> {
        self.get(name).cloned()
    }

    fn has_name(&self, name: &Name) -> bool {
        self.contains_key(name)
    }
}

impl NameView for BTreeMap<Name, NameRecord> {
    fn get_name(&self, name: &Name) -> Option<NameRecord> {
        self.get(name).cloned()
    }

    fn has_name(&self, name: &Name) -> bool {
        self.contains_key(name)
    }
}

/// Registry view without any registered name.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyNameView;

impl NameView for EmptyNameView {
    fn get_name(&self, _name: &Name) -> Option<NameRecord> {
        None
    }
}

/// Unconfirmed name operation as reported to wallets and RPC clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingNameOp {
    pub name: Name,
    pub value: NameValue,
    pub kind: NameOpKind,
    pub txid: Txid,
    pub vout: u32,
}

impl PendingNameOp {
    /// Output carrying the name operation.
    pub fn outpoint(&self) -> OutPoint {
        OutPoint::new(self.txid, self.vout)
    }
}

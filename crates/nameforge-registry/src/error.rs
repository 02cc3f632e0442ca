//! Error types for the confirmed name registry.

use bitcoin::Txid;
use nameforge_primitives::Name;

/// Errors raised while connecting or disconnecting blocks.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// An update refers to a name that is not registered.
    #[error("Update of unknown name {name} in transaction {txid}")]
    UpdateOfUnknownName { name: Name, txid: Txid },

    /// A registration claims a name that is already registered.
    #[error("Name {name} registered again by transaction {txid}")]
    NameExists { name: Name, txid: Txid },

    /// Undo data does not match the current registry state.
    #[error("Undo data for height {height} does not match the state of {name}")]
    UndoMismatch { height: u32, name: Name },
}

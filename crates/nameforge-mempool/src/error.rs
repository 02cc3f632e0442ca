//! Mempool error types.

use bitcoin::{OutPoint, Txid};
use nameforge_primitives::Name;
use nameforge_script::ScriptError;

/// Mempool-specific errors.
#[derive(Debug, thiserror::Error)]
pub enum MempoolError {
    #[error("Transaction already in mempool")]
    AlreadyInMempool,

    #[error("Coinbase transaction not allowed")]
    Coinbase,

    #[error("Transaction conflicts with mempool: {0}")]
    TxConflict(Txid),

    #[error("Name operation rejected: {0}")]
    NameConflict(#[from] NameRejection),

    #[error("Too many ancestors: {0}")]
    TooManyAncestors(usize),

    #[error("Too many descendants: {0}")]
    TooManyDescendants(usize),

    #[error("Mempool is full")]
    MempoolFull,
}

/// Reason a name operation may not enter the pool.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NameRejection {
    /// Registration of a name that is already confirmed.
    #[error("name {0} exists already")]
    NameExists(Name),

    /// Registration of a name another pooled transaction registers.
    #[error("there is already a pending registration for {0}")]
    PendingRegistration(Name),

    /// Update of a name that is not confirmed.
    #[error("name {0} does not exist")]
    NameNotFound(Name),

    /// Update not extending the pending chain of the name.
    #[error("update of {name} does not spend the pending chain tip {tip}")]
    ChainFork { name: Name, tip: OutPoint },
}

/// Divergence between the live name index and the pool contents.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InconsistencyError {
    #[error("Registration index differs from pool for {0}")]
    RegistrationMismatch(Name),

    #[error("Update index differs from pool for {0}")]
    UpdateMismatch(Name),

    #[error("Reverse index differs from pool for transaction {0}")]
    ReverseIndexMismatch(Txid),

    #[error("Name {0} has both a pending registration and pending updates")]
    RegistrationAndUpdates(Name),

    #[error("Pending registration of confirmed name {0}")]
    RegisteredNameExists(Name),

    #[error("Pending update of unknown name {0}")]
    UpdatedNameMissing(Name),

    #[error("Pending updates of {name} do not form a single chain ({heads} heads)")]
    NonLinearChain { name: Name, heads: usize },

    #[error("Spent outpoint index differs from pool at {0}")]
    SpendIndexMismatch(OutPoint),
}

/// Errors of the wallet-facing name operation helpers.
#[derive(Debug, thiserror::Error)]
pub enum PrepareError {
    #[error("the name is too long")]
    NameTooLong,

    #[error("the value is too long")]
    ValueTooLong,

    #[error("there is already a pending registration for this name")]
    PendingRegistration,

    #[error("this name exists already")]
    NameExists,

    #[error("this name can not be updated")]
    CannotUpdate,

    #[error(transparent)]
    Script(#[from] ScriptError),
}

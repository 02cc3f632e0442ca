//! Pre-checks and script construction for wallet-initiated name operations.

use crate::MemPool;
use crate::error::PrepareError;
use bitcoin::{OutPoint, Script, ScriptBuf};
use nameforge_primitives::{Name, NameView};
use nameforge_script::NameScript;

/// Inputs and outputs of a name update the wallet has to fund.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedUpdate {
    /// Output currently holding the name, to be spent by the update.
    pub name_input: OutPoint,
    /// Script of the new name output.
    pub name_script: ScriptBuf,
}

impl MemPool {
    /// Check that `name` can be registered and build the registration script.
    ///
    /// `view` has to be the registry at the best tip, read under the ledger lock.
    pub fn prepare_register(
        &self,
        name: &Name,
        value: &[u8],
        owner: &Script,
        view: &dyn NameView,
    ) -> Result<ScriptBuf, PrepareError> {
        self.check_name_limits(name, value)?;

        if self.inner.read().names.registers_name(name) {
            return Err(PrepareError::PendingRegistration);
        }

        if view.has_name(name) {
            return Err(PrepareError::NameExists);
        }

        Ok(NameScript::build_register(owner, name, value)?)
    }

    /// Check that `name` can be updated and determine the output to spend.
    ///
    /// The update extends the pending chain of `name` if there is one, and
    /// spends the confirmed name output otherwise.
    pub fn prepare_update(
        &self,
        name: &Name,
        value: &[u8],
        owner: &Script,
        view: &dyn NameView,
    ) -> Result<PreparedUpdate, PrepareError> {
        self.check_name_limits(name, value)?;

        let record = view.get_name(name).ok_or(PrepareError::CannotUpdate)?;

        let name_input = self
            .inner
            .read()
            .last_name_output(name)
            .unwrap_or(record.outpoint);

        Ok(PreparedUpdate {
            name_input,
            name_script: NameScript::build_update(owner, name, value)?,
        })
    }

    fn check_name_limits(&self, name: &Name, value: &[u8]) -> Result<(), PrepareError> {
        let limits = &self.options().name_limits;

        if name.len() > limits.max_name_length {
            return Err(PrepareError::NameTooLong);
        }

        if value.len() > limits.max_value_length {
            return Err(PrepareError::ValueTooLong);
        }

        Ok(())
    }
}

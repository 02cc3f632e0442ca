//! Pool admission policy for name operations.

use crate::error::NameRejection;
use crate::inner::MemPoolInner;
use bitcoin::Transaction;
use nameforge_primitives::{NameOpKind, NameView};
use nameforge_script::ClassifiedNameOp;

impl MemPoolInner {
    /// Decide whether the name operation of `tx` may enter the pool.
    ///
    /// This only reads the pool and `view`; the name index is updated once the
    /// transaction is committed.
    pub fn check_name_op(
        &self,
        tx: &Transaction,
        name_op: Option<&ClassifiedNameOp>,
        view: &dyn NameView,
    ) -> Result<(), NameRejection> {
        let Some(name_op) = name_op else {
            return Ok(());
        };

        let name = name_op.name();

        match name_op.kind() {
            NameOpKind::Registration => {
                if view.has_name(name) {
                    return Err(NameRejection::NameExists(name.clone()));
                }

                // First seen wins.
                if self.names.registers_name(name) {
                    return Err(NameRejection::PendingRegistration(name.clone()));
                }
            }
            NameOpKind::Update => {
                if !view.has_name(name) {
                    return Err(NameRejection::NameNotFound(name.clone()));
                }

                if self.names.updates_name(name) {
                    if let Some(tip) = self.last_name_output(name) {
                        let extends_chain = tx
                            .input
                            .iter()
                            .any(|input| input.previous_output == tip);
                        if !extends_chain {
                            return Err(NameRejection::ChainFork {
                                name: name.clone(),
                                tip,
                            });
                        }
                    }
                }
            }
        }

        Ok(())
    }
}

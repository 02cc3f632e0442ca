//! Name operation scripts.
//!
//! A name operation is carried by a transaction output whose script is prefixed
//! with the operation and its arguments, followed by the owner's script:
//!
//! ```text
//! OP_NAME_REGISTER <name> <value> OP_2DROP OP_DROP <address script>
//! OP_NAME_UPDATE   <name> <value> OP_2DROP OP_DROP <address script>
//! ```
//!
//! The prefix leaves the stack untouched, so the output is spent exactly like
//! the plain address script.

mod error;
mod name_script;

pub use self::error::ScriptError;
pub use self::name_script::{
    ClassifiedNameOp, NameOp, NameScript, OP_NAME_REGISTER, OP_NAME_UPDATE, classify,
    is_name_script,
};

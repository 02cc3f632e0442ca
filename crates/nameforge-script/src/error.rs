/// Errors raised while building name scripts.
#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    #[error("Name of {0} bytes does not fit into a script push")]
    NameTooLarge(usize),

    #[error("Value of {0} bytes does not fit into a script push")]
    ValueTooLarge(usize),
}

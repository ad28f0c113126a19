//! Error types for rule loading

use thiserror::Error;

/// Rule definition errors
///
/// Only structured rule definitions can fail; compact string atoms always
/// preprocess (malformed parts are skipped with a warning).
#[derive(Error, Debug)]
pub enum RuleError {
    #[error("Malformed rule definition: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Unsupported rule atom: {0}")]
    UnsupportedAtom(String),
}

pub type Result<T> = std::result::Result<T, RuleError>;

impl From<RuleError> for parley_core::Error {
    fn from(err: RuleError) -> Self {
        parley_core::Error::Rule(err.to_string())
    }
}

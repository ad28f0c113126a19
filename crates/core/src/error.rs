//! Error types shared across the workspace

use thiserror::Error;

/// Core error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Backend call timed out after {0}ms")]
    Timeout(u64),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Rule error: {0}")]
    Rule(String),
}

/// Result alias using the core error
pub type Result<T> = std::result::Result<T, Error>;

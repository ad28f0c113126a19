//! NLU backends and the backend registry
//!
//! Features:
//! - Pluggable backends keyed by a resolvable prefix (tenant, language)
//! - Bounded per-backend result cache with single-flight de-duplication
//! - HTTP model backend
//! - Local regex entity detectors
//! - Mock intent override for tests

pub mod backend;
pub mod cache;
pub mod cached;
pub mod detector;
pub mod registry;

pub use backend::HttpNluBackend;
pub use cache::BoundedCache;
pub use cached::CachedBackend;
pub use detector::EntityDetector;
pub use registry::{BackendHandle, BackendRegistry, MockIntent, PrefixResolver, TextFilter};

use thiserror::Error;

/// NLU errors
#[derive(Error, Debug)]
pub enum NluError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timeout after {0}ms")]
    Timeout(u64),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid entity pattern for {name}: {message}")]
    InvalidPattern { name: String, message: String },
}

impl From<reqwest::Error> for NluError {
    fn from(err: reqwest::Error) -> Self {
        NluError::Network(err.to_string())
    }
}

impl From<NluError> for parley_core::Error {
    fn from(err: NluError) -> Self {
        match err {
            NluError::Network(message) => parley_core::Error::Transport(message),
            NluError::InvalidResponse(message) => parley_core::Error::InvalidResponse(message),
            NluError::Timeout(ms) => parley_core::Error::Timeout(ms),
            NluError::Configuration(message) => parley_core::Error::Configuration(message),
            other @ NluError::InvalidPattern { .. } => {
                parley_core::Error::Configuration(other.to_string())
            }
        }
    }
}

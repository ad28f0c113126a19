//! Configuration management for the parley matching engine
//!
//! Supports loading configuration from:
//! - YAML/TOML/JSON files (`config/default.*`, `config/<env>.*`)
//! - Environment variables (`PARLEY__` prefix, `__` separator)
//! - Runtime overrides
//!
//! Every section falls back to defaults, so an empty configuration is valid
//! in development.

pub mod ai;
pub mod constants;
pub mod matching;
pub mod settings;

pub use ai::{AiConfig, BackendConfig};
pub use matching::MatchingConfig;
pub use settings::{
    load_settings, load_settings_from, ObservabilityConfig, RuntimeEnvironment, Settings,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Environment error: {0}")]
    Environment(String),
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        match err {
            config::ConfigError::NotFound(path) => ConfigError::FileNotFound(path),
            other => ConfigError::ParseError(other.to_string()),
        }
    }
}

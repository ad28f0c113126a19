//! Main settings module

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::constants::env;
use crate::{AiConfig, BackendConfig, ConfigError, MatchingConfig};

/// Runtime environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeEnvironment {
    /// Development mode - relaxed validation, warnings only
    #[default]
    Development,
    /// Staging mode - stricter validation
    Staging,
    /// Production mode - all validations enforced
    Production,
}

impl RuntimeEnvironment {
    /// Check if this is a production environment
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    /// Check if strict validation should be applied
    pub fn is_strict(&self) -> bool {
        matches!(self, Self::Production | Self::Staging)
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Runtime environment (development, staging, production)
    #[serde(default)]
    pub environment: RuntimeEnvironment,

    /// Scoring constants
    #[serde(default)]
    pub matching: MatchingConfig,

    /// Ai facade settings
    #[serde(default)]
    pub ai: AiConfig,

    /// Remote NLU models registered at startup
    #[serde(default)]
    pub backends: Vec<BackendConfig>,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Settings {
    /// Create default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.matching.validate()?;
        self.ai.validate()?;
        self.validate_backends()?;
        self.validate_observability()?;

        Ok(())
    }

    fn validate_backends(&self) -> Result<(), ConfigError> {
        let mut prefixes = HashSet::new();
        for (index, backend) in self.backends.iter().enumerate() {
            backend.validate(index)?;
            if !prefixes.insert(backend.prefix.as_str()) {
                return Err(ConfigError::InvalidValue {
                    field: format!("backends[{}].prefix", index),
                    message: format!("Duplicate prefix '{}'", backend.prefix),
                });
            }
        }

        if self.backends.is_empty() {
            if self.environment.is_strict() {
                return Err(ConfigError::MissingField("backends".to_string()));
            }
            tracing::warn!("No NLU backends configured, only pattern and entity rules can match");
        }

        Ok(())
    }

    fn validate_observability(&self) -> Result<(), ConfigError> {
        const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
        let level = self.observability.log_level.to_lowercase();
        if !LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "observability.log_level".to_string(),
                message: format!("Expected one of {:?}, got '{}'", LEVELS, level),
            });
        }
        Ok(())
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub log_json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: false,
        }
    }
}

/// Load settings from `config/default`, `config/<env>` and `PARLEY__*` variables
///
/// Priority: env vars > config/{env}.yaml > config/default.yaml > defaults
pub fn load_settings(env_name: Option<&str>) -> Result<Settings, ConfigError> {
    load_settings_from("config", env_name)
}

/// Load settings from an explicit configuration directory
pub fn load_settings_from(dir: &str, env_name: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    // Load default config
    builder = builder.add_source(File::with_name(&format!("{}/default", dir)).required(false));

    // Load environment-specific config
    if let Some(env_name) = env_name {
        builder = builder
            .add_source(File::with_name(&format!("{}/{}", dir, env_name)).required(false));
    }

    // Load from environment variables
    builder = builder.add_source(
        Environment::with_prefix(env::CONFIG_PREFIX)
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    let settings: Settings = config.try_deserialize()?;

    settings.validate()?;

    Ok(settings)
}

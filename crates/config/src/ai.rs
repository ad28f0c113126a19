//! Ai facade and backend configuration

use serde::{Deserialize, Serialize};

use crate::constants::ai;
use crate::ConfigError;

/// Facade settings: thresholds, caching and bookmarking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiConfig {
    /// Minimal winning score of a rule without its own override
    #[serde(default = "default_confidence")]
    pub confidence: f64,

    /// Cached backend results per backend
    #[serde(default = "default_cache_size")]
    pub cache_size: usize,

    /// Deadline of one backend call
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Defer global intents while the conversation expects other input
    #[serde(default = "default_true")]
    pub bookmarking_enabled: bool,

    /// Prefix used when the resolver does not pick another one
    #[serde(default = "default_prefix")]
    pub default_prefix: String,
}

fn default_confidence() -> f64 {
    ai::DEFAULT_CONFIDENCE
}

fn default_cache_size() -> usize {
    ai::DEFAULT_CACHE_SIZE
}

fn default_request_timeout_ms() -> u64 {
    ai::DEFAULT_REQUEST_TIMEOUT_MS
}

fn default_true() -> bool {
    true
}

fn default_prefix() -> String {
    ai::DEFAULT_PREFIX.to_string()
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            confidence: default_confidence(),
            cache_size: default_cache_size(),
            request_timeout_ms: default_request_timeout_ms(),
            bookmarking_enabled: default_true(),
            default_prefix: default_prefix(),
        }
    }
}

impl AiConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(ConfigError::InvalidValue {
                field: "ai.confidence".to_string(),
                message: format!("Must be between 0.0 and 1.0, got {}", self.confidence),
            });
        }

        if self.cache_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "ai.cache_size".to_string(),
                message: "Must be at least 1".to_string(),
            });
        }

        if self.request_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "ai.request_timeout_ms".to_string(),
                message: "Must be at least 1ms".to_string(),
            });
        }

        if self.default_prefix.trim().is_empty() {
            return Err(ConfigError::MissingField("ai.default_prefix".to_string()));
        }

        Ok(())
    }
}

/// Remote NLU model registered at startup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Registry prefix (tenant, language, ...)
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// Model identifier appended to the endpoint
    pub model: String,

    /// Base URL of the model service
    pub endpoint: String,

    /// HTTP timeout of one call
    #[serde(default = "default_request_timeout_ms")]
    pub timeout_ms: u64,

    /// Per-backend cache size (falls back to `ai.cache_size`)
    #[serde(default)]
    pub cache_size: Option<usize>,
}

impl BackendConfig {
    pub fn validate(&self, index: usize) -> Result<(), ConfigError> {
        let field = |name: &str| format!("backends[{}].{}", index, name);

        if self.prefix.trim().is_empty() {
            return Err(ConfigError::MissingField(field("prefix")));
        }

        if self.model.trim().is_empty() {
            return Err(ConfigError::MissingField(field("model")));
        }

        if !(self.endpoint.starts_with("http://") || self.endpoint.starts_with("https://")) {
            return Err(ConfigError::InvalidValue {
                field: field("endpoint"),
                message: format!("Must be an http(s) URL, got '{}'", self.endpoint),
            });
        }

        if self.timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: field("timeout_ms"),
                message: "Must be at least 1ms".to_string(),
            });
        }

        if self.cache_size == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: field("cache_size"),
                message: "Must be at least 1".to_string(),
            });
        }

        Ok(())
    }
}

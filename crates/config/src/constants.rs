//! Centralized constants for the matching engine
//!
//! Single source of truth for the scoring defaults. Every value here is the
//! default of a tunable field in [`crate::MatchingConfig`] or
//! [`crate::AiConfig`].

/// Scoring handicaps and gains
pub mod scoring {
    /// Penalty for an optional entity slot without an operator
    pub const OPTIONAL_HANDICAP: f64 = 0.002;

    /// Penalty for an optional entity slot that carries an operator
    pub const OPTIONAL_EQUALITY_HANDICAP: f64 = 0.001;

    /// Penalty per entity that is present but not requested (and vice versa)
    pub const REDUNDANT_ENTITY_HANDICAP: f64 = 0.02;

    /// Upper bound of the accumulated redundant-entity penalty
    pub const REDUNDANT_ENTITY_CLAMP: f64 = 0.1;

    /// Penalty for matching without an intent while the backend produced one
    pub const REDUNDANT_INTENT_HANDICAP: f64 = 0.02;

    /// Gain per additional corroborating signal
    pub const MULTI_MATCH_GAIN: f64 = 1.2;

    /// Score of an entity recovered from conversation state
    pub const STATE_ENTITY_SCORE: f64 = 1.0;

    /// Fixed reward of a matching literal pattern
    pub const REGEXP_SCORE: f64 = 1.02;

    /// Minimal score of a turn entity to be considered at all
    pub const ENTITY_SCORE_FLOOR: f64 = 0.79;

    /// Backend confidence floor
    pub const CONFIDENCE_FLOOR: f64 = 0.94;

    /// Steepness of the arctangent entity score remap
    pub const ENTITY_REMAP_STEEPNESS: f64 = 10.0;
}

/// Ai facade defaults
pub mod ai {
    /// Prefix used when no resolver overrides it
    pub const DEFAULT_PREFIX: &str = "default";

    /// Minimal winning score of a rule
    pub const DEFAULT_CONFIDENCE: f64 = super::scoring::CONFIDENCE_FLOOR;

    /// Maximal number of cached backend results per backend
    pub const DEFAULT_CACHE_SIZE: usize = 10;

    /// Deadline of a single backend call
    pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 3000;
}

/// Environment variable names
pub mod env {
    /// Prefix of configuration overrides (`PARLEY__AI__CACHE_SIZE=20`)
    pub const CONFIG_PREFIX: &str = "PARLEY";

    /// Selects the `config/<env>` settings layer
    pub const ENVIRONMENT: &str = "PARLEY_ENV";
}

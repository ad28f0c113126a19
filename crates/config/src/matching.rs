//! Scoring constants of the rule matcher

use serde::{Deserialize, Serialize};

use crate::constants::scoring;
use crate::ConfigError;

/// Tunable constants used by the entity matcher and rule scorer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchingConfig {
    /// Handicap of an optional slot without operator
    #[serde(default = "default_optional_handicap")]
    pub optional_handicap: f64,

    /// Handicap of an optional slot with an operator
    #[serde(default = "default_optional_equality_handicap")]
    pub optional_equality_handicap: f64,

    /// Handicap per redundant entity
    #[serde(default = "default_redundant_entity_handicap")]
    pub redundant_entity_handicap: f64,

    /// Clamp of the total redundant-entity handicap
    #[serde(default = "default_redundant_entity_clamp")]
    pub redundant_entity_clamp: f64,

    /// Handicap of a non-intent match while the backend produced intents
    #[serde(default = "default_redundant_intent_handicap")]
    pub redundant_intent_handicap: f64,

    /// Gain per corroborating signal
    #[serde(default = "default_multi_match_gain")]
    pub multi_match_gain: f64,

    /// Score of entities recovered from state
    #[serde(default = "default_state_entity_score")]
    pub state_entity_score: f64,

    /// Reward of a matching literal pattern
    #[serde(default = "default_regexp_score")]
    pub regexp_score: f64,

    /// Minimal score of a usable turn entity
    #[serde(default = "default_entity_score_floor")]
    pub entity_score_floor: f64,

    /// Backend confidence floor (remap center and coverage decay base)
    #[serde(default = "default_confidence_floor")]
    pub confidence_floor: f64,

    /// Steepness of the arctangent remap of intent-carried entity scores
    #[serde(default = "default_entity_remap_steepness")]
    pub entity_remap_steepness: f64,
}

fn default_optional_handicap() -> f64 {
    scoring::OPTIONAL_HANDICAP
}

fn default_optional_equality_handicap() -> f64 {
    scoring::OPTIONAL_EQUALITY_HANDICAP
}

fn default_redundant_entity_handicap() -> f64 {
    scoring::REDUNDANT_ENTITY_HANDICAP
}

fn default_redundant_entity_clamp() -> f64 {
    scoring::REDUNDANT_ENTITY_CLAMP
}

fn default_redundant_intent_handicap() -> f64 {
    scoring::REDUNDANT_INTENT_HANDICAP
}

fn default_multi_match_gain() -> f64 {
    scoring::MULTI_MATCH_GAIN
}

fn default_state_entity_score() -> f64 {
    scoring::STATE_ENTITY_SCORE
}

fn default_regexp_score() -> f64 {
    scoring::REGEXP_SCORE
}

fn default_entity_score_floor() -> f64 {
    scoring::ENTITY_SCORE_FLOOR
}

fn default_confidence_floor() -> f64 {
    scoring::CONFIDENCE_FLOOR
}

fn default_entity_remap_steepness() -> f64 {
    scoring::ENTITY_REMAP_STEEPNESS
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            optional_handicap: default_optional_handicap(),
            optional_equality_handicap: default_optional_equality_handicap(),
            redundant_entity_handicap: default_redundant_entity_handicap(),
            redundant_entity_clamp: default_redundant_entity_clamp(),
            redundant_intent_handicap: default_redundant_intent_handicap(),
            multi_match_gain: default_multi_match_gain(),
            state_entity_score: default_state_entity_score(),
            regexp_score: default_regexp_score(),
            entity_score_floor: default_entity_score_floor(),
            confidence_floor: default_confidence_floor(),
            entity_remap_steepness: default_entity_remap_steepness(),
        }
    }
}

impl MatchingConfig {
    /// Validate value ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        let unit_fields = [
            ("matching.optional_handicap", self.optional_handicap),
            (
                "matching.optional_equality_handicap",
                self.optional_equality_handicap,
            ),
            (
                "matching.redundant_entity_handicap",
                self.redundant_entity_handicap,
            ),
            ("matching.redundant_entity_clamp", self.redundant_entity_clamp),
            (
                "matching.redundant_intent_handicap",
                self.redundant_intent_handicap,
            ),
            ("matching.state_entity_score", self.state_entity_score),
            ("matching.entity_score_floor", self.entity_score_floor),
            ("matching.confidence_floor", self.confidence_floor),
        ];

        for (field, value) in unit_fields {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    message: format!("Must be between 0.0 and 1.0, got {}", value),
                });
            }
        }

        if self.multi_match_gain < 1.0 {
            return Err(ConfigError::InvalidValue {
                field: "matching.multi_match_gain".to_string(),
                message: format!("Must be at least 1.0, got {}", self.multi_match_gain),
            });
        }

        if self.regexp_score <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "matching.regexp_score".to_string(),
                message: format!("Must be positive, got {}", self.regexp_score),
            });
        }

        if self.entity_remap_steepness <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "matching.entity_remap_steepness".to_string(),
                message: format!("Must be positive, got {}", self.entity_remap_steepness),
            });
        }

        if self.redundant_entity_handicap > self.redundant_entity_clamp {
            tracing::warn!(
                "matching.redundant_entity_handicap ({}) exceeds its clamp ({}), \
                 a single redundant entity will hit the clamp",
                self.redundant_entity_handicap,
                self.redundant_entity_clamp
            );
        }

        Ok(())
    }
}

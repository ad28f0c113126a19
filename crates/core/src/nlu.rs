//! NLU data model
//!
//! Everything a backend produces for a single conversational turn: a ranked
//! list of intents, each optionally carrying its own entities, plus the
//! entities detected in the text as a whole.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Entity value as produced by a backend or recovered from state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityValue {
    Number(f64),
    Text(String),
}

impl EntityValue {
    /// Numeric view of the value, parsing text when possible
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => s.trim().parse::<f64>().ok(),
        }
    }

    /// True for an empty text value
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Text(s) if s.is_empty())
    }
}

impl fmt::Display for EntityValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{}", n),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for EntityValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for EntityValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<f64> for EntityValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for EntityValue {
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

fn default_score() -> f64 {
    1.0
}

/// Entity detected in a turn
///
/// `start`/`end` are character offsets into the turn text. When both are
/// present the engine uses them to measure how much of the text is explained
/// by the matched entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Entity name
    pub entity: String,
    /// Detected value
    pub value: EntityValue,
    /// Detection confidence (0.0 - 1.0)
    #[serde(default = "default_score")]
    pub score: f64,
    /// Start character offset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<usize>,
    /// End character offset (exclusive)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<usize>,
}

impl Entity {
    /// Create an entity without text offsets
    pub fn new(entity: impl Into<String>, value: impl Into<EntityValue>, score: f64) -> Self {
        Self {
            entity: entity.into(),
            value: value.into(),
            score,
            start: None,
            end: None,
        }
    }

    /// Attach character offsets
    pub fn with_span(mut self, start: usize, end: usize) -> Self {
        self.start = Some(start);
        self.end = Some(end);
        self
    }

    /// Length of the covered text, when offsets are known
    pub fn span_len(&self) -> Option<usize> {
        match (self.start, self.end) {
            (Some(start), Some(end)) if end >= start => Some(end - start),
            _ => None,
        }
    }

    /// Check whether two entities cover overlapping text
    pub fn overlaps(&self, start: usize, end: usize) -> bool {
        match (self.start, self.end) {
            (Some(s), Some(e)) => s < end && start < e,
            _ => false,
        }
    }
}

/// Intent candidate returned by a backend
///
/// `intent: None` is used for entity-only winners.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    /// Intent name
    pub intent: Option<String>,
    /// Confidence (0.0 - 1.0)
    pub score: f64,
    /// Entities attached to this intent by the backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entities: Option<Vec<Entity>>,
}

impl Intent {
    pub fn new(intent: impl Into<String>, score: f64) -> Self {
        Self {
            intent: Some(intent.into()),
            score,
            entities: None,
        }
    }

    /// Attach intent-level entities
    pub fn with_entities(mut self, entities: Vec<Entity>) -> Self {
        self.entities = Some(entities);
        self
    }

    /// Intent name, if any
    pub fn name(&self) -> Option<&str> {
        self.intent.as_deref()
    }
}

/// Complete backend answer for one text
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NluResult {
    /// Ranked intents, best first
    #[serde(default)]
    pub intents: Vec<Intent>,
    /// Entities detected in the text
    #[serde(default)]
    pub entities: Vec<Entity>,
}

impl NluResult {
    pub fn new(intents: Vec<Intent>, entities: Vec<Entity>) -> Self {
        Self { intents, entities }
    }

    /// Result with no intents and no entities
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.intents.is_empty() && self.entities.is_empty()
    }

    /// Best-ranked intent
    pub fn top_intent(&self) -> Option<&Intent> {
        self.intents.first()
    }
}

/// Per-request data a backend or prefix resolver may inspect
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestContext {
    /// Conversation/user identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<String>,
    /// Locale of the conversation (e.g. "en", "cs")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    /// Tenant / application identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant: Option<String>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sender(mut self, sender_id: impl Into<String>) -> Self {
        self.sender_id = Some(sender_id.into());
        self
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    pub fn with_tenant(mut self, tenant: impl Into<String>) -> Self {
        self.tenant = Some(tenant.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_value_untagged() {
        let entity: Entity =
            serde_json::from_str(r#"{"entity":"count","value":3,"score":0.9}"#).unwrap();
        assert_eq!(entity.value, EntityValue::Number(3.0));
        assert_eq!(entity.value.to_string(), "3");

        let entity: Entity = serde_json::from_str(r#"{"entity":"color","value":"red"}"#).unwrap();
        assert_eq!(entity.value, EntityValue::Text("red".to_string()));
        assert_eq!(entity.score, 1.0);
    }

    #[test]
    fn test_span_len() {
        let entity = Entity::new("date", "tomorrow", 0.9).with_span(4, 12);
        assert_eq!(entity.span_len(), Some(8));
        assert!(entity.overlaps(10, 14));
        assert!(!entity.overlaps(12, 14));
        assert_eq!(Entity::new("date", "x", 1.0).span_len(), None);
    }

    #[test]
    fn test_number_parsing() {
        assert_eq!(EntityValue::from(" 42 ").as_number(), Some(42.0));
        assert_eq!(EntityValue::from("abc").as_number(), None);
        assert_eq!(EntityValue::from(1.5).as_number(), Some(1.5));
    }
}

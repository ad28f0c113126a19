//! Deferred comparison values resolved against conversation state

use handlebars::Handlebars;
use once_cell::sync::Lazy;
use parley_core::{lookup_path, EntityValue, StateSnapshot};
use regex::Regex;
use serde_json::Value;

static STATE_PATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\$([\w-]+(?:\.[\w-]+)*)$").expect("valid state path regex"));

static TEMPLATES: Lazy<Handlebars<'static>> = Lazy::new(|| {
    let mut handlebars = Handlebars::new();
    handlebars.set_strict_mode(false);
    handlebars.register_escape_fn(handlebars::no_escape);
    handlebars
});

/// Comparison value of an entity expression
#[derive(Debug, Clone, PartialEq)]
pub enum Comparable {
    /// Known at preprocessing time
    Literal(EntityValue),
    /// `$path.in.state`
    StateLookup(String),
    /// Text containing `{{...}}` placeholders
    Template(String),
}

impl Comparable {
    /// Classify a raw comparison value from the rule text
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();

        if let Some(captures) = STATE_PATH.captures(raw) {
            return Self::StateLookup(captures[1].to_string());
        }

        if raw.contains("{{") && raw.contains("}}") {
            return Self::Template(raw.to_string());
        }

        Self::Literal(EntityValue::from(raw))
    }

    /// Classify a comparison value from a structured rule
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Number(n) => n.as_f64().map(|n| Self::Literal(EntityValue::Number(n))),
            Value::String(s) => Some(Self::parse(s)),
            Value::Bool(b) => Some(Self::Literal(EntityValue::from(b.to_string()))),
            other => Some(Self::Literal(EntityValue::from(other.to_string()))),
        }
    }

    /// Whether the value is only known at match time
    pub fn is_deferred(&self) -> bool {
        !matches!(self, Self::Literal(_))
    }

    /// Literal value, if known at preprocessing time
    pub fn as_literal(&self) -> Option<&EntityValue> {
        match self {
            Self::Literal(value) => Some(value),
            _ => None,
        }
    }

    /// Resolve against the state; missing values resolve to empty text
    pub fn resolve(&self, state: &StateSnapshot) -> EntityValue {
        match self {
            Self::Literal(value) => value.clone(),
            Self::StateLookup(path) => match lookup_path(state, path) {
                Some(Value::Number(n)) => n
                    .as_f64()
                    .map(EntityValue::Number)
                    .unwrap_or_else(|| EntityValue::from("")),
                Some(Value::String(s)) => EntityValue::from(s.as_str()),
                Some(Value::Null) | None => EntityValue::from(""),
                Some(other) => EntityValue::from(other.to_string()),
            },
            Self::Template(template) => match TEMPLATES.render_template(template, state) {
                Ok(rendered) => EntityValue::from(rendered),
                Err(err) => {
                    tracing::warn!(template = %template, "Failed to render comparison template: {}", err);
                    EntityValue::from("")
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn state() -> StateSnapshot {
        match json!({
            "limit": 5.0,
            "user": { "city": "Prague" },
        }) {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_parse_classifies_values() {
        assert_eq!(Comparable::parse("$limit"), Comparable::StateLookup("limit".into()));
        assert_eq!(
            Comparable::parse(" $user.city "),
            Comparable::StateLookup("user.city".into())
        );
        assert_eq!(
            Comparable::parse("{{user.city}}"),
            Comparable::Template("{{user.city}}".into())
        );
        assert_eq!(Comparable::parse("foo"), Comparable::Literal(EntityValue::from("foo")));
        assert!(!Comparable::parse("$ 12").is_deferred());
    }

    #[test]
    fn test_resolve_state_lookup() {
        let state = state();
        assert_eq!(
            Comparable::parse("$limit").resolve(&state),
            EntityValue::Number(5.0)
        );
        assert_eq!(
            Comparable::parse("$user.city").resolve(&state),
            EntityValue::from("Prague")
        );
        assert_eq!(Comparable::parse("$missing").resolve(&state), EntityValue::from(""));
    }

    #[test]
    fn test_resolve_template() {
        let state = state();
        assert_eq!(
            Comparable::parse("{{user.city}}").resolve(&state),
            EntityValue::from("Prague")
        );
        assert_eq!(
            Comparable::parse("city-{{user.zip}}").resolve(&state),
            EntityValue::from("city-")
        );
    }

    #[test]
    fn test_from_json() {
        assert_eq!(
            Comparable::from_json(&json!(3.5)),
            Some(Comparable::Literal(EntityValue::Number(3.5)))
        );
        assert_eq!(
            Comparable::from_json(&json!("$limit")),
            Some(Comparable::StateLookup("limit".into()))
        );
        assert_eq!(Comparable::from_json(&Value::Null), None);
    }
}

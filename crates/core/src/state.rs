//! Durable conversation state snapshot
//!
//! The engine reads the conversation state read-only. Context entities are
//! persisted by adjacent components under `@<entity>` keys, paired with a
//! `_~@<entity>` metadata key describing expiry.

use serde_json::{Map, Value};

use crate::nlu::EntityValue;

/// Immutable view of the conversation state for one turn
pub type StateSnapshot = Map<String, Value>;

/// Prefix of entity value keys
pub const ENTITY_STATE_PREFIX: &str = "@";

/// Prefix of entity metadata keys
pub const ENTITY_META_PREFIX: &str = "_~@";

/// State key holding the current value of an entity
pub fn entity_state_key(entity: &str) -> String {
    format!("{}{}", ENTITY_STATE_PREFIX, entity)
}

/// State key holding the expiry metadata of an entity
pub fn entity_meta_key(entity: &str) -> String {
    format!("{}{}", ENTITY_META_PREFIX, entity)
}

/// Look up a dotted path (`user.address.city`) in the snapshot
pub fn lookup_path<'a>(state: &'a StateSnapshot, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = state.get(first)?;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Convert a scalar JSON value into an entity value
///
/// Null, empty strings, arrays and objects have no entity representation.
pub fn scalar_value(value: &Value) -> Option<EntityValue> {
    match value {
        Value::String(s) if !s.is_empty() => Some(EntityValue::Text(s.clone())),
        Value::Number(n) => n.as_f64().map(EntityValue::Number),
        Value::Bool(b) => Some(EntityValue::Text(b.to_string())),
        _ => None,
    }
}

/// Value of a context entity persisted in state, if any
pub fn state_entity_value(state: &StateSnapshot, entity: &str) -> Option<EntityValue> {
    state.get(&entity_state_key(entity)).and_then(scalar_value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn snapshot(value: Value) -> StateSnapshot {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_entity_keys() {
        assert_eq!(entity_state_key("color"), "@color");
        assert_eq!(entity_meta_key("color"), "_~@color");
    }

    #[test]
    fn test_lookup_path() {
        let state = snapshot(json!({"user": {"city": "Prague", "tags": ["a", "b"]}}));
        assert_eq!(lookup_path(&state, "user.city"), Some(&json!("Prague")));
        assert_eq!(lookup_path(&state, "user.tags.1"), Some(&json!("b")));
        assert_eq!(lookup_path(&state, "user.zip"), None);
        assert_eq!(lookup_path(&state, "missing"), None);
    }

    #[test]
    fn test_state_entity_value() {
        let state = snapshot(json!({"@color": "red", "@size": 3, "@empty": "", "@none": null}));
        assert_eq!(
            state_entity_value(&state, "color"),
            Some(EntityValue::Text("red".to_string()))
        );
        assert_eq!(state_entity_value(&state, "size"), Some(EntityValue::Number(3.0)));
        assert_eq!(state_entity_value(&state, "empty"), None);
        assert_eq!(state_entity_value(&state, "none"), None);
        assert_eq!(state_entity_value(&state, "missing"), None);
    }
}

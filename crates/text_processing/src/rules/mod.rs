//! Rule preprocessing
//!
//! A rule is a list of atoms. Each atom is classified once, at load time:
//! - `#...` literal or regular expression patterns
//! - `@entity[?][op][value]` entity expressions
//! - anything else is an intent name
//!
//! Structured atoms (`{ "entity": ... }`, `{ "pattern": ... }`) are accepted
//! as well, so rules can be written in YAML without the compact grammar.

mod pattern;
mod template;

pub use pattern::{PatternRule, RegexpComparator};
pub use template::Comparable;

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use parley_core::EntityValue;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, RuleError};

static ENTITY_EXPRESSION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^@([^=><!?]+)(\?)?([!=><]{1,2})?([^=><!]+)?$")
        .expect("valid entity expression regex")
});

/// Comparison operator of an entity expression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compare {
    Eq,
    Ne,
    Range,
    Gt,
    Lt,
    Gte,
    Lte,
}

impl Compare {
    /// Map a compact operator (`>=`, `<>`, ...) to its comparison
    pub fn from_operator(operator: &str) -> Option<Self> {
        match operator {
            "=" | "==" => Some(Self::Eq),
            "!=" => Some(Self::Ne),
            "<>" | "><" => Some(Self::Range),
            ">" => Some(Self::Gt),
            ">=" | "=>" => Some(Self::Gte),
            "<" => Some(Self::Lt),
            "<=" | "=<" => Some(Self::Lte),
            _ => None,
        }
    }

    /// Ordering comparisons need comparable (numeric or date) operands
    pub fn is_ordering(&self) -> bool {
        matches!(self, Self::Range | Self::Gt | Self::Lt | Self::Gte | Self::Lte)
    }
}

/// Structured entity atom
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRule {
    pub entity: String,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub op: Option<Compare>,
    #[serde(default)]
    pub compare: Vec<Value>,
}

/// One atom of a rule as written by the bot author
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RuleAtom {
    Text(String),
    Entity(EntityRule),
    Pattern(PatternRule),
}

impl From<&str> for RuleAtom {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for RuleAtom {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

/// Entity requirement of a rule
#[derive(Debug, Clone, PartialEq)]
pub struct EntityExpression {
    /// Entity name without the `@`
    pub entity: String,
    /// Failing to satisfy the expression only costs a handicap
    pub optional: bool,
    /// `None` when neither an operator nor a value was given
    pub op: Option<Compare>,
    /// Comparison values; for ranges `[lower, upper]` where empty means unbounded
    pub compare: Vec<Comparable>,
}

impl EntityExpression {
    /// Parse a compact `@entity[?][op][value]` expression
    pub fn parse(expression: &str) -> Option<Self> {
        let captures = ENTITY_EXPRESSION.captures(expression.trim())?;

        let entity = captures.get(1)?.as_str().trim().to_string();
        if entity.is_empty() {
            return None;
        }
        let optional = captures.get(2).is_some();
        let operator = captures.get(3).map(|m| m.as_str());
        let value = captures.get(4).map(|m| m.as_str());

        let op = match (operator, value) {
            (Some(operator), _) => match Compare::from_operator(operator) {
                Some(op) => Some(op),
                None => {
                    tracing::warn!(
                        expression = %expression,
                        operator = %operator,
                        "Unknown entity operator, comparing for equality"
                    );
                    Some(Compare::Eq)
                }
            },
            (None, Some(_)) => Some(Compare::Eq),
            (None, None) => None,
        };

        let compare = match (op, value) {
            (_, None) | (None, _) => Vec::new(),
            (Some(Compare::Range), Some(value)) => {
                let mut sides = value.splitn(2, ',').map(Comparable::parse);
                let lower = sides.next().unwrap_or_else(|| Comparable::parse(""));
                let upper = sides.next().unwrap_or_else(|| Comparable::parse(""));
                vec![lower, upper]
            }
            (Some(Compare::Eq | Compare::Ne), Some(value)) => value
                .split(',')
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(Comparable::parse)
                .collect(),
            (Some(_), Some(value)) => vec![Comparable::parse(value)],
        };

        Some(Self {
            entity,
            optional,
            op,
            compare,
        })
    }

    /// Build from a structured entity atom
    pub fn from_rule(rule: &EntityRule) -> Option<Self> {
        let entity = rule.entity.trim().trim_start_matches('@').trim();
        if entity.is_empty() {
            return None;
        }

        let compare: Vec<Comparable> = rule.compare.iter().filter_map(Comparable::from_json).collect();
        let op = rule
            .op
            .or_else(|| (!compare.is_empty()).then_some(Compare::Eq));

        Some(Self {
            entity: entity.to_string(),
            optional: rule.optional,
            op,
            compare,
        })
    }

    /// Effective comparison
    pub fn compare_op(&self) -> Compare {
        self.op.unwrap_or(Compare::Eq)
    }

    /// `@entity!=` - the entity must not be present at all
    pub fn requires_absence(&self) -> bool {
        self.op == Some(Compare::Ne) && self.compare.is_empty()
    }

    /// Satisfied without any matching entity
    pub fn is_vacuously_optional(&self) -> bool {
        self.optional || self.requires_absence()
    }
}

/// Compiled form of a rule
#[derive(Debug, Clone, Default)]
pub struct PreprocessedRule {
    pub regexps: Vec<RegexpComparator>,
    pub intents: Vec<String>,
    pub entities: Vec<EntityExpression>,
}

impl PreprocessedRule {
    /// Rule with no atoms never matches
    pub fn is_empty(&self) -> bool {
        self.regexps.is_empty() && self.intents.is_empty() && self.entities.is_empty()
    }

    /// Every entity expression is satisfied without a matching entity
    pub fn entities_vacuously_optional(&self) -> bool {
        self.entities.iter().all(EntityExpression::is_vacuously_optional)
    }
}

/// Classify rule atoms into patterns, intents and entity expressions
///
/// Malformed atoms are skipped with a warning, never an error.
pub fn preprocess_rule<I, A>(atoms: I) -> PreprocessedRule
where
    I: IntoIterator<Item = A>,
    A: Into<RuleAtom>,
{
    let mut rule = PreprocessedRule::default();

    for atom in atoms {
        match atom.into() {
            RuleAtom::Text(text) => {
                let text = text.trim();
                if let Some(expression) = text.strip_prefix('#') {
                    rule.regexps.push(RegexpComparator::from_expression(expression));
                } else if text.starts_with('@') {
                    match EntityExpression::parse(text) {
                        Some(expression) => rule.entities.push(expression),
                        None => tracing::warn!(atom = %text, "Malformed entity expression skipped"),
                    }
                } else if !text.is_empty() && !rule.intents.iter().any(|i| i == text) {
                    rule.intents.push(text.to_string());
                }
            }
            RuleAtom::Entity(entity) => match EntityExpression::from_rule(&entity) {
                Some(expression) => rule.entities.push(expression),
                None => tracing::warn!(entity = %entity.entity, "Entity atom without a name skipped"),
            },
            RuleAtom::Pattern(pattern) => rule.regexps.push(RegexpComparator::from_rule(&pattern)),
        }
    }

    rule
}

/// Preprocess a rule given as a single atom or a list of atoms
///
/// Used for rules loaded from YAML/JSON route tables.
pub fn rule_from_value(value: Value) -> Result<PreprocessedRule> {
    let atoms: Vec<RuleAtom> = match value {
        Value::Array(items) => items
            .into_iter()
            .map(serde_json::from_value)
            .collect::<std::result::Result<_, _>>()?,
        Value::Null => Vec::new(),
        atom @ (Value::String(_) | Value::Object(_)) => vec![serde_json::from_value(atom)?],
        other => return Err(RuleError::UnsupportedAtom(other.to_string())),
    };
    Ok(preprocess_rule(atoms))
}

/// State change implied by a matched entity expression
#[derive(Debug, Clone, PartialEq)]
pub enum StateUpdate {
    /// Store this value under the entity
    Value(EntityValue),
    /// Store whatever entity value was matched
    Track,
}

/// State assignments for a rule when it becomes the target of a transition
///
/// `@entity=value` with a single literal sets the value, other positive
/// expressions track the matched entity, negations set nothing.
pub fn set_state_for_rule(entities: &[EntityExpression]) -> BTreeMap<String, StateUpdate> {
    entities
        .iter()
        .filter(|expression| expression.op != Some(Compare::Ne))
        .map(|expression| {
            let update = match (expression.op, expression.compare.as_slice()) {
                (Some(Compare::Eq), [single]) => single
                    .as_literal()
                    .map(|value| StateUpdate::Value(value.clone()))
                    .unwrap_or(StateUpdate::Track),
                _ => StateUpdate::Track,
            };
            (format!("@{}", expression.entity), update)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entity(expression: &str) -> EntityExpression {
        EntityExpression::parse(expression).expect("valid expression")
    }

    #[test]
    fn test_classifies_atoms() {
        let rule = preprocess_rule(["#hello|hi", "@city", "greeting", "greeting", ""]);
        assert_eq!(rule.regexps.len(), 1);
        assert_eq!(rule.entities.len(), 1);
        assert_eq!(rule.intents, vec!["greeting".to_string()]);
        assert!(!rule.is_empty());
        assert!(preprocess_rule(Vec::<RuleAtom>::new()).is_empty());
    }

    #[test]
    fn test_plain_entity() {
        let expression = entity("@city");
        assert_eq!(expression.entity, "city");
        assert!(!expression.optional);
        assert_eq!(expression.op, None);
        assert!(expression.compare.is_empty());
    }

    #[test]
    fn test_optional_with_values() {
        let expression = entity("@color?=red,blue");
        assert!(expression.optional);
        assert_eq!(expression.op, Some(Compare::Eq));
        assert_eq!(
            expression.compare,
            vec![
                Comparable::Literal(EntityValue::from("red")),
                Comparable::Literal(EntityValue::from("blue")),
            ]
        );
    }

    #[test]
    fn test_operators() {
        assert_eq!(entity("@n>5").op, Some(Compare::Gt));
        assert_eq!(entity("@n>=5").op, Some(Compare::Gte));
        assert_eq!(entity("@n=>5").op, Some(Compare::Gte));
        assert_eq!(entity("@n<5").op, Some(Compare::Lt));
        assert_eq!(entity("@n=<5").op, Some(Compare::Lte));
        assert_eq!(entity("@n==5").op, Some(Compare::Eq));
        assert_eq!(entity("@n!=5").op, Some(Compare::Ne));
        assert_eq!(entity("@n<>1,5").op, Some(Compare::Range));
        assert_eq!(entity("@n><1,5").op, Some(Compare::Range));
    }

    #[test]
    fn test_negation_without_value() {
        let expression = entity("@city!=");
        assert_eq!(expression.op, Some(Compare::Ne));
        assert!(expression.requires_absence());
        assert!(expression.is_vacuously_optional());
    }

    #[test]
    fn test_range_sides() {
        let expression = entity("@n<>,10");
        assert_eq!(
            expression.compare,
            vec![
                Comparable::Literal(EntityValue::from("")),
                Comparable::Literal(EntityValue::from("10")),
            ]
        );

        let expression = entity("@n<>3");
        assert_eq!(expression.compare.len(), 2);
    }

    #[test]
    fn test_deferred_values() {
        let expression = entity("@city=$user.city");
        assert_eq!(expression.compare, vec![Comparable::StateLookup("user.city".into())]);
    }

    #[test]
    fn test_malformed_entity_skipped() {
        let rule = preprocess_rule(["@a=b=c", "@", "intent"]);
        assert!(rule.entities.is_empty());
        assert_eq!(rule.intents, vec!["intent".to_string()]);
    }

    #[test]
    fn test_structured_atoms_from_yaml_like_json() {
        let atoms: Vec<RuleAtom> = serde_json::from_value(json!([
            "greeting",
            { "entity": "@count", "op": "gte", "compare": [2] },
            { "entity": "city", "optional": true },
            { "pattern": "^yes", "tokenized": false },
        ]))
        .unwrap();

        let rule = preprocess_rule(atoms);
        assert_eq!(rule.intents, vec!["greeting".to_string()]);
        assert_eq!(rule.entities.len(), 2);
        assert_eq!(rule.entities[0].entity, "count");
        assert_eq!(rule.entities[0].op, Some(Compare::Gte));
        assert_eq!(
            rule.entities[0].compare,
            vec![Comparable::Literal(EntityValue::Number(2.0))]
        );
        assert!(rule.entities[1].optional);
        assert_eq!(rule.regexps.len(), 1);
        assert!(!rule.regexps[0].uses_tokenized_text);
    }

    #[test]
    fn test_rule_from_value() {
        let rule = rule_from_value(json!("@city")).unwrap();
        assert_eq!(rule.entities.len(), 1);

        let rule = rule_from_value(json!(["greeting", { "pattern": "hi" }])).unwrap();
        assert_eq!(rule.intents.len(), 1);
        assert_eq!(rule.regexps.len(), 1);

        assert!(rule_from_value(json!(42)).is_err());
        assert!(rule_from_value(json!([{ "optional": true }])).is_err());
    }

    #[test]
    fn test_rule_atoms_from_yaml() {
        let yaml = r##"
- greeting
- "#hi|hello"
- entity: city
  optional: true
- "@count>=2"
"##;
        let atoms: Vec<RuleAtom> = serde_yaml::from_str(yaml).unwrap();
        let rule = preprocess_rule(atoms);

        assert_eq!(rule.intents, vec!["greeting".to_string()]);
        assert_eq!(rule.regexps.len(), 1);
        assert_eq!(rule.entities.len(), 2);
        assert!(rule.entities[0].optional);
        assert_eq!(rule.entities[1].op, Some(Compare::Gte));
    }

    #[test]
    fn test_vacuously_optional() {
        assert!(preprocess_rule(["@a?", "@b!="]).entities_vacuously_optional());
        assert!(!preprocess_rule(["@a?", "@b"]).entities_vacuously_optional());
        assert!(preprocess_rule(["intent"]).entities_vacuously_optional());
    }

    #[test]
    fn test_set_state_for_rule() {
        let rule = preprocess_rule(["@color=red", "@city", "@size=s,m", "@mood!=sad", "@x=$path"]);
        let updates = set_state_for_rule(&rule.entities);

        assert_eq!(
            updates.get("@color"),
            Some(&StateUpdate::Value(EntityValue::from("red")))
        );
        assert_eq!(updates.get("@city"), Some(&StateUpdate::Track));
        assert_eq!(updates.get("@size"), Some(&StateUpdate::Track));
        assert_eq!(updates.get("@x"), Some(&StateUpdate::Track));
        assert!(!updates.contains_key("@mood"));
    }
}

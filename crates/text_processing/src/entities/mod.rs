//! Entity matching
//!
//! Binds the entity expressions of a rule to entities detected in a turn (or
//! recovered from conversation state) and scores how well they fit. The
//! result feeds the rule scorer; it never decides a match on its own.

mod compare;

pub use compare::evaluate;

use parley_config::MatchingConfig;
use parley_core::{state_entity_value, Entity, EntityValue, StateSnapshot};

use crate::rules::{Compare, EntityExpression};

/// Remapping of entity confidences before they are aggregated
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScoreRemap {
    Identity,
    /// Arctangent curve re-centred around the backend confidence floor
    ///
    /// Scores above the floor are spread towards 1, scores below it are
    /// pushed down. The floor itself and 1.0 are fixed points.
    Arctan { floor: f64, steepness: f64 },
}

impl ScoreRemap {
    /// Arctangent remap configured from the matching constants
    pub fn arctan(config: &MatchingConfig) -> Self {
        Self::Arctan {
            floor: config.confidence_floor,
            steepness: config.entity_remap_steepness,
        }
    }

    pub fn apply(&self, score: f64) -> f64 {
        match *self {
            Self::Identity => score,
            Self::Arctan { floor, steepness } => {
                let span = ((1.0 - floor) * steepness).atan();
                if span == 0.0 {
                    return score.clamp(0.0, 1.0);
                }
                let remapped = floor + (1.0 - floor) * ((score - floor) * steepness).atan() / span;
                remapped.clamp(0.0, 1.0)
            }
        }
    }
}

/// Inputs of one entity matching pass
#[derive(Debug, Clone, Copy)]
pub struct EntityQuery<'a> {
    /// Character length of the turn text
    pub text_len: usize,
    /// Entity expressions of the rule, in order
    pub wanted: &'a [EntityExpression],
    /// Entities available for binding
    pub entities: &'a [Entity],
    /// Conversation state used for context entities and deferred values
    pub state: &'a StateSnapshot,
    pub remap: ScoreRemap,
    /// Every entity detected in the turn, for the redundancy penalty
    pub all_entities: &'a [Entity],
    /// Bind entities below the score floor (the redundancy penalty keeps
    /// applying the floor to `all_entities`)
    pub ignore_score_floor: bool,
}

/// Outcome of a successful entity matching pass
#[derive(Debug, Clone, PartialEq)]
pub struct EntityMatch {
    /// Average remapped score of the bound expressions (0 when nothing bound)
    pub score: f64,
    /// Accumulated handicap
    pub handicap: f64,
    /// Entities bound to the rule, in rule order
    pub matched: Vec<Entity>,
    /// Lowest remapped score among required bindings (`INFINITY` if none)
    pub min_score: f64,
    /// Bindings recovered from conversation state
    pub from_state: usize,
    /// Characters of the text covered by bound entities
    pub metl: usize,
}

enum Binding<'a> {
    Turn(usize, &'a Entity),
    State(Entity),
    /// Satisfied by absence
    Absent,
}

/// Entity matcher configured with the matching constants
#[derive(Debug, Clone)]
pub struct EntityMatcher {
    config: MatchingConfig,
}

impl EntityMatcher {
    pub fn new(config: MatchingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MatchingConfig {
        &self.config
    }

    /// Bind and score the wanted expressions
    ///
    /// Returns `None` when a required expression cannot be satisfied, or when
    /// an entity of the wanted name exists but fails the comparison.
    pub fn match_entities(&self, query: &EntityQuery<'_>) -> Option<EntityMatch> {
        let config = &self.config;
        let mut used = vec![false; query.entities.len()];

        let mut handicap = 0.0;
        let mut sum = 0.0;
        let mut bound = 0usize;
        let mut min_score = f64::INFINITY;
        let mut from_state = 0usize;
        let mut metl = 0usize;
        let mut matched = Vec::new();
        let mut consumed = Vec::new();

        for expression in query.wanted {
            let op = expression.compare_op();
            let compare: Vec<EntityValue> = expression
                .compare
                .iter()
                .map(|comparable| comparable.resolve(query.state))
                .collect();

            let mut existed = false;
            let mut binding = None;

            for (index, entity) in query.entities.iter().enumerate() {
                if used[index] || entity.entity != expression.entity {
                    continue;
                }
                if !query.ignore_score_floor && entity.score < config.entity_score_floor {
                    continue;
                }
                existed = true;
                if evaluate(op, Some(&entity.value), &compare) {
                    binding = Some(Binding::Turn(index, entity));
                    break;
                }
            }

            if binding.is_none() && existed {
                tracing::debug!(
                    entity = %expression.entity,
                    "Entity present but failed comparison"
                );
                return None;
            }

            if binding.is_none() && !expression.requires_absence() {
                if let Some(value) = state_entity_value(query.state, &expression.entity) {
                    if evaluate(op, Some(&value), &compare) {
                        binding = Some(Binding::State(Entity::new(
                            expression.entity.clone(),
                            value,
                            config.state_entity_score,
                        )));
                    }
                }
            }

            if binding.is_none() && evaluate(op, None, &compare) {
                binding = Some(Binding::Absent);
            }

            let Some(binding) = binding else {
                if expression.optional {
                    handicap += config.redundant_entity_handicap.max(config.optional_handicap);
                    continue;
                }
                return None;
            };

            if expression.optional {
                handicap += if expression.op.is_some() {
                    config.optional_equality_handicap
                } else {
                    config.optional_handicap
                };
            }

            let is_ne = op == Compare::Ne;
            let entity = match binding {
                Binding::Turn(index, entity) => {
                    used[index] = true;
                    consumed.push(entity);
                    entity.clone()
                }
                Binding::State(entity) => {
                    from_state += 1;
                    entity
                }
                Binding::Absent => {
                    if is_ne {
                        handicap += config.redundant_entity_handicap + config.optional_handicap;
                    }
                    sum += 1.0 - 2.0 * config.redundant_entity_handicap;
                    bound += 1;
                    continue;
                }
            };

            let score = query.remap.apply(entity.score);
            if is_ne {
                handicap += config.optional_handicap;
            } else if !expression.optional {
                min_score = min_score.min(score);
            }
            metl += entity.span_len().unwrap_or(0);
            sum += score;
            bound += 1;
            matched.push(entity);
        }

        if query.text_len > 0 && metl >= query.text_len {
            handicap -= config.redundant_entity_handicap;
        } else {
            handicap += self.redundancy_penalty(query, &consumed, from_state);
        }

        let score = if bound == 0 { 0.0 } else { sum / bound as f64 };

        Some(EntityMatch {
            score,
            handicap,
            matched,
            min_score,
            from_state,
            metl,
        })
    }

    /// Penalty for turn entities the rule does not explain plus state recoveries
    fn redundancy_penalty(&self, query: &EntityQuery<'_>, consumed: &[&Entity], from_state: usize) -> f64 {
        let config = &self.config;
        let mut remaining: Vec<&Entity> = query
            .all_entities
            .iter()
            .filter(|entity| entity.score >= config.entity_score_floor)
            .collect();

        for entity in consumed {
            if let Some(position) = remaining.iter().position(|candidate| candidate == entity) {
                remaining.remove(position);
            }
        }

        let redundant = remaining.len() + from_state;
        (redundant as f64 * config.redundant_entity_handicap).min(config.redundant_entity_clamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::preprocess_rule;
    use serde_json::json;

    const EPS: f64 = 1e-9;

    fn matcher() -> EntityMatcher {
        EntityMatcher::new(MatchingConfig::default())
    }

    fn run(
        rule: &[&str],
        entities: &[Entity],
        state: &StateSnapshot,
        text_len: usize,
    ) -> Option<EntityMatch> {
        let rule = preprocess_rule(rule.iter().copied());
        matcher().match_entities(&EntityQuery {
            text_len,
            wanted: &rule.entities,
            entities,
            state,
            remap: ScoreRemap::Identity,
            all_entities: entities,
            ignore_score_floor: false,
        })
    }

    fn state(value: serde_json::Value) -> StateSnapshot {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_single_required_entity() {
        let entities = vec![Entity::new("foo", "bar", 1.0)];
        let result = run(&["@foo"], &entities, &StateSnapshot::new(), 0).unwrap();

        assert!((result.score - 1.0).abs() < EPS);
        assert!(result.handicap.abs() < EPS);
        assert_eq!(result.matched.len(), 1);
        assert!((result.min_score - 1.0).abs() < EPS);
        assert_eq!(result.from_state, 0);
    }

    #[test]
    fn test_distinct_occurrences() {
        let two = vec![Entity::new("foo", "a", 1.0), Entity::new("foo", "b", 1.0)];
        let result = run(&["@foo", "@foo"], &two, &StateSnapshot::new(), 0).unwrap();
        assert_eq!(result.matched.len(), 2);
        assert_ne!(result.matched[0].value, result.matched[1].value);

        let one = vec![Entity::new("foo", "a", 1.0)];
        assert!(run(&["@foo", "@foo"], &one, &StateSnapshot::new(), 0).is_none());
    }

    #[test]
    fn test_disjunction_picks_satisfying_occurrence() {
        let entities = vec![Entity::new("color", "blue", 1.0), Entity::new("color", "red", 1.0)];
        let result = run(&["@color=red"], &entities, &StateSnapshot::new(), 0).unwrap();
        assert_eq!(result.matched[0].value, EntityValue::from("red"));
    }

    #[test]
    fn test_present_entity_failing_comparison_fails_rule() {
        let entities = vec![Entity::new("foo", "b", 1.0)];
        assert!(run(&["@foo?=a"], &entities, &StateSnapshot::new(), 0).is_none());
        assert!(run(&["@foo!="], &entities, &StateSnapshot::new(), 0).is_none());
    }

    #[test]
    fn test_score_floor() {
        let entities = vec![Entity::new("foo", "a", 0.5)];
        assert!(run(&["@foo"], &entities, &StateSnapshot::new(), 0).is_none());

        let rule = preprocess_rule(["@foo"]);
        let result = matcher()
            .match_entities(&EntityQuery {
                text_len: 0,
                wanted: &rule.entities,
                entities: &entities,
                state: &StateSnapshot::new(),
                remap: ScoreRemap::Identity,
                all_entities: &[],
                ignore_score_floor: true,
            })
            .unwrap();
        assert!((result.score - 0.5).abs() < EPS);

        // the waiver covers binding only, low turn entities stay out of the penalty
        let turn = vec![Entity::new("noise", "x", 0.3)];
        let result = matcher()
            .match_entities(&EntityQuery {
                text_len: 0,
                wanted: &rule.entities,
                entities: &entities,
                state: &StateSnapshot::new(),
                remap: ScoreRemap::Identity,
                all_entities: &turn,
                ignore_score_floor: true,
            })
            .unwrap();
        assert!(result.handicap.abs() < EPS);
    }

    #[test]
    fn test_optional_absent_adds_handicap() {
        let config = MatchingConfig::default();
        let result = run(&["@foo?"], &[], &StateSnapshot::new(), 0).unwrap();
        assert_eq!(result.score, 0.0);
        assert!((result.handicap - config.redundant_entity_handicap).abs() < EPS);

        let entities = vec![Entity::new("foo", "a", 1.0)];
        let result = run(&["@foo?"], &entities, &StateSnapshot::new(), 0).unwrap();
        assert!((result.handicap - config.optional_handicap).abs() < EPS);
        assert_eq!(result.min_score, f64::INFINITY);
    }

    #[test]
    fn test_entity_from_state() {
        let config = MatchingConfig::default();
        let snapshot = state(json!({ "@city": "Prague" }));
        let result = run(&["@city=Prague"], &[], &snapshot, 0).unwrap();

        assert_eq!(result.from_state, 1);
        assert_eq!(result.matched[0].value, EntityValue::from("Prague"));
        assert!((result.handicap - config.redundant_entity_handicap).abs() < EPS);

        assert!(run(&["@city=Brno"], &[], &snapshot, 0).is_none());
        assert!(run(&["@city!="], &[], &snapshot, 0).is_some());
    }

    #[test]
    fn test_absence_requirement() {
        let config = MatchingConfig::default();
        let result = run(&["@foo!="], &[], &StateSnapshot::new(), 0).unwrap();
        assert!(result.matched.is_empty());
        assert!((result.score - (1.0 - 2.0 * config.redundant_entity_handicap)).abs() < EPS);
        assert!(
            (result.handicap - (config.redundant_entity_handicap + config.optional_handicap)).abs()
                < EPS
        );
    }

    #[test]
    fn test_deferred_comparison_against_state() {
        let snapshot = state(json!({ "limit": 10 }));
        let entities = vec![Entity::new("amount", EntityValue::Number(5.0), 1.0)];
        assert!(run(&["@amount<$limit"], &entities, &snapshot, 0).is_some());
        assert!(run(&["@amount>$limit"], &entities, &snapshot, 0).is_none());
    }

    #[test]
    fn test_coverage_and_redundancy() {
        let config = MatchingConfig::default();
        let entities = vec![
            Entity::new("foo", "abc", 1.0).with_span(0, 3),
            Entity::new("bar", "x", 1.0).with_span(4, 5),
        ];

        let full = run(&["@foo", "@bar"], &entities, &StateSnapshot::new(), 4).unwrap();
        assert_eq!(full.metl, 4);
        assert!((full.handicap + config.redundant_entity_handicap).abs() < EPS);

        let partial = run(&["@foo"], &entities, &StateSnapshot::new(), 10).unwrap();
        assert!((partial.handicap - config.redundant_entity_handicap).abs() < EPS);
    }

    #[test]
    fn test_redundancy_penalty_is_clamped() {
        let config = MatchingConfig::default();
        let mut entities: Vec<Entity> = (0..10).map(|i| Entity::new("noise", format!("{}", i), 1.0)).collect();
        entities.push(Entity::new("foo", "a", 1.0));

        let result = run(&["@foo"], &entities, &StateSnapshot::new(), 0).unwrap();
        assert!((result.handicap - config.redundant_entity_clamp).abs() < EPS);
    }

    #[test]
    fn test_arctan_remap() {
        let remap = ScoreRemap::arctan(&MatchingConfig::default());
        assert!((remap.apply(1.0) - 1.0).abs() < EPS);
        assert!((remap.apply(0.94) - 0.94).abs() < EPS);
        assert!(remap.apply(0.97) > 0.97);
        assert!(remap.apply(0.9) < 0.9);
        assert!(remap.apply(0.0) >= 0.0);
        assert_eq!(ScoreRemap::Identity.apply(0.42), 0.42);
    }
}

//! Rule scoring
//!
//! Combines literal pattern hits, entity bindings and backend intent
//! probabilities into one comparable score per rule.
//!
//! # Modes
//!
//! - Entity-first: rules without intents (or stateless evaluation, or rules
//!   with patterns). Patterns and entities alone decide the score.
//! - Intent mode: every backend intent named by the rule is a candidate; the
//!   best candidate wins, ties keep the first one evaluated.
//!
//! # Example
//!
//! ```
//! use parley_config::MatchingConfig;
//! use parley_core::{Intent, NluResult, StateSnapshot};
//! use parley_text_processing::intent::{RuleScorer, TurnView};
//! use parley_text_processing::rules::preprocess_rule;
//!
//! let scorer = RuleScorer::new(MatchingConfig::default());
//! let rule = preprocess_rule(["greeting"]);
//! let nlu = NluResult::new(vec![Intent::new("greeting", 0.97)], vec![]);
//! let state = StateSnapshot::new();
//! let turn = TurnView::new("hello there", &nlu, &state);
//!
//! let winner = scorer.score(&rule, &turn, false).unwrap();
//! assert_eq!(winner.intent.as_deref(), Some("greeting"));
//! assert_eq!(winner.score, 0.97);
//! ```

use parley_config::MatchingConfig;
use parley_core::{Entity, Intent, NluResult, StateSnapshot};
use serde::{Deserialize, Serialize};

use crate::entities::{EntityMatch, EntityMatcher, EntityQuery, ScoreRemap};
use crate::rules::PreprocessedRule;
use crate::tokenizer::{char_len, tokenize};

/// Everything the scorer needs to know about one turn
#[derive(Debug, Clone)]
pub struct TurnView<'a> {
    /// Raw text
    pub text: &'a str,
    /// Tokenized text (see [`tokenize`])
    pub tokenized: String,
    /// Raw text length in characters
    pub text_len: usize,
    /// Backend intents, best first
    pub intents: &'a [Intent],
    /// Entities detected in the text
    pub entities: &'a [Entity],
    /// Conversation state
    pub state: &'a StateSnapshot,
}

impl<'a> TurnView<'a> {
    pub fn new(text: &'a str, nlu: &'a NluResult, state: &'a StateSnapshot) -> Self {
        Self {
            text,
            tokenized: tokenize(text),
            text_len: char_len(text),
            intents: &nlu.intents,
            entities: &nlu.entities,
            state,
        }
    }
}

/// Which path produced a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    EntityFirst,
    Intent,
}

/// Winning evaluation of a rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleMatch {
    /// Backend intent that won (`None` for entity-first matches)
    pub intent: Option<String>,
    pub score: f64,
    /// Bound entities
    pub entities: Vec<Entity>,
    pub mode: MatchMode,
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// Scores preprocessed rules against turns
///
/// Pure: holds only the matching constants, safe to share between tasks.
#[derive(Debug, Clone)]
pub struct RuleScorer {
    matcher: EntityMatcher,
}

impl RuleScorer {
    pub fn new(config: MatchingConfig) -> Self {
        Self {
            matcher: EntityMatcher::new(config),
        }
    }

    pub fn config(&self) -> &MatchingConfig {
        self.matcher.config()
    }

    /// Score a rule; `None` means no match
    ///
    /// `stateless` forces entity-first evaluation against an empty state.
    pub fn score(
        &self,
        rule: &PreprocessedRule,
        turn: &TurnView<'_>,
        stateless: bool,
    ) -> Option<RuleMatch> {
        if rule.is_empty() {
            return None;
        }

        let empty = StateSnapshot::new();
        let state = if stateless { &empty } else { turn.state };

        let entity_first = rule.intents.is_empty() || stateless || !rule.regexps.is_empty();
        if entity_first {
            if let Some(winner) = self.score_entity_first(rule, turn, state) {
                return Some(winner);
            }
            if !rule.entities.is_empty() || rule.intents.is_empty() {
                return None;
            }
        }

        self.score_intents(rule, turn, state)
    }

    /// Best pattern reward, `None` when no pattern matched
    fn pattern_score(&self, rule: &PreprocessedRule, turn: &TurnView<'_>) -> Option<f64> {
        let config = self.config();
        rule.regexps
            .iter()
            .filter(|regexp| regexp.is_match(turn.text, &turn.tokenized))
            .map(|regexp| {
                if !regexp.is_full_match && !turn.intents.is_empty() {
                    config.regexp_score - config.redundant_intent_handicap
                } else {
                    config.regexp_score
                }
            })
            .fold(None, |best: Option<f64>, score| {
                Some(best.map_or(score, |best| best.max(score)))
            })
    }

    fn score_entity_first(
        &self,
        rule: &PreprocessedRule,
        turn: &TurnView<'_>,
        state: &StateSnapshot,
    ) -> Option<RuleMatch> {
        let config = self.config();

        let pattern_score = self.pattern_score(rule, turn);
        if pattern_score.is_none() && !rule.regexps.is_empty() {
            return None;
        }

        if rule.entities.is_empty() {
            let score =
                pattern_score? - turn.entities.len() as f64 * config.redundant_entity_handicap;
            tracing::debug!(score, "Pattern rule scored");
            return (score > 0.0).then(|| RuleMatch {
                intent: None,
                score,
                entities: Vec::new(),
                mode: MatchMode::EntityFirst,
            });
        }

        let result = self.matcher.match_entities(&EntityQuery {
            text_len: turn.text_len,
            wanted: &rule.entities,
            entities: turn.entities,
            state,
            remap: ScoreRemap::Identity,
            all_entities: turn.entities,
            ignore_score_floor: false,
        })?;

        let entity_score = self.entity_score(rule, &result)?;

        let base_score = match pattern_score {
            Some(pattern_score) => (pattern_score + entity_score) / 2.0,
            None if !turn.intents.is_empty() => entity_score - config.redundant_intent_handicap,
            None => entity_score,
        };

        let signals = result.matched.len() + usize::from(pattern_score.is_some());
        let exponent = signals.saturating_sub(1) as i32;
        let mut score = (base_score - result.handicap) * config.multi_match_gain.powi(exponent);

        if result.metl > 0 && turn.text_len > 0 {
            let floor = config.confidence_floor + config.redundant_entity_handicap;
            let remaining = (score.clamp(0.0, 1.0) - floor).max(0.0);
            let uncovered = turn.text_len.saturating_sub(result.metl) as f64;
            score -= remaining * uncovered / turn.text_len as f64;
        }

        tracing::debug!(
            score,
            handicap = result.handicap,
            matched = result.matched.len(),
            metl = result.metl,
            "Entity rule scored"
        );

        (score > 0.0).then(|| RuleMatch {
            intent: None,
            score,
            entities: result.matched,
            mode: MatchMode::EntityFirst,
        })
    }

    /// Entity score used for aggregation; `None` rejects the rule
    ///
    /// A rule whose expressions are all satisfiable without entities still
    /// matches when nothing was bound.
    fn entity_score(&self, rule: &PreprocessedRule, result: &EntityMatch) -> Option<f64> {
        if result.score > 0.0 {
            Some(result.score)
        } else if rule.entities_vacuously_optional() {
            Some(1.0 - 2.0 * self.config().redundant_entity_handicap)
        } else {
            None
        }
    }

    fn score_intents(
        &self,
        rule: &PreprocessedRule,
        turn: &TurnView<'_>,
        state: &StateSnapshot,
    ) -> Option<RuleMatch> {
        let config = self.config();
        let mut best: Option<RuleMatch> = None;

        let candidates = turn.intents.iter().filter(|candidate| {
            candidate
                .name()
                .map(|name| rule.intents.iter().any(|wanted| wanted == name))
                .unwrap_or(false)
        });

        for candidate in candidates {
            let (entities, remap, ignore_score_floor) = match &candidate.entities {
                Some(own) => (own.as_slice(), ScoreRemap::arctan(config), true),
                None => (turn.entities, ScoreRemap::Identity, false),
            };

            let Some(result) = self.matcher.match_entities(&EntityQuery {
                text_len: turn.text_len,
                wanted: &rule.entities,
                entities,
                state,
                remap,
                all_entities: turn.entities,
                ignore_score_floor,
            }) else {
                continue;
            };

            if result.score <= 0.0 && !rule.entities_vacuously_optional() {
                continue;
            }

            let normalized = (result.min_score + result.handicap / 2.0).min(candidate.score);
            let with_handicap = normalized - result.handicap;
            let exponent = result.matched.len().saturating_sub(result.from_state) as i32;
            let gain = (config.multi_match_gain * result.score).powi(exponent);
            let score = round4(with_handicap * gain);

            tracing::debug!(
                intent = ?candidate.intent,
                candidate_score = candidate.score,
                score,
                "Intent candidate scored"
            );

            if score > 0.0 && best.as_ref().map_or(true, |best| score > best.score) {
                best = Some(RuleMatch {
                    intent: candidate.intent.clone(),
                    score,
                    entities: result.matched,
                    mode: MatchMode::Intent,
                });
            }
        }

        best
    }
}

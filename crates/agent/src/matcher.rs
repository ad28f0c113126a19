//! Rule matchers handed to routers

use std::collections::BTreeMap;
use std::sync::Arc;

use parley_text_processing::{set_state_for_rule, PreprocessedRule, RuleMatch, StateUpdate};

use crate::ai::Ai;
use crate::bookmark::{Bookmark, BookmarkGate, GateDecision};
use crate::turn::Turn;

/// Compiled rule bound to the `Ai` service
#[derive(Clone)]
pub struct RuleMatcher {
    ai: Arc<Ai>,
    rule: PreprocessedRule,
    confidence: Option<f64>,
}

impl RuleMatcher {
    pub(crate) fn new(ai: Arc<Ai>, rule: PreprocessedRule, confidence: Option<f64>) -> Self {
        Self {
            ai,
            rule,
            confidence,
        }
    }

    pub fn rule(&self) -> &PreprocessedRule {
        &self.rule
    }

    /// Threshold a score must reach
    pub fn confidence(&self) -> f64 {
        self.confidence.unwrap_or_else(|| self.ai.confidence())
    }

    /// State assignments to persist when this rule's action is reached
    pub fn state_updates(&self) -> BTreeMap<String, StateUpdate> {
        set_state_for_rule(&self.rule.entities)
    }

    /// Score the turn and keep the result only above the threshold
    pub async fn evaluate(&self, turn: &mut Turn) -> Option<RuleMatch> {
        let winner = self.ai.rule_is_matching(&self.rule, turn, false).await?;
        let confidence = self.confidence();
        if winner.score < confidence {
            tracing::debug!(score = winner.score, confidence, "Rule below confidence threshold");
            return None;
        }
        Some(winner)
    }

    /// Whether the rule matches the turn; the match becomes the turn winner
    pub async fn matches(&self, turn: &mut Turn) -> bool {
        match self.evaluate(turn).await {
            Some(winner) => {
                turn.set_winner(winner);
                true
            }
            None => false,
        }
    }
}

/// Outcome of a global rule
#[derive(Debug, Clone, PartialEq)]
pub enum GlobalOutcome {
    /// Matched and confirmed
    Fired(RuleMatch),
    /// Matched but deferred; the bookmark is stored on the turn
    Bookmarked(Bookmark),
    NoMatch,
}

/// Global rule matcher registered by routers under [`GlobalIntent::KEY`]
#[derive(Clone)]
pub struct GlobalIntent {
    matcher: RuleMatcher,
    action: String,
}

impl GlobalIntent {
    /// Well-known key routers register global matchers under
    pub const KEY: &'static str = "globalIntent";

    pub(crate) fn new(matcher: RuleMatcher, action: impl Into<String>) -> Self {
        Self {
            matcher,
            action: action.into(),
        }
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn matcher(&self) -> &RuleMatcher {
        &self.matcher
    }

    /// Evaluate the rule and pass the match through the bookmark gate
    pub async fn evaluate(&self, turn: &mut Turn, skip_bookmark: bool) -> GlobalOutcome {
        let Some(winner) = self.matcher.evaluate(turn).await else {
            return GlobalOutcome::NoMatch;
        };

        let gate = BookmarkGate::new(self.matcher.ai.bookmarking_enabled());
        match gate.check(turn, &self.action, &winner, skip_bookmark) {
            GateDecision::Pass => {
                turn.set_winner(winner.clone());
                GlobalOutcome::Fired(winner)
            }
            GateDecision::Defer => {
                let bookmark = Bookmark {
                    action: self.action.clone(),
                    matched: winner,
                };
                tracing::debug!(action = %self.action, "Global match bookmarked");
                turn.set_bookmark(bookmark.clone());
                GlobalOutcome::Bookmarked(bookmark)
            }
        }
    }

    /// Whether the global rule fires now
    pub async fn matches(&self, turn: &mut Turn) -> bool {
        matches!(self.evaluate(turn, false).await, GlobalOutcome::Fired(_))
    }
}

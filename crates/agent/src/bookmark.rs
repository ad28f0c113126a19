//! Deferral of global matches in favour of expected input

use parley_text_processing::{MatchMode, RuleMatch};
use serde::{Deserialize, Serialize};

use crate::turn::Turn;

/// Global match kept pending while expected-input handling runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bookmark {
    /// Action the global rule would have triggered
    pub action: String,
    pub matched: RuleMatch,
}

/// Gate decision for a scored global match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Confirm the match now
    Pass,
    /// Bookmark the match and report no match
    Defer,
}

/// Decides whether a global match fires now or is bookmarked
#[derive(Debug, Clone, Copy)]
pub struct BookmarkGate {
    enabled: bool,
}

impl BookmarkGate {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    /// Only intent-mode matches of a different action than the expected one
    /// are deferred, and only while no bookmark is pending.
    pub fn check(&self, turn: &Turn, action: &str, matched: &RuleMatch, skip: bool) -> GateDecision {
        if !self.enabled || skip || matched.mode != MatchMode::Intent {
            return GateDecision::Pass;
        }
        if turn.current_action() == Some(action) || turn.bookmark().is_some() {
            return GateDecision::Pass;
        }
        match turn.expected_action() {
            Some(expected) if expected != action => GateDecision::Defer,
            _ => GateDecision::Pass,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matched(mode: MatchMode) -> RuleMatch {
        RuleMatch {
            intent: Some("help".to_string()),
            score: 0.97,
            entities: Vec::new(),
            mode,
        }
    }

    #[test]
    fn test_defers_when_other_action_expected() {
        let gate = BookmarkGate::new(true);
        let turn = Turn::new("help").with_expected_action("/ask-name");
        assert_eq!(
            gate.check(&turn, "/help", &matched(MatchMode::Intent), false),
            GateDecision::Defer
        );
    }

    #[test]
    fn test_passes() {
        let gate = BookmarkGate::new(true);
        let intent = matched(MatchMode::Intent);

        let no_expectation = Turn::new("help");
        assert_eq!(gate.check(&no_expectation, "/help", &intent, false), GateDecision::Pass);

        let expected = Turn::new("help").with_expected_action("/help");
        assert_eq!(gate.check(&expected, "/help", &intent, false), GateDecision::Pass);

        let current = Turn::new("help")
            .with_expected_action("/ask-name")
            .with_current_action("/help");
        assert_eq!(gate.check(&current, "/help", &intent, false), GateDecision::Pass);

        let other = Turn::new("help").with_expected_action("/ask-name");
        assert_eq!(gate.check(&other, "/help", &intent, true), GateDecision::Pass);
        assert_eq!(
            gate.check(&other, "/help", &matched(MatchMode::EntityFirst), false),
            GateDecision::Pass
        );
        assert_eq!(
            BookmarkGate::new(false).check(&other, "/help", &intent, false),
            GateDecision::Pass
        );
    }

    #[test]
    fn test_pending_bookmark_passes() {
        let gate = BookmarkGate::new(true);
        let mut turn = Turn::new("help").with_expected_action("/ask-name");
        turn.set_bookmark(Bookmark {
            action: "/other".to_string(),
            matched: matched(MatchMode::Intent),
        });
        assert_eq!(
            gate.check(&turn, "/help", &matched(MatchMode::Intent), false),
            GateDecision::Pass
        );
    }
}

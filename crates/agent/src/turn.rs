//! Per-turn matching context

use std::sync::Arc;

use parley_core::{NluResult, RequestContext, StateSnapshot};
use parley_text_processing::RuleMatch;

use crate::bookmark::Bookmark;

/// One user input travelling through the router
///
/// Holds the inputs of matching (text, state, request context, optional
/// pre-computed NLU data) and what matching produced: the backend result,
/// computed once and shared by every matcher, the winning rule and a
/// pending bookmark.
#[derive(Debug, Clone, Default)]
pub struct Turn {
    text: String,
    state: StateSnapshot,
    context: RequestContext,
    nlu_override: Option<NluResult>,
    nlu: Option<Arc<NluResult>>,
    expected_action: Option<String>,
    current_action: Option<String>,
    bookmark: Option<Bookmark>,
    winner: Option<RuleMatch>,
}

impl Turn {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    /// Conversation state snapshot
    pub fn with_state(mut self, state: StateSnapshot) -> Self {
        self.state = state;
        self
    }

    pub fn with_context(mut self, context: RequestContext) -> Self {
        self.context = context;
        self
    }

    /// Pre-computed NLU data (e.g. a quick reply naming its intent)
    pub fn with_nlu_override(mut self, nlu: NluResult) -> Self {
        self.nlu_override = Some(nlu);
        self
    }

    /// Action the conversation expects the next input to be handled by
    pub fn with_expected_action(mut self, action: impl Into<String>) -> Self {
        self.expected_action = Some(action.into());
        self
    }

    /// Action currently being processed
    pub fn with_current_action(mut self, action: impl Into<String>) -> Self {
        self.current_action = Some(action.into());
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn state(&self) -> &StateSnapshot {
        &self.state
    }

    pub fn context(&self) -> &RequestContext {
        &self.context
    }

    pub fn expected_action(&self) -> Option<&str> {
        self.expected_action.as_deref()
    }

    pub fn current_action(&self) -> Option<&str> {
        self.current_action.as_deref()
    }

    /// Backend result, once preloaded
    pub fn nlu(&self) -> Option<&Arc<NluResult>> {
        self.nlu.as_ref()
    }

    pub(crate) fn take_nlu_override(&mut self) -> Option<NluResult> {
        self.nlu_override.take()
    }

    pub(crate) fn set_nlu(&mut self, nlu: Arc<NluResult>) {
        self.nlu = Some(nlu);
    }

    /// Last rule that matched in this turn
    pub fn winner(&self) -> Option<&RuleMatch> {
        self.winner.as_ref()
    }

    pub(crate) fn set_winner(&mut self, winner: RuleMatch) {
        self.winner = Some(winner);
    }

    /// Deferred global match, if any
    pub fn bookmark(&self) -> Option<&Bookmark> {
        self.bookmark.as_ref()
    }

    pub(crate) fn set_bookmark(&mut self, bookmark: Bookmark) {
        self.bookmark = Some(bookmark);
    }

    /// Remove the pending bookmark without firing it
    pub fn take_bookmark(&mut self) -> Option<Bookmark> {
        self.bookmark.take()
    }

    /// Fire the pending bookmark: it becomes the winner of the turn
    pub fn replay_bookmark(&mut self) -> Option<Bookmark> {
        let bookmark = self.bookmark.take()?;
        self.winner = Some(bookmark.matched.clone());
        Some(bookmark)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_text_processing::MatchMode;

    fn matched(intent: &str) -> RuleMatch {
        RuleMatch {
            intent: Some(intent.to_string()),
            score: 0.97,
            entities: Vec::new(),
            mode: MatchMode::Intent,
        }
    }

    #[test]
    fn test_builder() {
        let turn = Turn::new("hello")
            .with_expected_action("/ask-name")
            .with_current_action("/start");

        assert_eq!(turn.text(), "hello");
        assert_eq!(turn.expected_action(), Some("/ask-name"));
        assert_eq!(turn.current_action(), Some("/start"));
        assert!(turn.nlu().is_none());
        assert!(turn.winner().is_none());
    }

    #[test]
    fn test_replay_bookmark() {
        let mut turn = Turn::new("help");
        turn.set_bookmark(Bookmark {
            action: "/help".to_string(),
            matched: matched("help"),
        });

        let bookmark = turn.replay_bookmark().unwrap();
        assert_eq!(bookmark.action, "/help");
        assert_eq!(turn.winner(), Some(&matched("help")));
        assert!(turn.bookmark().is_none());
        assert!(turn.replay_bookmark().is_none());
    }

    #[test]
    fn test_take_bookmark_discards() {
        let mut turn = Turn::new("help");
        turn.set_bookmark(Bookmark {
            action: "/help".to_string(),
            matched: matched("help"),
        });

        assert!(turn.take_bookmark().is_some());
        assert!(turn.winner().is_none());
    }
}

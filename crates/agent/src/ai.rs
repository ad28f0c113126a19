//! The `Ai` facade
//!
//! One service object per process, constructed at startup and shared by
//! routers as `Arc<Ai>`. It owns the backend registry and the rule scorer;
//! everything turn specific lives on [`Turn`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parley_config::{AiConfig, MatchingConfig, Settings};
use parley_core::{NluBackend, NluResult};
use parley_nlu::{BackendHandle, BackendRegistry};
use parley_text_processing::{
    preprocess_rule, PreprocessedRule, RuleAtom, RuleMatch, RuleScorer, TurnView,
};

use crate::matcher::{GlobalIntent, RuleMatcher};
use crate::turn::Turn;

/// Matching service shared by routers
pub struct Ai {
    registry: BackendRegistry,
    scorer: RuleScorer,
    config: AiConfig,
    bookmarking: AtomicBool,
}

impl Ai {
    pub fn new(matching: MatchingConfig, config: AiConfig) -> Self {
        Self {
            registry: BackendRegistry::new(&config),
            scorer: RuleScorer::new(matching),
            bookmarking: AtomicBool::new(config.bookmarking_enabled),
            config,
        }
    }

    /// Build from settings, registering every configured HTTP backend
    pub fn from_settings(settings: &Settings) -> parley_core::Result<Self> {
        let ai = Self::new(settings.matching, settings.ai.clone());
        for backend in &settings.backends {
            ai.registry.register_model(backend)?;
        }
        tracing::info!(
            backends = settings.backends.len(),
            confidence = settings.ai.confidence,
            "Ai initialized"
        );
        Ok(ai)
    }

    pub fn registry(&self) -> &BackendRegistry {
        &self.registry
    }

    pub fn scorer(&self) -> &RuleScorer {
        &self.scorer
    }

    /// Default match threshold
    pub fn confidence(&self) -> f64 {
        self.config.confidence
    }

    /// Register a backend under a prefix (default prefix when `None`)
    pub fn register(&self, backend: Arc<dyn NluBackend>, prefix: Option<&str>) -> Arc<BackendHandle> {
        self.registry.register_backend(backend, prefix)
    }

    /// Force a fixed intent for every turn (`None` = no intent)
    pub fn set_mock_intent(&self, intent: Option<&str>, score: f64) {
        self.registry.set_mock_intent(intent, score);
    }

    pub fn clear_mock_intent(&self) {
        self.registry.clear_mock_intent();
    }

    pub fn bookmarking_enabled(&self) -> bool {
        self.bookmarking.load(Ordering::Relaxed)
    }

    pub fn set_bookmarking(&self, enabled: bool) {
        self.bookmarking.store(enabled, Ordering::Relaxed);
    }

    /// Ensure the backend result of the turn is computed, once per turn
    ///
    /// Precedence: mock intent, then the turn's own NLU data, then the
    /// registry.
    pub async fn preload_intent(&self, turn: &mut Turn) -> Arc<NluResult> {
        if let Some(nlu) = turn.nlu() {
            return nlu.clone();
        }

        let result = if let Some(mock) = self.registry.mock_result() {
            mock
        } else if let Some(nlu) = turn.take_nlu_override() {
            nlu
        } else {
            self.registry.resolve(turn.text(), turn.context()).await
        };

        let result = Arc::new(result);
        turn.set_nlu(result.clone());
        result
    }

    /// Score a rule without applying any threshold
    pub async fn rule_is_matching(
        &self,
        rule: &PreprocessedRule,
        turn: &mut Turn,
        stateless: bool,
    ) -> Option<RuleMatch> {
        let nlu = self.preload_intent(turn).await;
        let view = TurnView::new(turn.text(), &nlu, turn.state());
        self.scorer.score(rule, &view, stateless)
    }

    /// Matcher firing when a rule scores at least the confidence threshold
    pub fn matcher<I, A>(self: &Arc<Self>, rules: I, confidence: Option<f64>) -> RuleMatcher
    where
        I: IntoIterator<Item = A>,
        A: Into<RuleAtom>,
    {
        RuleMatcher::new(self.clone(), preprocess_rule(rules), confidence)
    }

    /// Matcher for a global rule, gated by the bookmark mechanism
    pub fn global_match<I, A>(
        self: &Arc<Self>,
        rules: I,
        action: impl Into<String>,
        confidence: Option<f64>,
    ) -> GlobalIntent
    where
        I: IntoIterator<Item = A>,
        A: Into<RuleAtom>,
    {
        GlobalIntent::new(self.matcher(rules, confidence), action)
    }
}

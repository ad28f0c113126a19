//! Route table driving the playground
//!
//! Routes are evaluated in file order. Global routes go through the
//! bookmark gate with the previously reached action as the expected one,
//! so a global match that interrupts an expected action is deferred and
//! replayed only when no other route handles the input.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use parley_agent::{Ai, GlobalIntent, GlobalOutcome, RuleMatcher, StateUpdate, Turn};
use parley_core::{Entity, StateSnapshot};
use parley_text_processing::RuleAtom;

/// One entry of the route table
#[derive(Debug, Clone, Deserialize)]
pub struct Route {
    pub action: String,
    #[serde(default)]
    pub rules: Vec<RuleAtom>,
    /// Matched from anywhere in the conversation
    #[serde(default)]
    pub global: bool,
    /// Overrides the default confidence threshold
    #[serde(default)]
    pub confidence: Option<f64>,
}

/// Load a YAML route table
pub fn load_routes(path: impl AsRef<Path>) -> anyhow::Result<Vec<Route>> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read routes from {}", path.display()))?;
    parse_routes(&raw).with_context(|| format!("Invalid route table {}", path.display()))
}

pub fn parse_routes(raw: &str) -> anyhow::Result<Vec<Route>> {
    let routes: Vec<Route> = serde_yaml::from_str(raw)?;
    Ok(routes)
}

/// Result of routing one input line
#[derive(Debug, Clone, Serialize)]
pub struct Outcome {
    pub text: String,
    pub action: Option<String>,
    pub intent: Option<String>,
    pub score: Option<f64>,
    pub entities: Vec<Entity>,
    /// Set when the action comes from a replayed bookmark
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub replayed: bool,
}

enum Handler {
    Local(RuleMatcher),
    Global(GlobalIntent),
}

struct CompiledRoute {
    action: String,
    handler: Handler,
}

impl CompiledRoute {
    fn matcher(&self) -> &RuleMatcher {
        match &self.handler {
            Handler::Local(matcher) => matcher,
            Handler::Global(global) => global.matcher(),
        }
    }
}

/// Stateful router over a compiled route table
pub struct Router {
    ai: Arc<Ai>,
    routes: Vec<CompiledRoute>,
    state: StateSnapshot,
    expected_action: Option<String>,
}

impl Router {
    pub fn new(ai: Arc<Ai>, routes: Vec<Route>) -> Self {
        let routes = routes
            .into_iter()
            .map(|route| {
                let handler = if route.global {
                    Handler::Global(ai.global_match(
                        route.rules,
                        route.action.clone(),
                        route.confidence,
                    ))
                } else {
                    Handler::Local(ai.matcher(route.rules, route.confidence))
                };
                CompiledRoute {
                    action: route.action,
                    handler,
                }
            })
            .collect();

        Self {
            ai,
            routes,
            state: StateSnapshot::new(),
            expected_action: None,
        }
    }

    pub fn state(&self) -> &StateSnapshot {
        &self.state
    }

    /// Route one input and carry the resulting state to the next one
    pub async fn handle(&mut self, text: &str) -> Outcome {
        let mut turn = Turn::new(text).with_state(self.state.clone());
        if let Some(expected) = &self.expected_action {
            turn = turn.with_expected_action(expected.clone());
        }
        self.ai.preload_intent(&mut turn).await;

        let mut reached = None;
        for (index, route) in self.routes.iter().enumerate() {
            let fired = match &route.handler {
                Handler::Local(matcher) => matcher.matches(&mut turn).await,
                Handler::Global(global) => match global.evaluate(&mut turn, false).await {
                    GlobalOutcome::Fired(_) => true,
                    GlobalOutcome::Bookmarked(_) | GlobalOutcome::NoMatch => false,
                },
            };
            if fired {
                reached = Some(index);
                break;
            }
        }

        let mut replayed = false;
        if reached.is_none() {
            if let Some(bookmark) = turn.replay_bookmark() {
                tracing::debug!(action = %bookmark.action, "Replaying bookmarked global match");
                reached = self.routes.iter().position(|r| r.action == bookmark.action);
                replayed = true;
            }
        }

        let Some(index) = reached else {
            tracing::debug!(text, "No route matched");
            return Outcome {
                text: text.to_string(),
                action: None,
                intent: None,
                score: None,
                entities: Vec::new(),
                replayed: false,
            };
        };

        let route = &self.routes[index];
        let winner = turn.winner().cloned();
        if let Some(winner) = &winner {
            apply_state_updates(&mut self.state, route.matcher(), &winner.entities);
        }
        self.expected_action = Some(route.action.clone());

        Outcome {
            text: text.to_string(),
            action: Some(route.action.clone()),
            intent: winner.as_ref().and_then(|w| w.intent.clone()),
            score: winner.as_ref().map(|w| w.score),
            entities: winner.map(|w| w.entities).unwrap_or_default(),
            replayed,
        }
    }
}

fn apply_state_updates(state: &mut StateSnapshot, matcher: &RuleMatcher, matched: &[Entity]) {
    for (key, update) in matcher.state_updates() {
        let value = match update {
            StateUpdate::Value(value) => Some(value),
            StateUpdate::Track => {
                let name = key.trim_start_matches('@');
                matched
                    .iter()
                    .find(|entity| entity.entity == name)
                    .map(|entity| entity.value.clone())
            }
        };
        let Some(value) = value else { continue };
        match serde_json::to_value(&value) {
            Ok(Value::Null) | Err(_) => {}
            Ok(json) => {
                state.insert(key, json);
            }
        }
    }
}

//! Ai facade for conversational routers
//!
//! Features:
//! - Per-turn context with once-per-turn backend resolution
//! - Rule matchers with confidence thresholds
//! - Global matchers deferred by the bookmark gate
//! - Backend registration, mock intents and prefix resolution via the registry

pub mod ai;
pub mod bookmark;
pub mod matcher;
pub mod turn;

pub use ai::Ai;
pub use bookmark::{Bookmark, BookmarkGate, GateDecision};
pub use matcher::{GlobalIntent, GlobalOutcome, RuleMatcher};
pub use turn::Turn;

pub use parley_text_processing::{MatchMode, RuleMatch, StateUpdate};

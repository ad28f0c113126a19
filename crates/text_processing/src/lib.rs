//! Matching engine for conversational rules
//!
//! This crate decides how well a rule explains a single turn:
//! - **Tokenizer**: diacritics/emoji aware text normalization
//! - **Rules**: compiling rule atoms (`intent`, `@entity>=3`, `#literal|pattern`)
//! - **Entities**: binding entity expressions to detected or remembered entities
//! - **Intent**: combining patterns, entities and backend intents into one score
//!
//! Everything here is synchronous and free of shared mutable state.

pub mod entities;
pub mod intent;
pub mod rules;
pub mod tokenizer;

mod error;

pub use error::{Result, RuleError};

pub use entities::{EntityMatch, EntityMatcher, EntityQuery, ScoreRemap};
pub use intent::{MatchMode, RuleMatch, RuleScorer, TurnView};
pub use rules::{
    preprocess_rule, rule_from_value, set_state_for_rule, Comparable, Compare, EntityExpression,
    EntityRule, PatternRule, PreprocessedRule, RegexpComparator, RuleAtom, StateUpdate,
};
pub use tokenizer::{remove_diacritics, tokenize};

//! Core traits for the parley system
//!
//! All NLU providers implement these traits to enable:
//! - Pluggable backends (swap implementations without code changes)
//! - Testing with mocks
//! - Runtime switching based on configuration
//!
//! # Trait Hierarchy
//!
//! ```text
//! Language Understanding:
//!   - NluBackend: Text → ranked intents + entities
//! ```

mod nlu;

pub use nlu::NluBackend;

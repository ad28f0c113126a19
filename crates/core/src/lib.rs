//! Core traits and types for the parley matching engine
//!
//! This crate provides foundational types used across all other crates:
//! - NLU data model (intents, entities, backend results)
//! - Durable conversation state snapshot helpers
//! - The pluggable `NluBackend` trait
//! - Error types

pub mod error;
pub mod nlu;
pub mod state;
pub mod traits;

pub use error::{Error, Result};
pub use nlu::{Entity, EntityValue, Intent, NluResult, RequestContext};
pub use state::{
    entity_meta_key, entity_state_key, lookup_path, scalar_value, state_entity_value, StateSnapshot,
    ENTITY_META_PREFIX, ENTITY_STATE_PREFIX,
};

// Trait re-exports
pub use traits::NluBackend;

//! Shared domain types for rapport.
//!
//! This crate contains the record model of the conversation memory tracker:
//! Memory, RelationshipEntry, EmotionalState, TimelineEvent and the
//! per-conversation MemoryStore aggregate, plus configuration, events and
//! the error types shared by the core and infrastructure crates.
//!
//! Zero infrastructure dependencies -- only serde, chrono, thiserror.

pub mod config;
pub mod emotion;
pub mod error;
pub mod event;
pub mod llm;
pub mod memory;
pub mod message;
pub mod relationship;
pub mod store;
pub mod timeline;

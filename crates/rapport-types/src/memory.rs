//! Memory types for rapport.
//!
//! A [`Memory`] is one extracted noteworthy fact or event from a conversation.
//! Field names serialize in camelCase with epoch-millisecond timestamps so a
//! persisted store matches the host application's metadata blob.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

/// `messageIndex` value for memories not derived from a chat message
/// (manual entries, imported facts).
pub const UNANCHORED_MESSAGE_INDEX: i64 = -1;

/// Literal summary the generator returns when nothing is worth remembering.
pub const NO_MEMORY_SENTINEL: &str = "none";

/// Placeholder keyword used when extraction yields none.
pub const PLACEHOLDER_KEYWORD: &str = "memory";

/// Memories above this importance are considered significant.
pub const SIGNIFICANT_IMPORTANCE: f64 = 0.7;

/// Where a memory came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemorySource {
    User,
    Character,
    Manual,
    Lorebook,
}

impl fmt::Display for MemorySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemorySource::User => write!(f, "user"),
            MemorySource::Character => write!(f, "character"),
            MemorySource::Manual => write!(f, "manual"),
            MemorySource::Lorebook => write!(f, "lorebook"),
        }
    }
}

impl FromStr for MemorySource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(MemorySource::User),
            "character" => Ok(MemorySource::Character),
            "manual" => Ok(MemorySource::Manual),
            "lorebook" => Ok(MemorySource::Lorebook),
            other => Err(format!("invalid memory source: '{other}'")),
        }
    }
}

/// Direction of a relationship change reported for a memory.
///
/// Unknown labels deserialize as [`RelationshipChange::Neutral`] because the
/// value originates from free-form generated text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum RelationshipChange {
    Improved,
    Worsened,
    #[default]
    Neutral,
}

impl RelationshipChange {
    /// Fixed-magnitude step applied to a ledger level.
    pub fn step(self) -> f64 {
        match self {
            RelationshipChange::Improved => 0.1,
            RelationshipChange::Worsened => -0.1,
            RelationshipChange::Neutral => 0.0,
        }
    }

    /// Map a free-form label onto a change, defaulting to neutral.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "improved" => RelationshipChange::Improved,
            "worsened" => RelationshipChange::Worsened,
            _ => RelationshipChange::Neutral,
        }
    }
}

impl From<String> for RelationshipChange {
    fn from(label: String) -> Self {
        Self::from_label(&label)
    }
}

impl fmt::Display for RelationshipChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelationshipChange::Improved => write!(f, "improved"),
            RelationshipChange::Worsened => write!(f, "worsened"),
            RelationshipChange::Neutral => write!(f, "neutral"),
        }
    }
}

/// Relationship payload carried by a memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipDelta {
    /// Relationship dimension, e.g. "romance" or "trust".
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default)]
    pub change: RelationshipChange,
    /// In multi-party conversations: the two participants, e.g. "Ann and Bo".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub between: Option<String>,
}

impl RelationshipDelta {
    /// Ledger key: `between`, else `type`, else "general".
    pub fn ledger_key(&self) -> &str {
        self.between
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .or_else(|| self.kind.as_deref().filter(|s| !s.trim().is_empty()))
            .unwrap_or("general")
    }
}

fn default_message_index() -> i64 {
    UNANCHORED_MESSAGE_INDEX
}

/// A single memory extracted from (or added to) a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Memory {
    pub summary: String,
    /// Importance in [0, 1].
    pub importance: f64,
    pub emotion: String,
    pub keywords: Vec<String>,
    #[serde(default)]
    pub continuity_note: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationship: Option<RelationshipDelta>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    pub source: MemorySource,
    /// Conversation participant this memory concerns.
    #[serde(
        default,
        alias = "characterName",
        skip_serializing_if = "Option::is_none"
    )]
    pub speaker: Option<String>,
    /// Position in the source message sequence, or -1 when not message-derived.
    #[serde(default = "default_message_index")]
    pub message_index: i64,
}

impl Memory {
    /// The source message position, if this memory is message-derived.
    pub fn anchored_index(&self) -> Option<usize> {
        usize::try_from(self.message_index).ok()
    }

    pub fn is_significant(&self) -> bool {
        self.importance > SIGNIFICANT_IMPORTANCE
    }
}

//! Timeline events: a chronological, append-only log of memory-producing
//! events, independent of the bounded memory store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::memory::Memory;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEvent {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    pub message_index: i64,
    pub summary: String,
    pub importance: f64,
    #[serde(
        default,
        alias = "characterName",
        skip_serializing_if = "Option::is_none"
    )]
    pub speaker: Option<String>,
}

impl TimelineEvent {
    /// Derive an event from a memory, stamped at `timestamp`.
    pub fn from_memory(memory: &Memory, timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            message_index: memory.message_index,
            summary: memory.summary.clone(),
            importance: memory.importance,
            speaker: memory.speaker.clone(),
        }
    }
}

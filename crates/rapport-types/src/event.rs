//! Event types for the rapport tracker event bus.
//!
//! `TrackerEvent` is broadcast by the tracker service after memories are
//! committed and while batch analysis runs. All variants are Clone + Send +
//! Sync for use with tokio broadcast channels.

use serde::{Deserialize, Serialize};

/// Events emitted by the memory tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TrackerEvent {
    /// A memory was committed to a conversation's store.
    MemoryAdded {
        conversation_id: String,
        message_index: i64,
        summary: String,
        importance: f64,
    },

    /// A committed memory crossed the notification threshold.
    SignificantMemory {
        conversation_id: String,
        summary: String,
        importance: f64,
        speaker: Option<String>,
    },

    /// One more message of a batch range has been handled.
    BatchProgress {
        conversation_id: String,
        processed: usize,
        total: usize,
    },

    /// A batch range finished without aborting.
    BatchCompleted {
        conversation_id: String,
        created: usize,
        skipped: usize,
        total_memories: usize,
    },

    /// A batch range was abandoned after a generation failure.
    BatchFailed {
        conversation_id: String,
        message_index: usize,
        error: String,
    },
}

impl TrackerEvent {
    pub fn conversation_id(&self) -> &str {
        match self {
            TrackerEvent::MemoryAdded {
                conversation_id, ..
            }
            | TrackerEvent::SignificantMemory {
                conversation_id, ..
            }
            | TrackerEvent::BatchProgress {
                conversation_id, ..
            }
            | TrackerEvent::BatchCompleted {
                conversation_id, ..
            }
            | TrackerEvent::BatchFailed {
                conversation_id, ..
            } => conversation_id,
        }
    }
}

//! The per-conversation memory store aggregate and its export envelope.
//!
//! One [`MemoryStore`] exists per conversation. It is created lazily on the
//! first memory-producing event and owned by the host, which is responsible
//! for persisting it after every mutating operation.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::emotion::EmotionalState;
use crate::memory::Memory;
use crate::relationship::RelationshipEntry;
use crate::timeline::TimelineEvent;

/// Version string written into export envelopes.
pub const EXPORT_VERSION: &str = "1.0";

/// Per-conversation persisted aggregate.
///
/// The four primary collections are required when deserializing; a blob
/// missing any of them is not a well-formed store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryStore {
    /// Size-bounded by the retention policy.
    pub memories: Vec<Memory>,
    pub relationships: BTreeMap<String, RelationshipEntry>,
    pub timeline: Vec<TimelineEvent>,
    pub emotional_states: BTreeMap<String, EmotionalState>,
    /// Only materialized when per-participant partitioning is in use.
    #[serde(
        default,
        alias = "characterMemories",
        skip_serializing_if = "Option::is_none"
    )]
    pub per_speaker_memories: Option<BTreeMap<String, Vec<Memory>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a memory already exists for the given non-negative message index.
    pub fn contains_message_index(&self, message_index: i64) -> bool {
        message_index >= 0
            && self
                .memories
                .iter()
                .any(|m| m.message_index == message_index)
    }

    /// Memories recorded for one speaker in the per-participant partition.
    pub fn speaker_memories(&self, speaker: &str) -> &[Memory] {
        self.per_speaker_memories
            .as_ref()
            .and_then(|partition| partition.get(speaker))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.memories.is_empty()
            && self.relationships.is_empty()
            && self.timeline.is_empty()
            && self.emotional_states.is_empty()
    }
}

/// Identity of the conversation a store belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    /// Stable identifier used as the persistence key.
    pub id: String,
    /// Human-readable label, e.g. the character name.
    pub label: String,
    /// More than one non-user participant.
    #[serde(default)]
    pub is_multi_party: bool,
}

impl Conversation {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            is_multi_party: false,
        }
    }

    pub fn multi_party(mut self, is_multi_party: bool) -> Self {
        self.is_multi_party = is_multi_party;
        self
    }
}

/// One-directional JSON export of a store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportEnvelope {
    pub version: String,
    /// ISO-8601 export time.
    pub export_date: String,
    pub label: String,
    pub conversation_id: String,
    pub data: MemoryStore,
}

impl ExportEnvelope {
    pub fn new(store: &MemoryStore, conversation: &Conversation, at: DateTime<Utc>) -> Self {
        Self {
            version: EXPORT_VERSION.to_string(),
            export_date: at.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            label: conversation.label.clone(),
            conversation_id: conversation.id.clone(),
            data: store.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemorySource, UNANCHORED_MESSAGE_INDEX};

    fn memory_at(index: i64) -> Memory {
        Memory {
            summary: format!("event {index}"),
            importance: 0.5,
            emotion: "neutral".to_string(),
            keywords: vec!["memory".to_string()],
            continuity_note: String::new(),
            relationship: None,
            timestamp: Utc::now(),
            source: MemorySource::Character,
            speaker: None,
            message_index: index,
        }
    }

    #[test]
    fn test_contains_message_index_ignores_unanchored() {
        let mut store = MemoryStore::new();
        store.memories.push(memory_at(UNANCHORED_MESSAGE_INDEX));
        store.memories.push(memory_at(3));
        assert!(store.contains_message_index(3));
        assert!(!store.contains_message_index(2));
        assert!(!store.contains_message_index(UNANCHORED_MESSAGE_INDEX));
    }

    #[test]
    fn test_store_requires_primary_collections() {
        let partial = r#"{"memories": [], "timeline": []}"#;
        assert!(serde_json::from_str::<MemoryStore>(partial).is_err());

        let full = r#"{"memories": [], "relationships": {}, "timeline": [], "emotionalStates": {}}"#;
        let store: MemoryStore = serde_json::from_str(full).unwrap();
        assert!(store.is_empty());
        assert!(store.per_speaker_memories.is_none());
    }

    #[test]
    fn test_store_accepts_character_memories_alias() {
        let json = r#"{
            "memories": [], "relationships": {}, "timeline": [], "emotionalStates": {},
            "characterMemories": {"Ann": []}
        }"#;
        let store: MemoryStore = serde_json::from_str(json).unwrap();
        assert!(store.per_speaker_memories.unwrap().contains_key("Ann"));
    }

    #[test]
    fn test_export_envelope_shape() {
        let store = MemoryStore::new();
        let conversation = Conversation::new("chat-1", "Seraphina");
        let at = DateTime::from_timestamp_millis(1_700_000_000_000).unwrap();
        let envelope = ExportEnvelope::new(&store, &conversation, at);
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["version"], "1.0");
        assert_eq!(json["exportDate"], "2023-11-14T22:13:20.000Z");
        assert_eq!(json["label"], "Seraphina");
        assert_eq!(json["conversationId"], "chat-1");
        assert!(json["data"]["memories"].as_array().unwrap().is_empty());
    }
}

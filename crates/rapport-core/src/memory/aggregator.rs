//! Folding memories into a conversation's store.
//!
//! The aggregator appends the memory and its timeline event, updates the
//! relationship ledger and emotional state, and (for live and manual
//! memories) trims the store. It never persists; the caller saves the store.

use chrono::{DateTime, Utc};

use rapport_types::config::{PartitionMode, TrackerConfig};
use rapport_types::emotion::{DEFAULT_EMOTION_KEY, EmotionalState};
use rapport_types::memory::{Memory, RelationshipDelta};
use rapport_types::relationship::RelationshipEntry;
use rapport_types::store::MemoryStore;
use rapport_types::timeline::TimelineEvent;

use super::retention;

/// How memories are folded into a store.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AggregationPolicy {
    pub partition_mode: PartitionMode,
    pub is_multi_party: bool,
    pub track_emotions: bool,
    /// Retention bound for the flat memory list.
    pub max_entries: usize,
}

impl AggregationPolicy {
    pub fn from_config(config: &TrackerConfig, is_multi_party: bool) -> Self {
        Self {
            partition_mode: config.partition_mode,
            is_multi_party,
            track_emotions: config.use_emotional_context,
            max_entries: config.max_memory_entries,
        }
    }

    /// Whether memories are also filed per speaker.
    pub fn partitions_by_speaker(&self) -> bool {
        self.is_multi_party && self.partition_mode == PartitionMode::PerParticipant
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Aggregator {
    policy: AggregationPolicy,
}

impl Aggregator {
    pub fn new(policy: AggregationPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &AggregationPolicy {
        &self.policy
    }

    /// Fold `memory` into `store` and trim. Returns the number of memories
    /// the trim dropped.
    pub fn apply(&self, store: &mut MemoryStore, memory: Memory, now: DateTime<Utc>) -> usize {
        self.record(store, memory, now, now);
        retention::trim(store, self.policy.max_entries)
    }

    /// Fold `memory` into `store` without trimming. The timeline event is
    /// stamped at `timeline_at`; ledger and emotion updates at `now`.
    pub fn record(
        &self,
        store: &mut MemoryStore,
        memory: Memory,
        timeline_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) {
        store.timeline.push(TimelineEvent::from_memory(&memory, timeline_at));

        if let Some(delta) = &memory.relationship {
            let key = relationship_key(
                delta,
                memory.speaker.as_deref(),
                self.policy.is_multi_party,
            );
            update_relationship(store, key, delta, memory.speaker.as_deref(), now);
        }

        if self.policy.track_emotions && !memory.emotion.trim().is_empty() {
            update_emotional_state(store, &memory.emotion, memory.speaker.as_deref(), now);
        }

        if self.policy.partitions_by_speaker() {
            let speaker = memory
                .speaker
                .clone()
                .unwrap_or_else(|| DEFAULT_EMOTION_KEY.to_string());
            store
                .per_speaker_memories
                .get_or_insert_with(Default::default)
                .entry(speaker)
                .or_default()
                .push(memory.clone());
        }

        store.memories.push(memory);
    }
}

/// Ledger key for a relationship delta.
///
/// Namespaced as `"{speaker}:{key}"` only in multi-party conversations
/// when the speaker is known.
pub fn relationship_key(
    delta: &RelationshipDelta,
    speaker: Option<&str>,
    is_multi_party: bool,
) -> String {
    let key = delta.ledger_key();
    match speaker.filter(|s| is_multi_party && !s.trim().is_empty()) {
        Some(speaker) => format!("{speaker}:{key}"),
        None => key.to_string(),
    }
}

/// Apply one relationship change to the ledger entry at `key`, creating it
/// at level 0 on first use.
pub fn update_relationship(
    store: &mut MemoryStore,
    key: String,
    delta: &RelationshipDelta,
    speaker: Option<&str>,
    now: DateTime<Utc>,
) {
    let entry = store.relationships.entry(key).or_insert_with(|| {
        RelationshipEntry::new(speaker.map(str::to_string), delta.kind.clone(), now)
    });
    entry.apply(delta.change, now);
}

/// Record an emotion for `speaker` (or the default key) and re-apply decay.
pub fn update_emotional_state(
    store: &mut MemoryStore,
    emotion: &str,
    speaker: Option<&str>,
    now: DateTime<Utc>,
) {
    let key = speaker
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(DEFAULT_EMOTION_KEY)
        .to_string();
    store
        .emotional_states
        .entry(key)
        .or_insert_with(|| EmotionalState::new(emotion, speaker.map(str::to_string)))
        .record_at(emotion, now);
}

//! Store-level operations: load, export, manual entry and fact import.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use rapport_types::error::AnalysisError;
use rapport_types::memory::{
    Memory, MemorySource, RelationshipChange, RelationshipDelta, UNANCHORED_MESSAGE_INDEX,
};
use rapport_types::store::{Conversation, ExportEnvelope, MemoryStore};
use rapport_types::timeline::TimelineEvent;

use super::aggregator::Aggregator;
use super::parser::normalize_importance;

/// Importance given to manual memories when none is supplied.
pub const DEFAULT_MANUAL_IMPORTANCE: f64 = 0.7;

/// Keyword given to manual memories when none are supplied.
pub const MANUAL_KEYWORD: &str = "manual";

/// Emotion recorded for imported facts.
pub const FACT_EMOTION: &str = "factual";

/// Tags appended to the keywords of every imported fact.
pub const FACT_TAGS: [&str; 2] = ["lorebook", "imported"];

/// Imported fact text longer than this is truncated in the summary.
const FACT_SUMMARY_CHARS: usize = 200;

/// Interpret a persisted blob as a store, or start a fresh one.
///
/// A blob missing any of the four primary collections is not well-formed
/// and is replaced. The per-speaker partition is materialized only when
/// `partitioned` is set.
pub fn load(existing: Option<serde_json::Value>, partitioned: bool) -> MemoryStore {
    let mut store = match existing.map(serde_json::from_value::<MemoryStore>) {
        Some(Ok(store)) => store,
        Some(Err(e)) => {
            tracing::warn!(error = %e, "Stored memory blob is malformed; starting fresh");
            MemoryStore::new()
        }
        None => MemoryStore::new(),
    };
    if partitioned {
        store.per_speaker_memories.get_or_insert_with(Default::default);
    }
    store
}

/// Wrap a store in the one-directional export envelope.
pub fn export(store: &MemoryStore, conversation: &Conversation, at: DateTime<Utc>) -> ExportEnvelope {
    ExportEnvelope::new(store, conversation, at)
}

/// Fields for a memory entered by hand.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualMemoryInput {
    pub summary: String,
    #[serde(default)]
    pub importance: Option<f64>,
    #[serde(default)]
    pub emotion: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub continuity_note: Option<String>,
    #[serde(default)]
    pub relationship_type: Option<String>,
    #[serde(default)]
    pub relationship_change: RelationshipChange,
    #[serde(default)]
    pub between: Option<String>,
    #[serde(default)]
    pub speaker: Option<String>,
}

impl ManualMemoryInput {
    pub fn new(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            ..Default::default()
        }
    }

    /// Normalize into a memory stamped at `now`.
    ///
    /// A relationship is attached only when a type is given and the change
    /// is not neutral.
    pub fn into_memory(self, now: DateTime<Utc>) -> Result<Memory, AnalysisError> {
        let summary = self.summary.trim().to_string();
        if summary.is_empty() {
            return Err(AnalysisError::InvalidInput(
                "summary must not be empty".to_string(),
            ));
        }

        let keywords: Vec<String> = self
            .keywords
            .into_iter()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();

        let relationship = non_blank(self.relationship_type)
            .filter(|_| self.relationship_change != RelationshipChange::Neutral)
            .map(|kind| RelationshipDelta {
                kind: Some(kind),
                change: self.relationship_change,
                between: non_blank(self.between),
            });

        Ok(Memory {
            summary,
            importance: self
                .importance
                .map(normalize_importance)
                .unwrap_or(DEFAULT_MANUAL_IMPORTANCE),
            emotion: non_blank(self.emotion).unwrap_or_else(|| "neutral".to_string()),
            keywords: if keywords.is_empty() {
                vec![MANUAL_KEYWORD.to_string()]
            } else {
                keywords
            },
            continuity_note: non_blank(self.continuity_note).unwrap_or_default(),
            relationship,
            timestamp: now,
            source: MemorySource::Manual,
            speaker: non_blank(self.speaker),
            message_index: UNANCHORED_MESSAGE_INDEX,
        })
    }
}

/// Add a hand-entered memory through the aggregation path (no extraction).
///
/// The store is not trimmed, so the new memory survives even when the store
/// is already at its retention bound. The next extraction or batch run
/// trims it.
pub fn add_manual(
    store: &mut MemoryStore,
    input: ManualMemoryInput,
    aggregator: &Aggregator,
    now: DateTime<Utc>,
) -> Result<Memory, AnalysisError> {
    let memory = input.into_memory(now)?;
    aggregator.record(store, memory.clone(), now, now);
    Ok(memory)
}

/// An external fact (e.g. a world-info entry) to import as a memory.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ExternalFact {
    #[serde(default, alias = "content", alias = "description")]
    pub text: String,
    #[serde(default, alias = "key")]
    pub keys: Vec<String>,
    #[serde(default, alias = "comment", alias = "title")]
    pub label: Option<String>,
}

/// Import facts as lorebook memories at a fixed importance.
///
/// Facts carry no relationship or emotion payload, so only `memories` and
/// `timeline` change; the store is not trimmed. Returns the count imported.
pub fn import_facts(
    store: &mut MemoryStore,
    facts: &[ExternalFact],
    importance: f64,
    now: DateTime<Utc>,
) -> usize {
    let importance = normalize_importance(importance);

    for (position, fact) in facts.iter().enumerate() {
        let label = fact
            .label
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("Lorebook Entry {}", position + 1));

        let text = fact.text.trim();
        let mut excerpt: String = text.chars().take(FACT_SUMMARY_CHARS).collect();
        if text.chars().count() > FACT_SUMMARY_CHARS {
            excerpt.push_str("...");
        }

        let mut keywords = fact.keys.clone();
        keywords.extend(FACT_TAGS.iter().map(|t| t.to_string()));

        let memory = Memory {
            summary: format!("{label}: {excerpt}"),
            importance,
            emotion: FACT_EMOTION.to_string(),
            keywords,
            continuity_note: format!("Imported from World Info: {label}"),
            relationship: None,
            timestamp: now,
            source: MemorySource::Lorebook,
            speaker: None,
            message_index: UNANCHORED_MESSAGE_INDEX,
        };

        store.timeline.push(TimelineEvent {
            timestamp: now,
            message_index: UNANCHORED_MESSAGE_INDEX,
            summary: label,
            importance,
            speaker: None,
        });
        store.memories.push(memory);
    }

    facts.len()
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

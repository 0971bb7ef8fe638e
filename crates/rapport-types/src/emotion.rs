//! Emotional state tracking.
//!
//! Each state keeps the current mood label and a history that only retains
//! entries newer than one hour. Decay is a pure function of wall-clock time
//! re-applied on every mutation, not a scheduled task.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Key used when a memory carries no speaker.
pub const DEFAULT_EMOTION_KEY: &str = "general";

/// History entries at least this old are dropped on the next update.
pub fn decay_window() -> Duration {
    Duration::hours(1)
}

/// One recorded emotion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionRecord {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    pub emotion: String,
}

/// Current mood plus time-decayed history for one participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmotionalState {
    pub current: String,
    #[serde(default)]
    pub history: Vec<EmotionRecord>,
    #[serde(
        default,
        alias = "characterName",
        skip_serializing_if = "Option::is_none"
    )]
    pub speaker: Option<String>,
}

impl EmotionalState {
    pub fn new(current: impl Into<String>, speaker: Option<String>) -> Self {
        Self {
            current: current.into(),
            history: Vec::new(),
            speaker,
        }
    }

    /// Record an emotion at `now`, make it current and re-apply decay.
    pub fn record_at(&mut self, emotion: impl Into<String>, now: DateTime<Utc>) {
        let emotion = emotion.into();
        self.history.push(EmotionRecord {
            timestamp: now,
            emotion: emotion.clone(),
        });
        self.current = emotion;
        self.decay(now);
    }

    /// Drop history entries that are an hour old or older relative to `now`.
    pub fn decay(&mut self, now: DateTime<Utc>) {
        let window = decay_window();
        self.history.retain(|entry| now - entry.timestamp < window);
    }
}

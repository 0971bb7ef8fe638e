//! Relationship ledger types.
//!
//! A ledger entry is a running signed score in [-1, 1] tracking the trend of
//! one relationship dimension. Entries are never deleted and their history is
//! never trimmed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use std::fmt;

use crate::memory::RelationshipChange;

pub const LEVEL_MIN: f64 = -1.0;
pub const LEVEL_MAX: f64 = 1.0;

/// Levels above this are shown as positive, below its negation as negative.
const BAND_THRESHOLD: f64 = 0.3;

/// One recorded change in a ledger entry's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipChangeRecord {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    pub change: RelationshipChange,
}

/// Coarse classification of a ledger level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelBand {
    Positive,
    Neutral,
    Negative,
}

impl fmt::Display for LevelBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LevelBand::Positive => write!(f, "positive"),
            LevelBand::Neutral => write!(f, "neutral"),
            LevelBand::Negative => write!(f, "negative"),
        }
    }
}

/// A relationship ledger entry keyed by `(speaker?, relationship key)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipEntry {
    pub level: f64,
    #[serde(default)]
    pub history: Vec<RelationshipChangeRecord>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_update: DateTime<Utc>,
    #[serde(
        default,
        alias = "characterName",
        skip_serializing_if = "Option::is_none"
    )]
    pub speaker: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationship_type: Option<String>,
}

impl RelationshipEntry {
    /// Create an entry at level 0.
    pub fn new(
        speaker: Option<String>,
        relationship_type: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            level: 0.0,
            history: Vec::new(),
            last_update: now,
            speaker,
            relationship_type,
        }
    }

    /// Record a change: append history, step the level and clamp it.
    pub fn apply(&mut self, change: RelationshipChange, now: DateTime<Utc>) {
        self.history.push(RelationshipChangeRecord {
            timestamp: now,
            change,
        });
        self.level = (self.level + change.step()).clamp(LEVEL_MIN, LEVEL_MAX);
        self.last_update = now;
    }

    pub fn band(&self) -> LevelBand {
        if self.level > BAND_THRESHOLD {
            LevelBand::Positive
        } else if self.level < -BAND_THRESHOLD {
            LevelBand::Negative
        } else {
            LevelBand::Neutral
        }
    }

    /// The last `n` history records, newest first.
    pub fn recent_changes(&self, n: usize) -> impl Iterator<Item = &RelationshipChangeRecord> {
        self.history.iter().rev().take(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_clamps_at_upper_bound() {
        let now = Utc::now();
        let mut entry = RelationshipEntry::new(None, Some("trust".to_string()), now);
        for _ in 0..50 {
            entry.apply(RelationshipChange::Improved, now);
        }
        assert_eq!(entry.level, 1.0);
        assert_eq!(entry.history.len(), 50);
    }

    #[test]
    fn test_level_clamps_at_lower_bound() {
        let now = Utc::now();
        let mut entry = RelationshipEntry::new(None, None, now);
        for _ in 0..25 {
            entry.apply(RelationshipChange::Worsened, now);
            assert!(entry.level >= LEVEL_MIN && entry.level <= LEVEL_MAX);
        }
        assert_eq!(entry.level, -1.0);
    }

    #[test]
    fn test_neutral_change_keeps_level_but_records_history() {
        let now = Utc::now();
        let mut entry = RelationshipEntry::new(None, None, now);
        entry.apply(RelationshipChange::Improved, now);
        entry.apply(RelationshipChange::Neutral, now);
        assert!((entry.level - 0.1).abs() < 1e-9);
        assert_eq!(entry.history.len(), 2);
    }

    #[test]
    fn test_band_thresholds() {
        let now = Utc::now();
        let mut entry = RelationshipEntry::new(None, None, now);
        assert_eq!(entry.band(), LevelBand::Neutral);
        entry.level = 0.31;
        assert_eq!(entry.band(), LevelBand::Positive);
        entry.level = -0.5;
        assert_eq!(entry.band(), LevelBand::Negative);
    }

    #[test]
    fn test_recent_changes_newest_first() {
        let now = Utc::now();
        let mut entry = RelationshipEntry::new(None, None, now);
        entry.apply(RelationshipChange::Improved, now);
        entry.apply(RelationshipChange::Worsened, now);
        entry.apply(RelationshipChange::Neutral, now);
        let changes: Vec<_> = entry.recent_changes(2).map(|r| r.change).collect();
        assert_eq!(
            changes,
            vec![RelationshipChange::Neutral, RelationshipChange::Worsened]
        );
    }
}

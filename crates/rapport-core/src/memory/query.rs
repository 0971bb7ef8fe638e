//! Read-side views over a memory store.
//!
//! Pure functions; none of them mutate the store.

use rapport_types::memory::Memory;
use rapport_types::timeline::TimelineEvent;

/// Memories ordered most recent first. Accepts a whole list or a filtered
/// selection.
pub fn recent_first<'a>(memories: impl IntoIterator<Item = &'a Memory>) -> Vec<&'a Memory> {
    let mut sorted: Vec<&Memory> = memories.into_iter().collect();
    sorted.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    sorted
}

/// Case-insensitive substring search over the displayed memory text:
/// summary, emotion, keywords, continuity note and speaker.
pub fn search<'a>(memories: &'a [Memory], term: &str) -> Vec<&'a Memory> {
    let term = term.trim().to_lowercase();
    memories
        .iter()
        .filter(|m| term.is_empty() || matches_term(m, &term))
        .collect()
}

fn matches_term(memory: &Memory, term: &str) -> bool {
    let contains = |s: &str| s.to_lowercase().contains(term);
    contains(memory.summary.as_str())
        || contains(memory.emotion.as_str())
        || contains(memory.continuity_note.as_str())
        || memory.keywords.iter().any(|k| contains(k.as_str()))
        || memory.speaker.as_deref().is_some_and(contains)
}

/// Memories whose emotion contains `emotion` (case-insensitive). An empty
/// filter matches everything.
pub fn filter_by_emotion<'a>(memories: &'a [Memory], emotion: &str) -> Vec<&'a Memory> {
    let emotion = emotion.trim().to_lowercase();
    memories
        .iter()
        .filter(|m| emotion.is_empty() || m.emotion.to_lowercase().contains(&emotion))
        .collect()
}

/// Timeline events in ascending timestamp order.
pub fn chronological(timeline: &[TimelineEvent]) -> Vec<&TimelineEvent> {
    let mut sorted: Vec<&TimelineEvent> = timeline.iter().collect();
    sorted.sort_by_key(|e| e.timestamp);
    sorted
}

/// Importance as a 0-5 star count.
pub fn star_rating(importance: f64) -> u8 {
    (importance.clamp(0.0, 1.0) * 5.0).ceil() as u8
}

/// Relationship level in [-1, 1] as a whole percentage.
pub fn level_percent(level: f64) -> i64 {
    (level * 100.0).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use rapport_types::memory::MemorySource;

    fn at(ms: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(ms).unwrap()
    }

    fn memory(summary: &str, emotion: &str, ms: i64) -> Memory {
        Memory {
            summary: summary.to_string(),
            importance: 0.5,
            emotion: emotion.to_string(),
            keywords: vec!["harbor".to_string()],
            continuity_note: String::new(),
            relationship: None,
            timestamp: at(ms),
            source: MemorySource::Character,
            speaker: Some("Ann".to_string()),
            message_index: 0,
        }
    }

    fn sample() -> Vec<Memory> {
        vec![
            memory("First meeting", "Curious", 1_000),
            memory("The argument", "angry", 3_000),
            memory("Apology", "remorseful", 2_000),
        ]
    }

    #[test]
    fn recent_first_orders_by_timestamp_desc() {
        let memories = sample();
        let order: Vec<_> = recent_first(&memories).iter().map(|m| m.summary.as_str()).collect();
        assert_eq!(order, vec!["The argument", "Apology", "First meeting"]);
    }

    #[test]
    fn search_is_case_insensitive_across_fields() {
        let memories = sample();
        assert_eq!(search(&memories, "ARGUMENT").len(), 1);
        assert_eq!(search(&memories, "curious").len(), 1);
        assert_eq!(search(&memories, "harbor").len(), 3);
        assert_eq!(search(&memories, "ann").len(), 3);
        assert_eq!(search(&memories, "").len(), 3);
        assert!(search(&memories, "dragon").is_empty());
    }

    #[test]
    fn emotion_filter_matches_substring() {
        let memories = sample();
        assert_eq!(filter_by_emotion(&memories, "ANG").len(), 1);
        assert_eq!(filter_by_emotion(&memories, "").len(), 3);
        assert!(filter_by_emotion(&memories, "joy").is_empty());
    }

    #[test]
    fn chronological_sorts_ascending() {
        let events: Vec<TimelineEvent> = sample()
            .iter()
            .map(|m| TimelineEvent::from_memory(m, m.timestamp))
            .collect();
        let order: Vec<_> = chronological(&events).iter().map(|e| e.summary.as_str()).collect();
        assert_eq!(order, vec!["First meeting", "Apology", "The argument"]);
    }

    #[test]
    fn star_rating_rounds_up() {
        assert_eq!(star_rating(0.0), 0);
        assert_eq!(star_rating(0.1), 1);
        assert_eq!(star_rating(0.6), 3);
        assert_eq!(star_rating(1.0), 5);
    }

    #[test]
    fn level_percent_rounds() {
        assert_eq!(level_percent(0.3), 30);
        assert_eq!(level_percent(-1.0), -100);
    }
}

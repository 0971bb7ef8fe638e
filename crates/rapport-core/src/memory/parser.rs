//! Two-stage parsing of generated extraction output.
//!
//! Stage one locates the first well-formed JSON object in the text and reads
//! the extraction fields from it. Stage two scans lines for field markers
//! when no usable object exists. Both stages yield a [`PartialMemory`];
//! [`PartialMemory::finalize`] applies defaults and discards empty results.

use serde_json::{Map, Value};
use thiserror::Error;

use rapport_types::memory::{NO_MEMORY_SENTINEL, PLACEHOLDER_KEYWORD, RelationshipDelta};

/// Importance used when extraction yields none.
pub const DEFAULT_IMPORTANCE: f64 = 0.5;

/// Emotion used when extraction yields none.
pub const DEFAULT_EMOTION: &str = "neutral";

/// Length of the summary synthesized from the source message.
const SYNTHESIZED_SUMMARY_CHARS: usize = 100;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("no JSON object found in generated text")]
    NoObject,

    #[error("JSON object has no summary field")]
    MissingSummary,

    #[error("no usable summary could be recovered")]
    NoUsableSummary,
}

/// Extraction fields recovered from generated text, before defaulting.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialMemory {
    pub summary: Option<String>,
    pub importance: Option<f64>,
    pub emotion: Option<String>,
    pub keywords: Option<Vec<String>>,
    pub continuity_note: Option<String>,
    pub relationship: Option<RelationshipDelta>,
}

/// Validated extraction fields with defaults applied.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedFields {
    pub summary: String,
    pub importance: f64,
    pub emotion: String,
    pub keywords: Vec<String>,
    pub continuity_note: String,
    pub relationship: Option<RelationshipDelta>,
}

impl PartialMemory {
    /// Apply defaults. `None` when the summary is empty or the "none" sentinel.
    pub fn finalize(self) -> Option<ExtractedFields> {
        let summary = self.summary.map(|s| s.trim().to_string())?;
        if summary.is_empty() || summary.eq_ignore_ascii_case(NO_MEMORY_SENTINEL) {
            return None;
        }

        let emotion = self
            .emotion
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty())
            .unwrap_or_else(|| DEFAULT_EMOTION.to_string());

        let keywords = self
            .keywords
            .map(|ks| {
                ks.into_iter()
                    .map(|k| k.trim().to_string())
                    .filter(|k| !k.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|ks| !ks.is_empty())
            .unwrap_or_else(|| vec![PLACEHOLDER_KEYWORD.to_string()]);

        Some(ExtractedFields {
            summary,
            importance: self
                .importance
                .map(normalize_importance)
                .unwrap_or(DEFAULT_IMPORTANCE),
            emotion,
            keywords,
            continuity_note: self.continuity_note.unwrap_or_default().trim().to_string(),
            relationship: self.relationship,
        })
    }
}

/// Map a raw importance onto [0, 1]. Values above 1 are read as a 0-10 scale.
pub fn normalize_importance(raw: f64) -> f64 {
    if raw.is_nan() {
        return DEFAULT_IMPORTANCE;
    }
    let scaled = if raw > 1.0 { raw / 10.0 } else { raw };
    scaled.clamp(0.0, 1.0)
}

/// Parse generated text, falling back to line scanning when no usable
/// object is present. `None` means no memory should be recorded.
pub fn parse_generated(text: &str, source_message: &str) -> Option<ExtractedFields> {
    match parse_structured(text) {
        Ok(partial) => partial.finalize(),
        Err(e) => {
            tracing::warn!(
                error = %e,
                content_preview = %preview(text),
                "Structured parse of extraction output failed; using line fallback"
            );
            match parse_heuristic(text, source_message) {
                Ok(partial) => partial.finalize(),
                Err(e) => {
                    tracing::warn!(error = %e, "Line fallback recovered nothing");
                    None
                }
            }
        }
    }
}

/// Stage one: read the first well-formed object-shaped substring.
///
/// Tolerates surrounding prose, code fences and stray braces.
pub fn parse_structured(text: &str) -> Result<PartialMemory, ParseError> {
    let object = first_json_object(text).ok_or(ParseError::NoObject)?;
    let summary = object
        .get("summary")
        .and_then(Value::as_str)
        .ok_or(ParseError::MissingSummary)?;

    Ok(PartialMemory {
        summary: Some(summary.to_string()),
        importance: object.get("importance").and_then(number_like),
        emotion: object
            .get("emotion")
            .and_then(Value::as_str)
            .map(str::to_string),
        keywords: object.get("keywords").and_then(string_list),
        continuity_note: object
            .get("continuityNote")
            .or_else(|| object.get("continuity_note"))
            .and_then(Value::as_str)
            .map(str::to_string),
        relationship: object
            .get("relationship")
            .filter(|v| v.is_object())
            .and_then(|v| serde_json::from_value::<RelationshipDelta>(v.clone()).ok()),
    })
}

/// Stage two: scan lines for field markers and take the text after a colon.
///
/// Without a recoverable summary the source message, truncated to 100
/// characters, stands in for one.
pub fn parse_heuristic(text: &str, source_message: &str) -> Result<PartialMemory, ParseError> {
    let mut partial = PartialMemory::default();

    for line in text.lines() {
        let lower = line.to_lowercase();
        let Some(value) = after_colon(line) else {
            continue;
        };

        if lower.contains("summary") {
            if partial.summary.is_none() && !value.is_empty() {
                partial.summary = Some(value.to_string());
            }
        } else if lower.contains("importance") {
            if partial.importance.is_none() {
                partial.importance = first_number(value);
            }
        } else if lower.contains("emotion") {
            if partial.emotion.is_none() && !value.is_empty() {
                partial.emotion = Some(value.to_string());
            }
        } else if lower.contains("keyword") {
            if partial.keywords.is_none() {
                let keywords: Vec<String> = value
                    .split(',')
                    .map(|k| clean(k).to_string())
                    .filter(|k| !k.is_empty())
                    .collect();
                if !keywords.is_empty() {
                    partial.keywords = Some(keywords);
                }
            }
        } else if (lower.contains("continuity") || lower.contains("remember"))
            && partial.continuity_note.is_none()
            && !value.is_empty()
        {
            partial.continuity_note = Some(value.to_string());
        }
    }

    if partial.summary.is_none() {
        let synthesized: String = source_message
            .trim()
            .chars()
            .take(SYNTHESIZED_SUMMARY_CHARS)
            .collect();
        if synthesized.is_empty() {
            return Err(ParseError::NoUsableSummary);
        }
        partial.summary = Some(synthesized);
    }

    Ok(partial)
}

fn first_json_object(text: &str) -> Option<Map<String, Value>> {
    text.match_indices('{').find_map(|(start, _)| {
        let mut stream = serde_json::Deserializer::from_str(&text[start..]).into_iter::<Value>();
        match stream.next() {
            Some(Ok(Value::Object(map))) => Some(map),
            _ => None,
        }
    })
}

fn number_like(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => first_number(s),
        _ => None,
    }
}

fn string_list(value: &Value) -> Option<Vec<String>> {
    value.as_array().map(|items| {
        items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect()
    })
}

fn after_colon(line: &str) -> Option<&str> {
    line.split_once(':').map(|(_, rest)| clean(rest))
}

/// Strip whitespace, quotes, markdown emphasis and trailing commas.
fn clean(s: &str) -> &str {
    s.trim()
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '*' || c == ',' || c.is_whitespace())
}

/// First decimal number in `s`, e.g. "8" in "8/10" or "0.75" in "~0.75".
fn first_number(s: &str) -> Option<f64> {
    let bytes = s.as_bytes();
    let start = bytes.iter().enumerate().position(|(i, b)| {
        b.is_ascii_digit() || (*b == b'.' && bytes.get(i + 1).is_some_and(u8::is_ascii_digit))
    })?;
    let len = s[start..]
        .bytes()
        .scan(false, |seen_dot, b| match b {
            b'0'..=b'9' => Some(()),
            b'.' if !*seen_dot => {
                *seen_dot = true;
                Some(())
            }
            _ => None,
        })
        .count();
    s[start..start + len].trim_end_matches('.').parse().ok()
}

fn preview(text: &str) -> String {
    text.chars().take(200).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rapport_types::memory::RelationshipChange;

    #[test]
    fn test_structured_parse_inside_code_fence() {
        let text = "Here you go:\n```json\n{\"summary\":\"They kissed.\",\"importance\":0.9,\"emotion\":\"romantic\",\"keywords\":[\"kiss\"]}\n```\nHope that helps!";
        let fields = parse_generated(text, "...").unwrap();
        assert_eq!(fields.summary, "They kissed.");
        assert_eq!(fields.importance, 0.9);
        assert_eq!(fields.emotion, "romantic");
        assert_eq!(fields.keywords, vec!["kiss"]);
    }

    #[test]
    fn test_none_sentinel_is_discarded() {
        let text = r#"{"summary":"none","importance":0,"emotion":"neutral","keywords":[]}"#;
        assert!(parse_generated(text, "Hello").is_none());
    }

    #[test]
    fn test_stray_brace_before_object_is_skipped() {
        let text = r#"Use {curly} notes. {"summary": "Ann lied about the key", "importance": 7}"#;
        let partial = parse_structured(text).unwrap();
        assert_eq!(partial.summary.as_deref(), Some("Ann lied about the key"));
        assert_eq!(partial.finalize().unwrap().importance, 0.7);
    }

    #[test]
    fn test_defaults_applied_for_missing_fields() {
        let fields = parse_generated(r#"{"summary": "A storm rolled in"}"#, "").unwrap();
        assert_eq!(fields.importance, DEFAULT_IMPORTANCE);
        assert_eq!(fields.emotion, "neutral");
        assert_eq!(fields.keywords, vec!["memory"]);
        assert_eq!(fields.continuity_note, "");
        assert!(fields.relationship.is_none());
    }

    #[test]
    fn test_non_sequence_keywords_use_placeholder() {
        let fields =
            parse_generated(r#"{"summary": "x happened", "keywords": "kiss, hug"}"#, "").unwrap();
        assert_eq!(fields.keywords, vec!["memory"]);
    }

    #[test]
    fn test_relationship_and_continuity_are_read() {
        let text = r#"{
            "summary": "Bo forgave Ann",
            "importance": 0.8,
            "emotion": "relieved",
            "keywords": ["forgiveness"],
            "relationship": {"type": "trust", "change": "improved", "between": "Ann and Bo"},
            "continuityNote": "Bo still keeps the letter"
        }"#;
        let fields = parse_generated(text, "").unwrap();
        let rel = fields.relationship.unwrap();
        assert_eq!(rel.kind.as_deref(), Some("trust"));
        assert_eq!(rel.change, RelationshipChange::Improved);
        assert_eq!(rel.between.as_deref(), Some("Ann and Bo"));
        assert_eq!(fields.continuity_note, "Bo still keeps the letter");
    }

    #[test]
    fn test_object_without_summary_falls_back_to_lines() {
        assert_eq!(
            parse_structured(r#"{"importance": 0.4}"#),
            Err(ParseError::MissingSummary)
        );
    }

    #[test]
    fn test_heuristic_rescales_ten_point_importance() {
        let text = "Summary: The duel was postponed\nImportance: 8\nEmotion: tense\nKeywords: duel, delay";
        let fields = parse_generated(text, "irrelevant").unwrap();
        assert_eq!(fields.summary, "The duel was postponed");
        assert_eq!(fields.importance, 0.8);
        assert_eq!(fields.emotion, "tense");
        assert_eq!(fields.keywords, vec!["duel", "delay"]);
    }

    #[test]
    fn test_heuristic_reads_markdown_and_continuity() {
        let text = "**Summary:** Ann found the map\n**Importance:** 0.65\n- Remember: the map is torn";
        let partial = parse_heuristic(text, "").unwrap();
        assert_eq!(partial.summary.as_deref(), Some("Ann found the map"));
        assert_eq!(partial.importance, Some(0.65));
        assert_eq!(partial.continuity_note.as_deref(), Some("the map is torn"));
    }

    #[test]
    fn test_heuristic_synthesizes_summary_from_message() {
        let message = "a".repeat(150);
        let partial = parse_heuristic("Importance: 8", &message).unwrap();
        assert_eq!(partial.summary.unwrap().chars().count(), 100);
        assert_eq!(partial.importance, Some(8.0));
    }

    #[test]
    fn test_heuristic_without_summary_or_message_fails() {
        assert_eq!(
            parse_heuristic("nothing useful", "   "),
            Err(ParseError::NoUsableSummary)
        );
    }

    #[test]
    fn test_normalize_importance() {
        assert_eq!(normalize_importance(0.3), 0.3);
        assert_eq!(normalize_importance(8.0), 0.8);
        assert_eq!(normalize_importance(25.0), 1.0);
        assert_eq!(normalize_importance(-0.4), 0.0);
        assert_eq!(normalize_importance(f64::NAN), DEFAULT_IMPORTANCE);
    }

    #[test]
    fn test_first_number() {
        assert_eq!(first_number("8/10"), Some(8.0));
        assert_eq!(first_number("about .75 maybe"), Some(0.75));
        assert_eq!(first_number("7."), Some(7.0));
        assert_eq!(first_number("high"), None);
    }
}

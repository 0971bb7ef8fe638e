//! Chat message records consumed from the host's message source.
//!
//! Field names follow the host transcript format (`mes`, `is_user`, `name`,
//! `send_date`); `text` and `content` are accepted for the message body.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::memory::MemorySource;

/// One message in the conversation's ordered message source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(rename = "mes", alias = "text", alias = "content")]
    pub content: String,
    #[serde(default)]
    pub is_user: bool,
    /// Participant name, when the host recorded one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Original send time (epoch millis or RFC 3339 string on input).
    #[serde(
        default,
        deserialize_with = "deserialize_send_date",
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_send_date"
    )]
    pub send_date: Option<DateTime<Utc>>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_user: true,
            name: None,
            send_date: None,
        }
    }

    pub fn character(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_user: false,
            name: Some(name.into()),
            send_date: None,
        }
    }

    pub fn with_send_date(mut self, send_date: DateTime<Utc>) -> Self {
        self.send_date = Some(send_date);
        self
    }

    pub fn source(&self) -> MemorySource {
        if self.is_user {
            MemorySource::User
        } else {
            MemorySource::Character
        }
    }

    /// Speaker name: the recorded name, else the given role label.
    pub fn speaker_or<'a>(&'a self, user_label: &'a str, character_label: &'a str) -> &'a str {
        match self.name.as_deref().filter(|n| !n.trim().is_empty()) {
            Some(name) => name,
            None if self.is_user => user_label,
            None => character_label,
        }
    }
}

fn serialize_send_date<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match value {
        Some(dt) => serializer.serialize_i64(dt.timestamp_millis()),
        None => serializer.serialize_none(),
    }
}

fn deserialize_send_date<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(serde_json::Value::Number(n)) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        Some(serde_json::Value::String(s)) => DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok(),
        _ => None,
    })
}

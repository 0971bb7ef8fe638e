//! Loaders for the message source and external fact lists.
//!
//! Transcripts are either a JSON array of messages or JSONL with one message
//! per line. JSONL chat exports commonly start with a metadata header line;
//! lines without a message body are skipped.
//!
//! Fact lists are either a JSON array of facts or a world-info style object
//! whose `entries` field is an array or an id-keyed map.

use std::path::{Path, PathBuf};

use thiserror::Error;

use rapport_core::memory::store::ExternalFact;
use rapport_types::message::ChatMessage;

/// Message body keys accepted on a transcript record.
const BODY_KEYS: [&str; 3] = ["mes", "text", "content"];

#[derive(Debug, Error)]
pub enum TranscriptError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid record on line {line}: {message}")]
    InvalidRecord { line: usize, message: String },

    #[error("invalid document: {0}")]
    InvalidDocument(String),
}

/// Read and parse a transcript file.
pub async fn load_transcript(path: &Path) -> Result<Vec<ChatMessage>, TranscriptError> {
    let content = read(path).await?;
    let messages = parse_transcript(&content)?;
    tracing::debug!(path = %path.display(), messages = messages.len(), "Loaded transcript");
    Ok(messages)
}

/// Parse transcript text as a JSON array, falling back to JSONL.
pub fn parse_transcript(content: &str) -> Result<Vec<ChatMessage>, TranscriptError> {
    if content.trim_start().starts_with('[') {
        return serde_json::from_str(content)
            .map_err(|e| TranscriptError::InvalidDocument(e.to_string()));
    }

    let mut messages = Vec::new();
    for (i, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let value: serde_json::Value =
            serde_json::from_str(line).map_err(|e| TranscriptError::InvalidRecord {
                line: i + 1,
                message: e.to_string(),
            })?;
        if !BODY_KEYS.iter().any(|k| value.get(k).is_some()) {
            tracing::debug!(line = i + 1, "Skipping transcript line without a message body");
            continue;
        }
        let message = serde_json::from_value(value).map_err(|e| TranscriptError::InvalidRecord {
            line: i + 1,
            message: e.to_string(),
        })?;
        messages.push(message);
    }
    Ok(messages)
}

/// Read and parse a fact list file.
pub async fn load_facts(path: &Path) -> Result<Vec<ExternalFact>, TranscriptError> {
    let content = read(path).await?;
    parse_facts(&content)
}

/// Parse a fact list. Map-shaped `entries` are ordered by key, numerically
/// when the keys are numbers.
pub fn parse_facts(content: &str) -> Result<Vec<ExternalFact>, TranscriptError> {
    let value: serde_json::Value = serde_json::from_str(content)
        .map_err(|e| TranscriptError::InvalidDocument(e.to_string()))?;

    let items = match value {
        serde_json::Value::Array(items) => items,
        serde_json::Value::Object(mut object) => match object.remove("entries") {
            Some(serde_json::Value::Array(items)) => items,
            Some(serde_json::Value::Object(map)) => {
                let mut keyed: Vec<_> = map.into_iter().collect();
                keyed.sort_by(|(a, _), (b, _)| match (a.parse::<u64>(), b.parse::<u64>()) {
                    (Ok(a), Ok(b)) => a.cmp(&b),
                    _ => a.cmp(b),
                });
                keyed.into_iter().map(|(_, v)| v).collect()
            }
            _ => {
                return Err(TranscriptError::InvalidDocument(
                    "expected an array of facts or an object with \"entries\"".to_string(),
                ));
            }
        },
        _ => {
            return Err(TranscriptError::InvalidDocument(
                "expected an array of facts or an object with \"entries\"".to_string(),
            ));
        }
    };

    items
        .into_iter()
        .map(|item| {
            serde_json::from_value(item).map_err(|e| TranscriptError::InvalidDocument(e.to_string()))
        })
        .collect()
}

async fn read(path: &Path) -> Result<String, TranscriptError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|source| TranscriptError::Io {
            path: path.to_path_buf(),
            source,
        })
}

//! Error types shared across the rapport crates: analysis, persistence and
//! configuration failures.

use thiserror::Error;

use crate::llm::GenerationError;

/// Errors reported by batch analysis and the tracker service.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("invalid range: start {start}, end {end}, {len} messages")]
    InvalidRange { start: usize, end: usize, len: usize },

    #[error("no messages to analyze")]
    NoMessages,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A generation call failed mid-range. Memories committed before the
    /// failing message stay in the store.
    #[error("analysis aborted at message {message_index} after {committed} new memories: {source}")]
    Aborted {
        message_index: usize,
        committed: usize,
        #[source]
        source: GenerationError,
    },

    #[error("persistence error: {0}")]
    Persistence(#[from] RepositoryError),
}

/// Errors from store persistence (used by trait definitions in rapport-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("io error: {0}")]
    Io(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("store not found")]
    NotFound,
}

/// Errors from configuration validation and loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("failed to parse config: {0}")]
    Parse(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_range_display() {
        let err = AnalysisError::InvalidRange {
            start: 4,
            end: 2,
            len: 10,
        };
        assert_eq!(err.to_string(), "invalid range: start 4, end 2, 10 messages");
    }

    #[test]
    fn test_aborted_display_includes_source() {
        let err = AnalysisError::Aborted {
            message_index: 5,
            committed: 5,
            source: GenerationError::RateLimited {
                retry_after_ms: None,
            },
        };
        let text = err.to_string();
        assert!(text.contains("message 5"));
        assert!(text.contains("rate limited"));
    }

    #[test]
    fn test_repository_error_converts_into_analysis_error() {
        let err: AnalysisError = RepositoryError::Io("disk full".to_string()).into();
        assert_eq!(err.to_string(), "persistence error: io error: disk full");
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::Invalid {
            field: "batch_size",
            reason: "must be greater than zero".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid value for 'batch_size': must be greater than zero"
        );
    }
}

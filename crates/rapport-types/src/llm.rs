//! Generation capability types for rapport.
//!
//! The external text-generation service is treated as an opaque
//! prompt -> text function. These types describe the optional output-shape
//! hint passed alongside the prompt and the errors an implementation may
//! report.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// JSON schema hint for structured output.
///
/// Implementations that support constrained decoding forward it to the
/// provider; others may ignore it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputJsonSchema {
    pub name: String,
    pub schema: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strict: Option<bool>,
}

/// Errors from a generation call.
#[derive(Debug, Clone, Error)]
pub enum GenerationError {
    #[error("provider error: {message}")]
    Provider { message: String },

    #[error("deserialization error: {0}")]
    Deserialization(String),

    #[error("rate limited (retry after {retry_after_ms:?}ms)")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

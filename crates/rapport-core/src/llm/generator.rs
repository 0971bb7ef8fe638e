//! TextGenerator trait definition.
//!
//! The external generation service is an opaque prompt -> text function.
//! Implementations live in rapport-infra (e.g., `OpenAiCompatGenerator`).

use rapport_types::llm::{GenerationError, OutputJsonSchema};

/// Trait for text generation backends.
///
/// `Ok(None)` means the service answered with nothing usable (no choices,
/// empty text). `Err` means the call itself failed.
pub trait TextGenerator: Send + Sync {
    /// Human-readable generator name (e.g., "openai-compatible").
    fn name(&self) -> &str;

    /// Generate text for `prompt`, optionally constrained by an output schema.
    fn generate(
        &self,
        prompt: &str,
        hint: Option<&OutputJsonSchema>,
    ) -> impl std::future::Future<Output = Result<Option<String>, GenerationError>> + Send;
}

//! Per-message memory extraction via the generation capability.
//!
//! `MemoryExtractor` builds a depth-scaled prompt, calls the generator
//! exactly once (no retries) and parses the output with the two-stage
//! parser. [`MemoryExtractor::extract`] never fails: generation and parse
//! failures are logged and surface as `None`. Batch analysis uses
//! [`MemoryExtractor::try_extract`] so a failed generation call can abort
//! the remaining range.

use chrono::Utc;

use rapport_types::config::TrackingDepth;
use rapport_types::llm::{GenerationError, OutputJsonSchema};
use rapport_types::memory::{Memory, MemorySource};

use crate::llm::TextGenerator;

use super::parser::parse_generated;
use super::prompt::{build_prompt, extraction_schema};

/// One message to extract a memory from.
#[derive(Debug, Clone)]
pub struct ExtractionRequest<'a> {
    pub message: &'a str,
    pub speaker: &'a str,
    pub source: MemorySource,
    pub is_multi_party: bool,
    /// Position of the message in its conversation.
    pub message_index: i64,
}

/// Turns messages into candidate memories through a [`TextGenerator`].
pub struct MemoryExtractor<G> {
    generator: G,
    depth: TrackingDepth,
    schema: OutputJsonSchema,
}

impl<G: TextGenerator> MemoryExtractor<G> {
    pub fn new(generator: G, depth: TrackingDepth) -> Self {
        Self {
            generator,
            depth,
            schema: extraction_schema(),
        }
    }

    pub fn depth(&self) -> TrackingDepth {
        self.depth
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    /// Extract a memory, swallowing every failure.
    pub async fn extract(&self, request: &ExtractionRequest<'_>) -> Option<Memory> {
        match self.try_extract(request).await {
            Ok(memory) => memory,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    message_index = request.message_index,
                    "Memory extraction failed; no memory recorded"
                );
                None
            }
        }
    }

    /// Extract a memory, reporting a failed generation call as `Err`.
    ///
    /// `Ok(None)` covers an empty response and output that parses to nothing
    /// worth remembering.
    #[tracing::instrument(
        name = "extract_memory",
        skip(self, request),
        fields(
            generator = %self.generator.name(),
            depth = %self.depth,
            message_index = request.message_index,
            speaker = %request.speaker,
        )
    )]
    pub async fn try_extract(
        &self,
        request: &ExtractionRequest<'_>,
    ) -> Result<Option<Memory>, GenerationError> {
        let prompt = build_prompt(
            request.message,
            request.speaker,
            request.is_multi_party,
            self.depth,
        );

        let output = self.generator.generate(&prompt, Some(&self.schema)).await?;

        let Some(text) = output.filter(|t| !t.trim().is_empty()) else {
            tracing::debug!("Generator returned no text; no memory recorded");
            return Ok(None);
        };

        let Some(fields) = parse_generated(&text, request.message) else {
            tracing::debug!("Extraction output held nothing worth remembering");
            return Ok(None);
        };

        let speaker = Some(request.speaker.trim())
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        Ok(Some(Memory {
            summary: fields.summary,
            importance: fields.importance,
            emotion: fields.emotion,
            keywords: fields.keywords,
            continuity_note: fields.continuity_note,
            relationship: fields.relationship,
            timestamp: Utc::now(),
            source: request.source,
            speaker,
            message_index: request.message_index,
        }))
    }
}

//! Retroactive analysis over a historical message range.
//!
//! Messages are processed strictly in index order, in batches, with a pause
//! between batches to rate-limit the generation service. A message that
//! already has a memory is skipped, which makes repeated runs over
//! overlapping ranges idempotent. A failed generation call abandons the
//! rest of the range; memories committed before it stay in the store.

use std::time::Duration;

use chrono::Utc;
use serde::Serialize;

use rapport_types::config::TrackerConfig;
use rapport_types::error::AnalysisError;
use rapport_types::message::ChatMessage;
use rapport_types::store::MemoryStore;

use crate::llm::TextGenerator;

use super::aggregator::Aggregator;
use super::extractor::{ExtractionRequest, MemoryExtractor};
use super::retention;

/// Pacing and labelling for batch analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOptions {
    pub batch_size: usize,
    pub inter_batch_delay: Duration,
    /// Speaker for user messages without a name.
    pub user_label: String,
    /// Speaker for character messages without a name.
    pub character_label: String,
}

impl BatchOptions {
    pub fn from_config(config: &TrackerConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            inter_batch_delay: Duration::from_millis(config.inter_batch_delay_ms),
            user_label: config.user_label.clone(),
            character_label: config.default_character.clone(),
        }
    }
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self::from_config(&TrackerConfig::default())
    }
}

/// Reported after every message of the range, skipped or not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchProgress {
    /// Messages handled so far; increases by one per report.
    pub processed: usize,
    pub total: usize,
    pub message_index: usize,
    pub created: usize,
}

/// Outcome of a completed range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub processed: usize,
    /// Messages that already had a memory.
    pub skipped: usize,
    pub created: usize,
    /// Memories removed by the final trim.
    pub dropped: usize,
    pub total_memories: usize,
}

/// Drives extraction and aggregation over `[start, end]` of a message list.
pub struct BatchAnalyzer<'a, G> {
    extractor: &'a MemoryExtractor<G>,
    aggregator: Aggregator,
    options: BatchOptions,
}

impl<'a, G: TextGenerator> BatchAnalyzer<'a, G> {
    pub fn new(
        extractor: &'a MemoryExtractor<G>,
        aggregator: Aggregator,
        options: BatchOptions,
    ) -> Self {
        Self {
            extractor,
            aggregator,
            options,
        }
    }

    /// Analyze messages `start..=end`, calling `on_progress` after each one.
    ///
    /// On success the timeline is re-sorted by timestamp and the store is
    /// trimmed once. On a generation failure the range is abandoned with
    /// [`AnalysisError::Aborted`] and the store keeps what was committed.
    #[tracing::instrument(
        name = "analyze_range",
        skip(self, store, messages, on_progress),
        fields(message_count = messages.len(), batch_size = self.options.batch_size)
    )]
    pub async fn analyze_range<F>(
        &self,
        store: &mut MemoryStore,
        messages: &[ChatMessage],
        start: usize,
        end: usize,
        mut on_progress: F,
    ) -> Result<BatchReport, AnalysisError>
    where
        F: FnMut(BatchProgress),
    {
        if messages.is_empty() {
            return Err(AnalysisError::NoMessages);
        }
        if start > end || end >= messages.len() {
            return Err(AnalysisError::InvalidRange {
                start,
                end,
                len: messages.len(),
            });
        }

        let total = end - start + 1;
        let batch_size = self.options.batch_size.max(1);
        let is_multi_party = self.aggregator.policy().is_multi_party;
        let mut report = BatchReport::default();

        let mut batch_start = start;
        while batch_start <= end {
            let batch_end = batch_start.saturating_add(batch_size - 1).min(end);

            for (index, message) in messages
                .iter()
                .enumerate()
                .take(batch_end + 1)
                .skip(batch_start)
            {
                let message_index = index as i64;

                if store.contains_message_index(message_index) {
                    report.skipped += 1;
                } else {
                    let request = ExtractionRequest {
                        message: &message.content,
                        speaker: message
                            .speaker_or(&self.options.user_label, &self.options.character_label),
                        source: message.source(),
                        is_multi_party,
                        message_index,
                    };

                    match self.extractor.try_extract(&request).await {
                        Ok(Some(mut memory)) => {
                            memory.message_index = message_index;
                            let timeline_at = message.send_date.unwrap_or_else(Utc::now);
                            self.aggregator.record(store, memory, timeline_at, Utc::now());
                            report.created += 1;
                        }
                        Ok(None) => {}
                        Err(source) => {
                            tracing::warn!(
                                error = %source,
                                message_index = index,
                                committed = report.created,
                                "Generation failed; abandoning remaining range"
                            );
                            return Err(AnalysisError::Aborted {
                                message_index: index,
                                committed: report.created,
                                source,
                            });
                        }
                    }
                }

                report.processed += 1;
                on_progress(BatchProgress {
                    processed: report.processed,
                    total,
                    message_index: index,
                    created: report.created,
                });
            }

            if batch_end < end && !self.options.inter_batch_delay.is_zero() {
                tokio::time::sleep(self.options.inter_batch_delay).await;
            }
            batch_start = batch_end + 1;
        }

        store.timeline.sort_by_key(|event| event.timestamp);
        report.dropped = retention::trim(store, self.aggregator.policy().max_entries);
        report.total_memories = store.memories.len();

        tracing::info!(
            processed = report.processed,
            created = report.created,
            skipped = report.skipped,
            total_memories = report.total_memories,
            "Range analysis complete"
        );
        Ok(report)
    }
}

//! Memory tracker service.
//!
//! Wires the extractor, aggregator and batch analyzer to a
//! [`StoreRepository`] and an [`EventBus`]. Every operation loads the
//! conversation's store, mutates it, persists it and publishes events.
//! Callers must not run two operations on the same conversation at once.

use chrono::{DateTime, Utc};

use rapport_types::config::{PartitionMode, TrackerConfig};
use rapport_types::error::AnalysisError;
use rapport_types::event::TrackerEvent;
use rapport_types::memory::Memory;
use rapport_types::message::ChatMessage;
use rapport_types::store::{Conversation, ExportEnvelope, MemoryStore};

use crate::event::EventBus;
use crate::llm::TextGenerator;
use crate::memory::aggregator::{AggregationPolicy, Aggregator};
use crate::memory::batch::{BatchAnalyzer, BatchOptions, BatchProgress, BatchReport};
use crate::memory::extractor::{ExtractionRequest, MemoryExtractor};
use crate::memory::store::{self, ExternalFact, ManualMemoryInput};
use crate::repository::StoreRepository;

/// Service owning the memory lifecycle of conversations.
///
/// Generic over the persistence and generation ports so rapport-core never
/// depends on rapport-infra.
pub struct MemoryTracker<R: StoreRepository, G: TextGenerator> {
    repository: R,
    extractor: MemoryExtractor<G>,
    config: TrackerConfig,
    events: EventBus,
}

impl<R: StoreRepository, G: TextGenerator> MemoryTracker<R, G> {
    pub fn new(repository: R, generator: G, config: TrackerConfig) -> Self {
        Self {
            repository,
            extractor: MemoryExtractor::new(generator, config.tracking_depth),
            config,
            events: EventBus::default(),
        }
    }

    /// Publish events on a shared bus instead of a private one.
    pub fn with_event_bus(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn extractor(&self) -> &MemoryExtractor<G> {
        &self.extractor
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    fn aggregator(&self, conversation: &Conversation) -> Aggregator {
        Aggregator::new(AggregationPolicy::from_config(
            &self.config,
            conversation.is_multi_party,
        ))
    }

    fn partitioned(&self, conversation: &Conversation) -> bool {
        conversation.is_multi_party && self.config.partition_mode == PartitionMode::PerParticipant
    }

    /// Load the conversation's store, or a fresh one if nothing usable is stored.
    pub async fn load_store(&self, conversation: &Conversation) -> Result<MemoryStore, AnalysisError> {
        let blob = self.repository.load(&conversation.id).await?;
        Ok(store::load(blob, self.partitioned(conversation)))
    }

    async fn persist(
        &self,
        conversation: &Conversation,
        store: &MemoryStore,
    ) -> Result<(), AnalysisError> {
        self.repository.save(&conversation.id, store).await?;
        Ok(())
    }

    fn announce(&self, conversation: &Conversation, memory: &Memory) {
        self.events.publish(TrackerEvent::MemoryAdded {
            conversation_id: conversation.id.clone(),
            message_index: memory.message_index,
            summary: memory.summary.clone(),
            importance: memory.importance,
        });

        if self.config.show_notifications && memory.is_significant() {
            tracing::info!(
                conversation_id = %conversation.id,
                speaker = memory.speaker.as_deref().unwrap_or_default(),
                importance = memory.importance,
                summary = %memory.summary,
                "New significant memory"
            );
            self.events.publish(TrackerEvent::SignificantMemory {
                conversation_id: conversation.id.clone(),
                summary: memory.summary.clone(),
                importance: memory.importance,
                speaker: memory.speaker.clone(),
            });
        }
    }

    /// Extract and record a memory for the newest message in `messages`.
    ///
    /// Returns `Ok(None)` when tracking is disabled, there is no message, the
    /// message already has a memory or nothing worth remembering was found.
    #[tracing::instrument(
        name = "handle_message",
        skip(self, conversation, messages),
        fields(conversation_id = %conversation.id, message_count = messages.len())
    )]
    pub async fn handle_message(
        &self,
        conversation: &Conversation,
        messages: &[ChatMessage],
    ) -> Result<Option<Memory>, AnalysisError> {
        if !self.config.enabled {
            tracing::debug!("Tracking disabled; message ignored");
            return Ok(None);
        }
        let Some(message) = messages.last() else {
            return Ok(None);
        };
        let message_index = (messages.len() - 1) as i64;

        let mut store = self.load_store(conversation).await?;
        if store.contains_message_index(message_index) {
            tracing::debug!(message_index, "Message already remembered; skipping");
            return Ok(None);
        }

        let request = ExtractionRequest {
            message: &message.content,
            speaker: message.speaker_or(&self.config.user_label, &self.config.default_character),
            source: message.source(),
            is_multi_party: conversation.is_multi_party,
            message_index,
        };
        let Some(memory) = self.extractor.extract(&request).await else {
            return Ok(None);
        };

        self.aggregator(conversation)
            .apply(&mut store, memory.clone(), Utc::now());
        self.persist(conversation, &store).await?;

        self.announce(conversation, &memory);
        Ok(Some(memory))
    }

    /// Record a hand-entered memory without calling the generator.
    #[tracing::instrument(name = "add_manual_memory", skip(self, conversation, input), fields(conversation_id = %conversation.id))]
    pub async fn add_manual(
        &self,
        conversation: &Conversation,
        input: ManualMemoryInput,
    ) -> Result<Memory, AnalysisError> {
        let mut store = self.load_store(conversation).await?;
        let memory = store::add_manual(
            &mut store,
            input,
            &self.aggregator(conversation),
            Utc::now(),
        )?;
        self.persist(conversation, &store).await?;

        self.announce(conversation, &memory);
        Ok(memory)
    }

    /// Import external facts as lorebook memories. Returns the count imported.
    #[tracing::instrument(name = "import_facts", skip(self, conversation, facts), fields(conversation_id = %conversation.id, fact_count = facts.len()))]
    pub async fn import_facts(
        &self,
        conversation: &Conversation,
        facts: &[ExternalFact],
        importance: f64,
    ) -> Result<usize, AnalysisError> {
        if facts.is_empty() {
            return Ok(0);
        }
        let mut store = self.load_store(conversation).await?;
        let imported = store::import_facts(&mut store, facts, importance, Utc::now());
        self.persist(conversation, &store).await?;

        tracing::info!(imported, "Imported facts");
        Ok(imported)
    }

    /// Analyze `messages[start..=end]`, skipping messages already remembered.
    pub async fn analyze_range(
        &self,
        conversation: &Conversation,
        messages: &[ChatMessage],
        start: usize,
        end: usize,
    ) -> Result<BatchReport, AnalysisError> {
        self.analyze_range_with_progress(conversation, messages, start, end, |_| {})
            .await
    }

    /// [`Self::analyze_range`] with a per-message progress callback.
    ///
    /// Progress is also published on the event bus. If a generation call
    /// fails mid-range, the memories committed so far are persisted before
    /// `Aborted` is returned; if that save fails, the persistence error is
    /// returned instead.
    pub async fn analyze_range_with_progress<F>(
        &self,
        conversation: &Conversation,
        messages: &[ChatMessage],
        start: usize,
        end: usize,
        mut on_progress: F,
    ) -> Result<BatchReport, AnalysisError>
    where
        F: FnMut(BatchProgress),
    {
        validate_range(messages.len(), start, end)?;

        let mut store = self.load_store(conversation).await?;
        let analyzer = BatchAnalyzer::new(
            &self.extractor,
            self.aggregator(conversation),
            BatchOptions::from_config(&self.config),
        );

        let result = analyzer
            .analyze_range(&mut store, messages, start, end, |progress| {
                self.events.publish(TrackerEvent::BatchProgress {
                    conversation_id: conversation.id.clone(),
                    processed: progress.processed,
                    total: progress.total,
                });
                on_progress(progress);
            })
            .await;

        match result {
            Ok(report) => {
                self.persist(conversation, &store).await?;
                self.events.publish(TrackerEvent::BatchCompleted {
                    conversation_id: conversation.id.clone(),
                    created: report.created,
                    skipped: report.skipped,
                    total_memories: report.total_memories,
                });
                Ok(report)
            }
            Err(AnalysisError::Aborted {
                message_index,
                committed,
                source,
            }) => {
                let saved = if committed > 0 {
                    self.persist(conversation, &store).await
                } else {
                    Ok(())
                };
                self.events.publish(TrackerEvent::BatchFailed {
                    conversation_id: conversation.id.clone(),
                    message_index,
                    error: source.to_string(),
                });
                if let Err(e) = saved {
                    tracing::error!(
                        error = %e,
                        committed,
                        "Failed to persist memories committed before abort"
                    );
                    return Err(e);
                }
                Err(AnalysisError::Aborted {
                    message_index,
                    committed,
                    source,
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Analyze the whole conversation.
    pub async fn analyze_all(
        &self,
        conversation: &Conversation,
        messages: &[ChatMessage],
    ) -> Result<BatchReport, AnalysisError> {
        if messages.is_empty() {
            return Err(AnalysisError::NoMessages);
        }
        self.analyze_range(conversation, messages, 0, messages.len() - 1)
            .await
    }

    /// Build the export envelope for a conversation's store.
    pub async fn export(
        &self,
        conversation: &Conversation,
        at: DateTime<Utc>,
    ) -> Result<ExportEnvelope, AnalysisError> {
        let store = self.load_store(conversation).await?;
        Ok(store::export(&store, conversation, at))
    }
}

/// Reject ranges outside `0 <= start <= end < len`.
pub fn validate_range(len: usize, start: usize, end: usize) -> Result<(), AnalysisError> {
    if len == 0 {
        return Err(AnalysisError::NoMessages);
    }
    if start > end || end >= len {
        return Err(AnalysisError::InvalidRange { start, end, len });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use rapport_types::error::RepositoryError;
    use rapport_types::llm::{GenerationError, OutputJsonSchema};

    /// In-memory repository that keeps serialized blobs.
    #[derive(Default)]
    struct MemoryRepository {
        blobs: Mutex<HashMap<String, serde_json::Value>>,
        saves: AtomicUsize,
    }

    impl MemoryRepository {
        fn stored(&self, id: &str) -> Option<MemoryStore> {
            let blobs = self.blobs.lock().unwrap();
            blobs
                .get(id)
                .map(|v| serde_json::from_value(v.clone()).unwrap())
        }

        fn saves(&self) -> usize {
            self.saves.load(Ordering::SeqCst)
        }
    }

    impl StoreRepository for MemoryRepository {
        async fn load(&self, id: &str) -> Result<Option<serde_json::Value>, RepositoryError> {
            Ok(self.blobs.lock().unwrap().get(id).cloned())
        }

        async fn save(&self, id: &str, store: &MemoryStore) -> Result<(), RepositoryError> {
            let value = serde_json::to_value(store)
                .map_err(|e| RepositoryError::Serialization(e.to_string()))?;
            self.blobs.lock().unwrap().insert(id.to_string(), value);
            self.saves.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Repository whose saves always fail.
    struct ReadOnlyRepository;

    impl StoreRepository for ReadOnlyRepository {
        async fn load(&self, _id: &str) -> Result<Option<serde_json::Value>, RepositoryError> {
            Ok(None)
        }

        async fn save(&self, _id: &str, _store: &MemoryStore) -> Result<(), RepositoryError> {
            Err(RepositoryError::Io("read-only file system".to_string()))
        }
    }

    /// Replies with a memory whose importance is 0.9 for messages containing
    /// "!" and 0.4 otherwise; fails for the message text in `fail_on`.
    struct StubGenerator {
        calls: AtomicUsize,
        fail_on: Option<&'static str>,
    }

    impl StubGenerator {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_on: None,
            }
        }
    }

    impl TextGenerator for StubGenerator {
        fn name(&self) -> &str {
            "stub"
        }

        async fn generate(
            &self,
            prompt: &str,
            _hint: Option<&OutputJsonSchema>,
        ) -> Result<Option<String>, GenerationError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if self
                .fail_on
                .is_some_and(|m| prompt.contains(&format!("Message: \"{m}\"")))
            {
                return Err(GenerationError::RateLimited {
                    retry_after_ms: Some(1000),
                });
            }
            let importance = if prompt.contains('!') { 0.9 } else { 0.4 };
            Ok(Some(format!(
                r#"{{"summary": "event {call}", "importance": {importance}, "emotion": "warm", "keywords": ["k"], "relationship": {{"type": "friendship", "change": "improved"}}}}"#
            )))
        }
    }

    fn tracker(config: TrackerConfig) -> MemoryTracker<MemoryRepository, StubGenerator> {
        MemoryTracker::new(MemoryRepository::default(), StubGenerator::new(), config)
    }

    fn conversation() -> Conversation {
        Conversation::new("chat-1", "Seraphina")
    }

    fn chat(n: usize) -> Vec<ChatMessage> {
        (0..n)
            .map(|i| {
                if i % 2 == 0 {
                    ChatMessage::user(format!("line {i}"))
                } else {
                    ChatMessage::character("Seraphina", format!("line {i}"))
                }
            })
            .collect()
    }

    #[tokio::test]
    async fn handle_message_records_and_persists() {
        let tracker = tracker(TrackerConfig::default());
        let mut rx = tracker.events().subscribe();
        let mut messages = chat(3);
        messages.push(ChatMessage::character("Seraphina", "I love you!"));

        let memory = tracker
            .handle_message(&conversation(), &messages)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(memory.message_index, 3);
        assert_eq!(memory.speaker.as_deref(), Some("Seraphina"));
        let stored = tracker.repository().stored("chat-1").unwrap();
        assert_eq!(stored.memories.len(), 1);
        assert_eq!(stored.timeline.len(), 1);
        assert!(stored.relationships.contains_key("friendship"));
        assert_eq!(stored.emotional_states["Seraphina"].current, "warm");

        assert!(matches!(rx.try_recv().unwrap(), TrackerEvent::MemoryAdded { message_index: 3, .. }));
        assert!(matches!(rx.try_recv().unwrap(), TrackerEvent::SignificantMemory { .. }));
    }

    #[tokio::test]
    async fn handle_message_without_notifications_skips_significant_event() {
        let tracker = tracker(TrackerConfig {
            show_notifications: false,
            ..Default::default()
        });
        let mut rx = tracker.events().subscribe();
        let messages = vec![ChatMessage::user("Big news!")];

        tracker.handle_message(&conversation(), &messages).await.unwrap();

        assert!(matches!(rx.try_recv().unwrap(), TrackerEvent::MemoryAdded { .. }));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn handle_message_skips_already_remembered_index() {
        let tracker = tracker(TrackerConfig::default());
        let messages = chat(3);

        let first = tracker.handle_message(&conversation(), &messages).await.unwrap();
        let second = tracker.handle_message(&conversation(), &messages).await.unwrap();

        assert!(first.is_some());
        assert!(second.is_none());
        assert_eq!(tracker.extractor().generator().calls.load(Ordering::SeqCst), 1);
        let stored = tracker.repository().stored("chat-1").unwrap();
        let at_two = stored.memories.iter().filter(|m| m.message_index == 2).count();
        assert_eq!(at_two, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn track_after_analyze_adds_nothing() {
        let tracker = tracker(TrackerConfig::default());
        let messages = chat(4);

        tracker.analyze_all(&conversation(), &messages).await.unwrap();
        let tracked = tracker.handle_message(&conversation(), &messages).await.unwrap();

        assert!(tracked.is_none());
        assert_eq!(tracker.repository().stored("chat-1").unwrap().memories.len(), 4);
    }

    #[tokio::test]
    async fn disabled_tracker_ignores_messages() {
        let tracker = tracker(TrackerConfig {
            enabled: false,
            ..Default::default()
        });

        let result = tracker.handle_message(&conversation(), &chat(2)).await.unwrap();

        assert!(result.is_none());
        assert_eq!(tracker.extractor().generator().calls.load(Ordering::SeqCst), 0);
        assert_eq!(tracker.repository().saves(), 0);
    }

    #[tokio::test]
    async fn multi_party_namespaces_relationships_and_partitions() {
        let tracker = tracker(TrackerConfig {
            partition_mode: PartitionMode::PerParticipant,
            ..Default::default()
        });
        let group = conversation().multi_party(true);
        let messages = vec![ChatMessage::character("Bo", "Hey")];

        tracker.handle_message(&group, &messages).await.unwrap();

        let stored = tracker.repository().stored("chat-1").unwrap();
        assert!(stored.relationships.contains_key("Bo:friendship"));
        assert_eq!(stored.speaker_memories("Bo").len(), 1);
    }

    #[tokio::test]
    async fn add_manual_persists_memory_and_timeline() {
        let tracker = tracker(TrackerConfig::default());
        let input = ManualMemoryInput {
            summary: "Met at the market".to_string(),
            importance: Some(0.6),
            emotion: Some("curious".to_string()),
            keywords: vec!["meeting".to_string()],
            ..Default::default()
        };

        tracker.add_manual(&conversation(), input).await.unwrap();

        let stored = tracker.repository().stored("chat-1").unwrap();
        assert_eq!(stored.memories.len(), 1);
        assert_eq!(stored.timeline.len(), 1);
        assert_eq!(stored.memories[0].summary, stored.timeline[0].summary);
        assert_eq!(stored.memories[0].importance, stored.timeline[0].importance);
        assert_eq!(tracker.extractor().generator().calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn add_manual_survives_full_store() {
        let tracker = tracker(TrackerConfig {
            max_memory_entries: 2,
            ..Default::default()
        });
        tracker.analyze_all(&conversation(), &chat(2)).await.unwrap();
        let input = ManualMemoryInput {
            importance: Some(0.1),
            ..ManualMemoryInput::new("Ann hums when nervous")
        };

        tracker.add_manual(&conversation(), input).await.unwrap();

        let stored = tracker.repository().stored("chat-1").unwrap();
        assert_eq!(stored.memories.len(), 3);
        assert!(stored.memories.iter().any(|m| m.summary == "Ann hums when nervous"));
    }

    #[tokio::test]
    async fn import_facts_persists_count() {
        let tracker = tracker(TrackerConfig::default());
        let facts = vec![
            ExternalFact {
                text: "A port city".to_string(),
                keys: vec!["Vael".to_string()],
                label: Some("Vael".to_string()),
            };
            3
        ];

        let imported = tracker.import_facts(&conversation(), &facts, 0.8).await.unwrap();

        assert_eq!(imported, 3);
        let stored = tracker.repository().stored("chat-1").unwrap();
        assert_eq!(stored.memories.len(), 3);
        assert_eq!(stored.timeline.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn analyze_all_is_idempotent_across_runs() {
        let tracker = tracker(TrackerConfig::default());
        let messages = chat(7);

        let first = tracker.analyze_all(&conversation(), &messages).await.unwrap();
        let second = tracker.analyze_all(&conversation(), &messages).await.unwrap();

        assert_eq!(first.created, 7);
        assert_eq!(second.created, 0);
        assert_eq!(second.skipped, 7);
        assert_eq!(tracker.repository().stored("chat-1").unwrap().memories.len(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn aborted_range_persists_committed_memories() {
        let tracker = MemoryTracker::new(
            MemoryRepository::default(),
            StubGenerator {
                calls: AtomicUsize::new(0),
                fail_on: Some("line 5"),
            },
            TrackerConfig::default(),
        );
        let mut rx = tracker.events().subscribe();
        let messages = chat(10);

        let err = tracker
            .analyze_range(&conversation(), &messages, 0, 9)
            .await
            .unwrap_err();

        assert!(matches!(err, AnalysisError::Aborted { message_index: 5, committed: 5, .. }));
        let stored = tracker.repository().stored("chat-1").unwrap();
        let mut indices: Vec<_> = stored.memories.iter().map(|m| m.message_index).collect();
        indices.sort();
        assert_eq!(indices, vec![0, 1, 2, 3, 4]);

        let mut failed = false;
        while let Ok(event) = rx.try_recv() {
            if let TrackerEvent::BatchFailed { message_index, .. } = event {
                assert_eq!(message_index, 5);
                failed = true;
            }
        }
        assert!(failed);
    }

    #[tokio::test(start_paused = true)]
    async fn aborted_range_reports_failed_save() {
        let tracker = MemoryTracker::new(
            ReadOnlyRepository,
            StubGenerator {
                calls: AtomicUsize::new(0),
                fail_on: Some("line 5"),
            },
            TrackerConfig::default(),
        );
        let mut rx = tracker.events().subscribe();

        let err = tracker
            .analyze_range(&conversation(), &chat(10), 0, 9)
            .await
            .unwrap_err();

        assert!(matches!(err, AnalysisError::Persistence(RepositoryError::Io(_))));
        let mut failed = false;
        while let Ok(event) = rx.try_recv() {
            failed |= matches!(event, TrackerEvent::BatchFailed { message_index: 5, .. });
        }
        assert!(failed);
    }

    #[tokio::test(start_paused = true)]
    async fn analyze_range_publishes_progress() {
        let tracker = tracker(TrackerConfig::default());
        let mut rx = tracker.events().subscribe();
        let messages = chat(4);
        let mut callback_count = 0;

        tracker
            .analyze_range_with_progress(&conversation(), &messages, 1, 3, |_| callback_count += 1)
            .await
            .unwrap();

        assert_eq!(callback_count, 3);
        let mut processed = Vec::new();
        let mut completed = false;
        while let Ok(event) = rx.try_recv() {
            match event {
                TrackerEvent::BatchProgress { processed: p, total, .. } => {
                    assert_eq!(total, 3);
                    processed.push(p);
                }
                TrackerEvent::BatchCompleted { created, .. } => {
                    assert_eq!(created, 3);
                    completed = true;
                }
                _ => {}
            }
        }
        assert_eq!(processed, vec![1, 2, 3]);
        assert!(completed);
    }

    #[tokio::test]
    async fn invalid_ranges_are_rejected_before_work() {
        let tracker = tracker(TrackerConfig::default());
        let messages = chat(3);

        let err = tracker
            .analyze_range(&conversation(), &messages, 1, 5)
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidRange { end: 5, len: 3, .. }));

        let err = tracker.analyze_all(&conversation(), &[]).await.unwrap_err();
        assert!(matches!(err, AnalysisError::NoMessages));
        assert_eq!(tracker.repository().saves(), 0);
    }

    #[tokio::test]
    async fn export_wraps_stored_data() {
        let tracker = tracker(TrackerConfig::default());
        tracker
            .add_manual(&conversation(), ManualMemoryInput::new("Found the key"))
            .await
            .unwrap();

        let at = DateTime::from_timestamp_millis(1_700_000_000_000).unwrap();
        let envelope = tracker.export(&conversation(), at).await.unwrap();

        assert_eq!(envelope.label, "Seraphina");
        assert_eq!(envelope.conversation_id, "chat-1");
        assert_eq!(envelope.data.memories.len(), 1);
    }

    #[test]
    fn validate_range_bounds() {
        assert!(validate_range(10, 0, 9).is_ok());
        assert!(validate_range(10, 4, 4).is_ok());
        assert!(validate_range(10, 5, 4).is_err());
        assert!(validate_range(10, 0, 10).is_err());
        assert!(matches!(validate_range(0, 0, 0), Err(AnalysisError::NoMessages)));
    }
}

//! Application state wiring the tracker service together.
//!
//! `MemoryTracker` is generic over its repository and generator ports;
//! AppState pins it to the JSON-file repository and the boxed HTTP
//! generator from rapport-infra.

use std::path::PathBuf;

use anyhow::Context;

use rapport_core::llm::BoxTextGenerator;
use rapport_core::service::MemoryTracker;
use rapport_infra::config::{load_tracker_config, resolve_data_dir, stores_dir};
use rapport_infra::llm::create_generator;
use rapport_infra::storage::JsonFileStoreRepository;
use rapport_types::store::Conversation;

pub type ConcreteTracker = MemoryTracker<JsonFileStoreRepository, BoxTextGenerator>;

pub struct AppState {
    pub tracker: ConcreteTracker,
    pub data_dir: PathBuf,
}

impl AppState {
    /// Resolve the data directory, load configuration and wire the tracker.
    pub async fn init() -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();
        tokio::fs::create_dir_all(&data_dir)
            .await
            .with_context(|| format!("Failed to create data directory {}", data_dir.display()))?;

        let config = load_tracker_config(&data_dir)
            .await
            .context("Invalid configuration in config.toml")?;

        let generator =
            create_generator(&config.generator).context("Failed to set up text generator")?;
        let repository = JsonFileStoreRepository::new(stores_dir(&data_dir));

        tracing::debug!(
            data_dir = %data_dir.display(),
            model = %config.generator.model,
            depth = %config.tracking_depth,
            "Application state initialized"
        );

        Ok(Self {
            tracker: MemoryTracker::new(repository, generator, config),
            data_dir,
        })
    }

    /// Conversation identity for CLI commands; the label defaults to the id.
    pub fn conversation(&self, id: &str, label: Option<&str>, multi_party: bool) -> Conversation {
        Conversation::new(id, label.unwrap_or(id)).multi_party(multi_party)
    }
}

//! JSON-file implementation of [`StoreRepository`].
//!
//! One `{conversation_id}.json` per conversation under a stores directory.
//! Ids are percent-encoded into the file stem, so distinct ids never share a
//! file and [`JsonFileStoreRepository::list`] can recover them.
//! Writes go to a temporary sibling first and are renamed into place so a
//! crash never leaves a half-written store behind.

use std::path::{Path, PathBuf};

use rapport_core::repository::StoreRepository;
use rapport_types::error::RepositoryError;
use rapport_types::store::MemoryStore;

#[derive(Debug, Clone)]
pub struct JsonFileStoreRepository {
    dir: PathBuf,
}

impl JsonFileStoreRepository {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file holding `conversation_id`'s store.
    pub fn path_for(&self, conversation_id: &str) -> PathBuf {
        self.dir
            .join(format!("{}.json", urlencoding::encode(conversation_id)))
    }

    /// Conversation ids with a persisted store, sorted.
    pub async fn list(&self) -> Result<Vec<String>, RepositoryError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(RepositoryError::Io(e.to_string())),
        };

        let mut ids = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| RepositoryError::Io(e.to_string()))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match urlencoding::decode(stem) {
                Ok(id) => ids.push(id.into_owned()),
                Err(e) => tracing::debug!(file = %path.display(), error = %e, "Skipping undecodable store file"),
            }
        }
        ids.sort();
        Ok(ids)
    }
}

impl StoreRepository for JsonFileStoreRepository {
    async fn load(&self, conversation_id: &str) -> Result<Option<serde_json::Value>, RepositoryError> {
        let path = self.path_for(conversation_id);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(RepositoryError::Io(format!("{}: {e}", path.display()))),
        };

        match serde_json::from_str(&content) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Stored memory file is not valid JSON; treating as absent"
                );
                Ok(None)
            }
        }
    }

    async fn save(&self, conversation_id: &str, store: &MemoryStore) -> Result<(), RepositoryError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| RepositoryError::Io(e.to_string()))?;

        let json = serde_json::to_string_pretty(store)
            .map_err(|e| RepositoryError::Serialization(e.to_string()))?;

        let path = self.path_for(conversation_id);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| RepositoryError::Io(format!("{}: {e}", tmp.display())))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| RepositoryError::Io(format!("{}: {e}", path.display())))?;

        tracing::debug!(
            conversation_id,
            memories = store.memories.len(),
            "Saved memory store"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rapport_types::memory::{Memory, MemorySource};
    use tempfile::TempDir;

    fn memory(summary: &str) -> Memory {
        Memory {
            summary: summary.to_string(),
            importance: 0.6,
            emotion: "calm".to_string(),
            keywords: vec!["tea".to_string()],
            continuity_note: String::new(),
            relationship: None,
            timestamp: Utc::now(),
            source: MemorySource::User,
            speaker: Some("User".to_string()),
            message_index: 2,
        }
    }

    #[tokio::test]
    async fn load_missing_is_none() {
        let tmp = TempDir::new().unwrap();
        let repo = JsonFileStoreRepository::new(tmp.path().join("stores"));
        assert!(repo.load("nope").await.unwrap().is_none());
        assert!(repo.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn save_then_load_returns_camel_case_blob() {
        let tmp = TempDir::new().unwrap();
        let repo = JsonFileStoreRepository::new(tmp.path().join("stores"));

        let mut store = MemoryStore::new();
        store.memories.push(memory("Shared tea"));
        repo.save("chat-1", &store).await.unwrap();

        let blob = repo.load("chat-1").await.unwrap().unwrap();
        assert_eq!(blob["memories"][0]["summary"], "Shared tea");
        assert_eq!(blob["memories"][0]["messageIndex"], 2);
        assert!(blob.get("emotionalStates").is_some());

        let reloaded: MemoryStore = serde_json::from_value(blob).unwrap();
        assert_eq!(reloaded.memories.len(), 1);
        assert!(!repo.path_for("chat-1").with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn corrupt_file_is_treated_as_absent() {
        let tmp = TempDir::new().unwrap();
        let repo = JsonFileStoreRepository::new(tmp.path());
        tokio::fs::write(repo.path_for("broken"), "{not json").await.unwrap();

        assert!(repo.load("broken").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_returns_sorted_ids() {
        let tmp = TempDir::new().unwrap();
        let repo = JsonFileStoreRepository::new(tmp.path());
        repo.save("zeta", &MemoryStore::new()).await.unwrap();
        repo.save("alpha", &MemoryStore::new()).await.unwrap();
        tokio::fs::write(tmp.path().join("notes.txt"), "x").await.unwrap();

        assert_eq!(repo.list().await.unwrap(), vec!["alpha", "zeta"]);
    }

    #[test]
    fn ids_cannot_escape_the_directory() {
        let repo = JsonFileStoreRepository::new("/data/stores");
        assert_eq!(
            repo.path_for("../secrets"),
            PathBuf::from("/data/stores/..%2Fsecrets.json")
        );
    }

    #[tokio::test]
    async fn similar_ids_get_separate_files() {
        let tmp = TempDir::new().unwrap();
        let repo = JsonFileStoreRepository::new(tmp.path());
        assert_ne!(repo.path_for("chat 1"), repo.path_for("chat_1"));

        repo.save("chat 1", &MemoryStore::new()).await.unwrap();
        repo.save("chat_1", &MemoryStore::new()).await.unwrap();

        assert_eq!(repo.list().await.unwrap(), vec!["chat 1", "chat_1"]);
        assert!(repo.load("chat 1").await.unwrap().is_some());
    }
}

//! Memory store repository trait definition.

use rapport_types::error::RepositoryError;
use rapport_types::store::MemoryStore;

/// Persistence hook for per-conversation memory stores.
///
/// `load` returns the raw stored blob; the tracker decides whether it is a
/// well-formed store. The engine never persists on its own; the tracker
/// service calls `save` after every mutating operation.
pub trait StoreRepository: Send + Sync {
    /// Load the stored blob for a conversation. `Ok(None)` if nothing is stored.
    fn load(
        &self,
        conversation_id: &str,
    ) -> impl std::future::Future<Output = Result<Option<serde_json::Value>, RepositoryError>> + Send;

    /// Replace the stored blob for a conversation.
    fn save(
        &self,
        conversation_id: &str,
        store: &MemoryStore,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;
}

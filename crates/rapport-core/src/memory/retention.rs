//! Importance-ranked retention for the flat memory list.
//!
//! Trimming is destructive: dropped memories are not archived. Only
//! `memories` is bounded; the per-speaker partition, timeline and
//! relationship ledger grow without limit.

use rapport_types::store::MemoryStore;

/// Keep at most `max_entries` memories, preferring higher importance.
///
/// The sort is stable, so equally important memories keep their insertion
/// order. Returns the number of memories dropped.
pub fn trim(store: &mut MemoryStore, max_entries: usize) -> usize {
    let len = store.memories.len();
    if len <= max_entries {
        return 0;
    }

    store
        .memories
        .sort_by(|a, b| b.importance.total_cmp(&a.importance));
    store.memories.truncate(max_entries);

    let dropped = len - max_entries;
    tracing::debug!(dropped, max_entries, "Trimmed memory store");
    dropped
}

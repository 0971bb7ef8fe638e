//! File-backed storage: per-conversation store persistence, the export
//! writer, and loaders for transcripts and external facts.

pub mod export;
pub mod json_file;
pub mod transcript;

pub use json_file::JsonFileStoreRepository;

/// Make an arbitrary label safe for use inside an export file name.
///
/// Lossy: "chat 1" and "chat_1" share a stem. Store files use
/// percent-encoded ids instead.
///
/// Anything outside `[A-Za-z0-9_-]` becomes `_`; an empty result becomes
/// `"untitled"`.
pub fn sanitize_file_stem(label: &str) -> String {
    let stem: String = label
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if stem.is_empty() {
        "untitled".to_string()
    } else {
        stem
    }
}

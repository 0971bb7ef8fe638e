//! Export writer: the export envelope as a pretty-printed JSON file.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use rapport_types::error::RepositoryError;
use rapport_types::store::ExportEnvelope;

use super::sanitize_file_stem;

/// `memory-tracker-{label}-{millis}.json`
pub fn export_file_name(label: &str, at: DateTime<Utc>) -> String {
    format!(
        "memory-tracker-{}-{}.json",
        sanitize_file_stem(label),
        at.timestamp_millis()
    )
}

/// Write `envelope` into `dir`, returning the path written.
pub async fn write_export(
    dir: &Path,
    envelope: &ExportEnvelope,
    at: DateTime<Utc>,
) -> Result<PathBuf, RepositoryError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| RepositoryError::Io(e.to_string()))?;

    let json = serde_json::to_string_pretty(envelope)
        .map_err(|e| RepositoryError::Serialization(e.to_string()))?;

    let path = dir.join(export_file_name(&envelope.label, at));
    tokio::fs::write(&path, json)
        .await
        .map_err(|e| RepositoryError::Io(format!("{}: {e}", path.display())))?;

    tracing::info!(path = %path.display(), "Exported memory store");
    Ok(path)
}

//! Store editing commands: manual add, fact import, export.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use console::style;

use rapport_core::memory::store::ManualMemoryInput;
use rapport_infra::storage::export::write_export;
use rapport_infra::storage::transcript::load_facts;
use rapport_types::memory::RelationshipChange;

use crate::cli::ConversationArgs;
use crate::state::AppState;

/// Fields for `rapport add`, as given on the command line.
pub struct AddArgs {
    pub summary: String,
    pub importance: Option<f64>,
    pub emotion: Option<String>,
    pub keywords: Vec<String>,
    pub note: Option<String>,
    pub relationship: Option<String>,
    pub change: RelationshipChange,
    pub between: Option<String>,
    pub speaker: Option<String>,
}

impl From<AddArgs> for ManualMemoryInput {
    fn from(args: AddArgs) -> Self {
        ManualMemoryInput {
            summary: args.summary,
            importance: args.importance,
            emotion: args.emotion,
            keywords: args
                .keywords
                .into_iter()
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty())
                .collect(),
            continuity_note: args.note,
            relationship_type: args.relationship,
            relationship_change: args.change,
            between: args.between,
            speaker: args.speaker,
        }
    }
}

/// Add a memory by hand.
///
/// # Examples
///
/// ```bash
/// rapport add chat-42 "Ann is afraid of storms" --importance 0.8 --keywords storm,fear
/// ```
pub async fn add(state: &AppState, target: &ConversationArgs, args: AddArgs, json: bool) -> Result<()> {
    let conversation =
        state.conversation(&target.conversation, target.label.as_deref(), target.multi_party);

    let memory = state
        .tracker
        .add_manual(&conversation, args.into())
        .await
        .context("Failed to add memory")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&memory)?);
    } else {
        println!(
            "  {} Memory saved for '{}'",
            style("*").green().bold(),
            style(&conversation.label).cyan()
        );
        println!("  {}", style(&memory.summary).dim());
    }
    Ok(())
}

/// Import facts from a world-info / lorebook file.
///
/// # Examples
///
/// ```bash
/// rapport import chat-42 world.json --importance 0.8
/// rapport import chat-42 world.json --only 0,3,4
/// ```
pub async fn import(
    state: &AppState,
    target: &ConversationArgs,
    path: &Path,
    importance: f64,
    only: &[usize],
    json: bool,
) -> Result<()> {
    if !(0.0..=1.0).contains(&importance) {
        anyhow::bail!("Importance must be between 0 and 1 (got {importance})");
    }

    let mut facts = load_facts(path)
        .await
        .with_context(|| format!("Failed to load facts from {}", path.display()))?;
    if !only.is_empty() {
        facts = facts
            .into_iter()
            .enumerate()
            .filter(|(i, _)| only.contains(i))
            .map(|(_, fact)| fact)
            .collect();
    }

    let conversation =
        state.conversation(&target.conversation, target.label.as_deref(), target.multi_party);
    let imported = state
        .tracker
        .import_facts(&conversation, &facts, importance)
        .await
        .context("Failed to import facts")?;

    if json {
        println!(
            "{}",
            serde_json::json!({"imported": imported, "conversation": conversation.id})
        );
    } else if imported == 0 {
        println!("  {} No entries to import.", style("i").blue().bold());
    } else {
        println!(
            "  {} Imported {} entr{} into '{}'",
            style("*").green().bold(),
            style(imported).bold(),
            if imported == 1 { "y" } else { "ies" },
            style(&conversation.label).cyan()
        );
    }
    Ok(())
}

/// Export the conversation's store as a JSON envelope.
///
/// # Examples
///
/// ```bash
/// rapport export chat-42 --label Seraphina --out exports/
/// ```
pub async fn export(state: &AppState, target: &ConversationArgs, out: &Path, json: bool) -> Result<()> {
    let conversation =
        state.conversation(&target.conversation, target.label.as_deref(), target.multi_party);
    let at = Utc::now();

    let envelope = state
        .tracker
        .export(&conversation, at)
        .await
        .context("Failed to load store for export")?;
    let path = write_export(out, &envelope, at)
        .await
        .context("Failed to write export file")?;

    if json {
        println!(
            "{}",
            serde_json::json!({
                "path": path.display().to_string(),
                "memories": envelope.data.memories.len(),
            })
        );
    } else {
        println!(
            "  {} Exported {} memories to {}",
            style("*").green().bold(),
            envelope.data.memories.len(),
            style(path.display()).cyan()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_args_drop_blank_keywords() {
        let input: ManualMemoryInput = AddArgs {
            summary: "Ann fears storms".to_string(),
            importance: Some(0.8),
            emotion: None,
            keywords: vec![" storm ".to_string(), String::new()],
            note: None,
            relationship: Some("trust".to_string()),
            change: RelationshipChange::Improved,
            between: None,
            speaker: Some("Ann".to_string()),
        }
        .into();

        assert_eq!(input.keywords, vec!["storm"]);
        assert_eq!(input.relationship_type.as_deref(), Some("trust"));
        assert_eq!(input.relationship_change, RelationshipChange::Improved);
        assert_eq!(input.importance, Some(0.8));
    }
}

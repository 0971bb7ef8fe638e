//! Read-only store views: memories, relationships, timeline, emotions, search.

use anyhow::{Context, Result};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;

use rapport_core::memory::query::{
    chronological, filter_by_emotion, level_percent, recent_first, search as search_memories,
    star_rating,
};
use rapport_types::memory::{Memory, MemorySource, RelationshipChange};
use rapport_types::relationship::LevelBand;
use rapport_types::store::MemoryStore;

use crate::cli::{ConversationArgs, ShowView, truncate};
use crate::state::AppState;

/// Relationship history entries shown per ledger row.
const RECENT_CHANGES: usize = 5;

async fn load(state: &AppState, target: &ConversationArgs) -> Result<MemoryStore> {
    let conversation =
        state.conversation(&target.conversation, target.label.as_deref(), target.multi_party);
    state
        .tracker
        .load_store(&conversation)
        .await
        .with_context(|| format!("Failed to load store for '{}'", target.conversation))
}

fn new_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(
        headers
            .iter()
            .map(|h| Cell::new(h).fg(Color::White))
            .collect::<Vec<_>>(),
    );
    table
}

fn stars(importance: f64) -> String {
    "*".repeat(star_rating(importance) as usize)
}

fn empty_notice(what: &str, conversation: &str) {
    println!();
    println!(
        "  {} No {what} for '{}'.",
        style("i").blue().bold(),
        style(conversation).cyan()
    );
    println!();
}

/// Dispatch a `rapport show` view.
pub async fn show(state: &AppState, target: &ConversationArgs, view: ShowView, json: bool) -> Result<()> {
    let store = load(state, target).await?;
    let conversation = target.conversation.as_str();
    match view {
        ShowView::Memories { emotion, limit } => {
            let memories = match emotion.as_deref() {
                Some(filter) => filter_by_emotion(&store.memories, filter),
                None => store.memories.iter().collect(),
            };
            let mut memories = recent_first(memories);
            if let Some(limit) = limit {
                memories.truncate(limit);
            }
            print_memories(conversation, &memories, json)
        }
        ShowView::Relationships => print_relationships(conversation, &store, json),
        ShowView::Timeline => print_timeline(conversation, &store, json),
        ShowView::Emotions => print_emotions(conversation, &store, json),
    }
}

/// Search a conversation's memories.
///
/// # Examples
///
/// ```bash
/// rapport search chat-42 storm
/// ```
pub async fn search(state: &AppState, target: &ConversationArgs, query: &str, json: bool) -> Result<()> {
    let store = load(state, target).await?;
    let matches = recent_first(search_memories(&store.memories, query));
    print_memories(&target.conversation, &matches, json)
}

fn print_memories(conversation: &str, memories: &[&Memory], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(memories)?);
        return Ok(());
    }
    if memories.is_empty() {
        empty_notice("memories", conversation);
        return Ok(());
    }

    let mut table = new_table(&["Memory", "Importance", "Emotion", "Keywords", "Source", "Date"]);
    for memory in memories {
        let source = match (&memory.speaker, memory.source) {
            (Some(speaker), MemorySource::User | MemorySource::Character) => speaker.clone(),
            (_, source) => source.to_string(),
        };
        table.add_row(vec![
            Cell::new(truncate(&memory.summary, 60)).fg(Color::White),
            Cell::new(stars(memory.importance)).fg(Color::Yellow),
            Cell::new(&memory.emotion).fg(Color::Magenta),
            Cell::new(memory.keywords.join(", ")).fg(Color::Cyan),
            Cell::new(source).fg(Color::DarkGrey),
            Cell::new(memory.timestamp.format("%Y-%m-%d %H:%M").to_string()).fg(Color::DarkGrey),
        ]);
    }

    println!();
    println!("  Memories for '{}'", style(conversation).cyan().bold());
    println!();
    println!("{table}");
    println!();
    println!(
        "  {} memor{}",
        style(memories.len()).bold(),
        if memories.len() == 1 { "y" } else { "ies" }
    );
    println!();
    Ok(())
}

fn print_relationships(conversation: &str, store: &MemoryStore, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&store.relationships)?);
        return Ok(());
    }
    if store.relationships.is_empty() {
        empty_notice("relationships", conversation);
        return Ok(());
    }

    let mut table = new_table(&["Relationship", "Level", "Recent changes", "Updated"]);
    for (key, entry) in &store.relationships {
        let level = format!("{}%", level_percent(entry.level));
        let level_cell = match entry.band() {
            LevelBand::Positive => Cell::new(level).fg(Color::Green),
            LevelBand::Neutral => Cell::new(level).fg(Color::Yellow),
            LevelBand::Negative => Cell::new(level).fg(Color::Red),
        };
        let changes = entry
            .recent_changes(RECENT_CHANGES)
            .map(|record| match record.change {
                RelationshipChange::Improved => "+",
                RelationshipChange::Worsened => "-",
                RelationshipChange::Neutral => "=",
            })
            .collect::<Vec<_>>()
            .join(" ");

        table.add_row(vec![
            Cell::new(key).fg(Color::White),
            level_cell,
            Cell::new(changes).fg(Color::Cyan),
            Cell::new(entry.last_update.format("%Y-%m-%d %H:%M").to_string()).fg(Color::DarkGrey),
        ]);
    }

    println!();
    println!("  Relationships in '{}'", style(conversation).cyan().bold());
    println!();
    println!("{table}");
    println!();
    Ok(())
}

fn print_timeline(conversation: &str, store: &MemoryStore, json: bool) -> Result<()> {
    let events = chronological(&store.timeline);
    if json {
        println!("{}", serde_json::to_string_pretty(&events)?);
        return Ok(());
    }
    if events.is_empty() {
        empty_notice("timeline events", conversation);
        return Ok(());
    }

    let mut table = new_table(&["When", "Message", "Event", "Importance"]);
    for event in events {
        let index = if event.message_index < 0 {
            "-".to_string()
        } else {
            format!("#{}", event.message_index)
        };
        table.add_row(vec![
            Cell::new(event.timestamp.format("%Y-%m-%d %H:%M").to_string()).fg(Color::DarkGrey),
            Cell::new(index).fg(Color::DarkGrey),
            Cell::new(truncate(&event.summary, 70)).fg(Color::White),
            Cell::new(stars(event.importance)).fg(Color::Yellow),
        ]);
    }

    println!();
    println!("  Timeline of '{}'", style(conversation).cyan().bold());
    println!();
    println!("{table}");
    println!();
    Ok(())
}

fn print_emotions(conversation: &str, store: &MemoryStore, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&store.emotional_states)?);
        return Ok(());
    }
    if store.emotional_states.is_empty() {
        empty_notice("emotional states", conversation);
        return Ok(());
    }

    let mut table = new_table(&["Participant", "Current", "Last hour"]);
    for (key, state) in &store.emotional_states {
        let recent = state
            .history
            .iter()
            .map(|r| r.emotion.as_str())
            .collect::<Vec<_>>()
            .join(" > ");
        table.add_row(vec![
            Cell::new(key).fg(Color::White),
            Cell::new(&state.current).fg(Color::Magenta),
            Cell::new(recent).fg(Color::DarkGrey),
        ]);
    }

    println!();
    println!("  Emotional state in '{}'", style(conversation).cyan().bold());
    println!();
    println!("{table}");
    println!();
    Ok(())
}

//! Extraction commands: track the newest message, analyze a range.

use std::path::Path;

use anyhow::{Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use rapport_infra::storage::transcript::load_transcript;
use rapport_types::error::AnalysisError;
use rapport_types::message::ChatMessage;

use crate::cli::{ConversationArgs, detect_multi_party, truncate};
use crate::state::AppState;

async fn read_messages(path: &Path) -> Result<Vec<ChatMessage>> {
    load_transcript(path)
        .await
        .with_context(|| format!("Failed to load transcript {}", path.display()))
}

/// Extract a memory from the last message in the transcript.
///
/// # Examples
///
/// ```bash
/// rapport track chat-42 --transcript chat.jsonl
/// ```
pub async fn track(
    state: &AppState,
    target: &ConversationArgs,
    transcript: &Path,
    json: bool,
) -> Result<()> {
    let messages = read_messages(transcript).await?;
    let conversation = state.conversation(
        &target.conversation,
        target.label.as_deref(),
        target.multi_party || detect_multi_party(&messages),
    );

    let memory = state
        .tracker
        .handle_message(&conversation, &messages)
        .await
        .context("Failed to track message")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&memory)?);
        return Ok(());
    }

    match memory {
        Some(memory) => {
            println!(
                "  {} Remembered: {}",
                style("*").green().bold(),
                memory.summary
            );
            println!(
                "  {}",
                style(format!(
                    "importance {:.2} | {} | {}",
                    memory.importance,
                    memory.emotion,
                    memory.keywords.join(", ")
                ))
                .dim()
            );
        }
        None => {
            println!(
                "  {} Nothing worth remembering in the latest message.",
                style("i").blue().bold()
            );
        }
    }
    Ok(())
}

/// Analyze `start..=end` of the transcript, defaulting to the whole of it.
///
/// # Examples
///
/// ```bash
/// rapport analyze chat-42 --transcript chat.jsonl
/// rapport analyze chat-42 --transcript chat.jsonl --start 10 --end 40
/// ```
pub async fn analyze(
    state: &AppState,
    target: &ConversationArgs,
    transcript: &Path,
    start: Option<usize>,
    end: Option<usize>,
    json: bool,
    quiet: bool,
) -> Result<()> {
    let messages = read_messages(transcript).await?;
    if messages.is_empty() {
        return Err(AnalysisError::NoMessages).context("Transcript has no messages");
    }
    let conversation = state.conversation(
        &target.conversation,
        target.label.as_deref(),
        target.multi_party || detect_multi_party(&messages),
    );

    let start = start.unwrap_or(0);
    let end = end.unwrap_or(messages.len() - 1);

    let bar = if json || quiet {
        ProgressBar::hidden()
    } else {
        let bar = ProgressBar::new((end.saturating_sub(start) + 1) as u64);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.cyan} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        bar
    };

    let result = state
        .tracker
        .analyze_range_with_progress(&conversation, &messages, start, end, |progress| {
            bar.set_position(progress.processed as u64);
            if let Some(message) = messages.get(progress.message_index) {
                bar.set_message(truncate(&message.content, 40));
            }
        })
        .await;
    bar.finish_and_clear();

    let report = match result {
        Ok(report) => report,
        Err(AnalysisError::Aborted {
            message_index,
            committed,
            source,
        }) => {
            anyhow::bail!(
                "Analysis stopped at message {message_index}: {source} ({committed} new memories were kept)"
            );
        }
        Err(e) => return Err(e).context("Analysis failed"),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} Analyzed messages {}-{} of '{}'",
        style("*").green().bold(),
        start,
        end,
        style(&conversation.label).cyan()
    );
    println!(
        "  {} new, {} already remembered, {} trimmed, {} stored",
        style(report.created).bold(),
        report.skipped,
        report.dropped,
        style(report.total_memories).bold()
    );
    println!();
    Ok(())
}

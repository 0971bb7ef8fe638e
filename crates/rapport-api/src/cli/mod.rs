//! CLI command definitions for the `rapport` binary.
//!
//! Every command addresses one conversation by id. Commands that need the
//! conversation's messages read them from a transcript file (JSON array or
//! JSONL).

pub mod analyze;
pub mod memory;
pub mod show;
pub mod status;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

use rapport_types::memory::RelationshipChange;
use rapport_types::message::ChatMessage;

/// Track memories, relationships and emotions across a conversation.
#[derive(Parser)]
#[command(name = "rapport", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Also export spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Which conversation a command acts on.
#[derive(Args, Clone)]
pub struct ConversationArgs {
    /// Conversation id (names the persisted store).
    pub conversation: String,

    /// Display label used in exports (defaults to the id).
    #[arg(long)]
    pub label: Option<String>,

    /// Treat the conversation as a group chat.
    #[arg(long)]
    pub multi_party: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Extract a memory from the newest message of a transcript.
    Track {
        #[command(flatten)]
        target: ConversationArgs,

        /// Transcript file (JSON array or JSONL).
        #[arg(long, short)]
        transcript: PathBuf,
    },

    /// Analyze a range of historical messages (the whole transcript by default).
    Analyze {
        #[command(flatten)]
        target: ConversationArgs,

        /// Transcript file (JSON array or JSONL).
        #[arg(long, short)]
        transcript: PathBuf,

        /// First message index (inclusive).
        #[arg(long)]
        start: Option<usize>,

        /// Last message index (inclusive).
        #[arg(long)]
        end: Option<usize>,
    },

    /// Add a memory by hand.
    Add {
        #[command(flatten)]
        target: ConversationArgs,

        /// What to remember.
        summary: String,

        /// Importance from 0 to 1.
        #[arg(long)]
        importance: Option<f64>,

        #[arg(long)]
        emotion: Option<String>,

        /// Comma-separated keywords.
        #[arg(long, value_delimiter = ',')]
        keywords: Vec<String>,

        /// Note for keeping later messages consistent.
        #[arg(long)]
        note: Option<String>,

        /// Relationship affected (e.g. "trust", "romance").
        #[arg(long)]
        relationship: Option<String>,

        /// Direction of the relationship change.
        #[arg(long, value_enum, default_value_t = ChangeArg::Neutral)]
        change: ChangeArg,

        /// Who the relationship is between.
        #[arg(long)]
        between: Option<String>,

        /// Participant the memory belongs to.
        #[arg(long)]
        speaker: Option<String>,
    },

    /// Import world-info / lorebook facts as memories.
    Import {
        #[command(flatten)]
        target: ConversationArgs,

        /// Fact file (JSON array or object with "entries").
        facts: PathBuf,

        /// Importance given to every imported fact.
        #[arg(long, default_value_t = 0.7)]
        importance: f64,

        /// Import only these entries (0-based positions, comma-separated).
        #[arg(long, value_delimiter = ',')]
        only: Vec<usize>,
    },

    /// Write the conversation's store to an export file.
    Export {
        #[command(flatten)]
        target: ConversationArgs,

        /// Directory to write into.
        #[arg(long, short, default_value = ".")]
        out: PathBuf,
    },

    /// Show part of a conversation's store.
    Show {
        #[command(flatten)]
        target: ConversationArgs,

        #[command(subcommand)]
        view: ShowView,
    },

    /// Search memories (summary, emotion, keywords, notes, speaker).
    Search {
        #[command(flatten)]
        target: ConversationArgs,

        query: String,
    },

    /// Show configuration and stored conversations.
    Status,

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

#[derive(Subcommand, Clone)]
pub enum ShowView {
    /// Memories, most recent first.
    Memories {
        /// Only memories whose emotion contains this text.
        #[arg(long)]
        emotion: Option<String>,

        /// Maximum rows to display.
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Relationship ledger with recent changes.
    Relationships,
    /// Timeline of events in order.
    Timeline,
    /// Current emotional state per participant.
    Emotions,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ChangeArg {
    Improved,
    Worsened,
    Neutral,
}

impl From<ChangeArg> for RelationshipChange {
    fn from(change: ChangeArg) -> Self {
        match change {
            ChangeArg::Improved => RelationshipChange::Improved,
            ChangeArg::Worsened => RelationshipChange::Worsened,
            ChangeArg::Neutral => RelationshipChange::Neutral,
        }
    }
}

/// A transcript is a group chat when more than one named character speaks.
pub fn detect_multi_party(messages: &[ChatMessage]) -> bool {
    let mut names = messages
        .iter()
        .filter(|m| !m.is_user)
        .filter_map(|m| m.name.as_deref())
        .filter(|n| !n.trim().is_empty());
    match names.next() {
        Some(first) => names.any(|n| n != first),
        None => false,
    }
}

/// Shorten `text` to at most `max` characters, marking the cut with `...`.
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{kept}...")
}

//! Tracker configuration types for rapport.
//!
//! `TrackerConfig` represents the top-level `config.toml` that controls
//! extraction depth, retention bound, partitioning, batch pacing and the
//! generation endpoint. All fields have sensible defaults.

use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

/// How much the extraction prompt asks the generator for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackingDepth {
    /// One-sentence fact, importance and tone.
    Basic,
    /// Adds emotional context, relationship dynamics and keywords.
    #[default]
    Detailed,
    /// Adds continuity notes and contradiction checks.
    Comprehensive,
}

impl fmt::Display for TrackingDepth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackingDepth::Basic => write!(f, "basic"),
            TrackingDepth::Detailed => write!(f, "detailed"),
            TrackingDepth::Comprehensive => write!(f, "comprehensive"),
        }
    }
}

impl FromStr for TrackingDepth {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "basic" => Ok(TrackingDepth::Basic),
            "detailed" => Ok(TrackingDepth::Detailed),
            "comprehensive" => Ok(TrackingDepth::Comprehensive),
            other => Err(format!("invalid tracking depth: '{other}'")),
        }
    }
}

/// How memories of multi-party conversations are partitioned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PartitionMode {
    #[default]
    Auto,
    Combined,
    #[serde(alias = "per-character")]
    PerParticipant,
}

impl fmt::Display for PartitionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartitionMode::Auto => write!(f, "auto"),
            PartitionMode::Combined => write!(f, "combined"),
            PartitionMode::PerParticipant => write!(f, "per-participant"),
        }
    }
}

impl FromStr for PartitionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(PartitionMode::Auto),
            "combined" => Ok(PartitionMode::Combined),
            "per-participant" | "per-character" => Ok(PartitionMode::PerParticipant),
            other => Err(format!("invalid partition mode: '{other}'")),
        }
    }
}

/// Top-level configuration for the memory tracker.
///
/// Loaded from `~/.rapport/config.toml`. All fields have sensible defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Live message handling on/off.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Retention bound for the flat memory list.
    #[serde(default = "default_max_memory_entries")]
    pub max_memory_entries: usize,

    /// Whether emotional states are tracked.
    #[serde(default = "default_true")]
    pub use_emotional_context: bool,

    /// Announce memories with importance above 0.7.
    #[serde(default = "default_true")]
    pub show_notifications: bool,

    #[serde(default)]
    pub tracking_depth: TrackingDepth,

    #[serde(default)]
    pub partition_mode: PartitionMode,

    /// Messages per batch during historical analysis.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Pause between batches, in milliseconds.
    #[serde(default = "default_inter_batch_delay_ms")]
    pub inter_batch_delay_ms: u64,

    /// Speaker label for user messages without a name.
    #[serde(default = "default_user_label")]
    pub user_label: String,

    /// Speaker label for character messages without a name.
    #[serde(default = "default_character_label")]
    pub default_character: String,

    #[serde(default)]
    pub generator: GeneratorConfig,
}

fn default_true() -> bool {
    true
}

fn default_max_memory_entries() -> usize {
    50
}

fn default_batch_size() -> usize {
    5
}

fn default_inter_batch_delay_ms() -> u64 {
    500
}

fn default_user_label() -> String {
    "User".to_string()
}

fn default_character_label() -> String {
    "Character".to_string()
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_memory_entries: default_max_memory_entries(),
            use_emotional_context: true,
            show_notifications: true,
            tracking_depth: TrackingDepth::default(),
            partition_mode: PartitionMode::default(),
            batch_size: default_batch_size(),
            inter_batch_delay_ms: default_inter_batch_delay_ms(),
            user_label: default_user_label(),
            default_character: default_character_label(),
            generator: GeneratorConfig::default(),
        }
    }
}

impl TrackerConfig {
    /// Reject values the engine cannot operate with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_memory_entries == 0 {
            return Err(ConfigError::Invalid {
                field: "max_memory_entries",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.batch_size == 0 {
            return Err(ConfigError::Invalid {
                field: "batch_size",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.generator.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "generator.base_url",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

/// Connection settings for the OpenAI-compatible generation endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// Environment variable holding the API key (the key itself is never stored).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default)]
    pub temperature: Option<f64>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_api_key_env() -> String {
    "RAPPORT_API_KEY".to_string()
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_timeout_secs() -> u64 {
    120
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            max_tokens: default_max_tokens(),
            temperature: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

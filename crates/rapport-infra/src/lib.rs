//! Infrastructure layer for rapport.
//!
//! Contains implementations of the ports defined in `rapport-core`: an
//! OpenAI-compatible HTTP text generator, JSON-file store persistence, plus
//! transcript/fact loaders, the export writer and configuration loading.

pub mod config;
pub mod llm;
pub mod storage;

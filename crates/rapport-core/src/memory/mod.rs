//! Memory extraction, aggregation and retention.
//!
//! - `prompt` / `parser` / `extractor`: message -> candidate `Memory`
//! - `aggregator`: fold a memory into a store (ledger, emotions, timeline)
//! - `retention`: importance-ranked trimming
//! - `batch`: idempotent analysis over a historical message range
//! - `store`: load, export, manual entry and fact import
//! - `query`: read-side helpers for presenting a store

pub mod aggregator;
pub mod batch;
pub mod extractor;
pub mod parser;
pub mod prompt;
pub mod query;
pub mod retention;
pub mod store;

pub use aggregator::{AggregationPolicy, Aggregator};
pub use batch::{BatchAnalyzer, BatchOptions, BatchProgress, BatchReport};
pub use extractor::{ExtractionRequest, MemoryExtractor};

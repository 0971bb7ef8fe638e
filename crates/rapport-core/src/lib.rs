//! Business logic and port definitions for rapport.
//!
//! This crate holds the memory extraction, aggregation and retention engine
//! and defines the "ports" (the `TextGenerator` and `StoreRepository`
//! traits) that the infrastructure layer implements. It depends only on
//! `rapport-types` -- never on `rapport-infra` or any network/IO crate.

pub mod event;
pub mod llm;
pub mod memory;
pub mod repository;
pub mod service;

//! Repository trait definitions (ports).
//!
//! The infrastructure layer (rapport-infra) implements these; the core
//! crate never depends on any specific storage technology.

pub mod store;

pub use store::StoreRepository;

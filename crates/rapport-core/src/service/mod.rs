//! Business logic services (use cases).
//!
//! Services orchestrate the memory engine, the generation capability and
//! persistence. They depend on traits (ports) -- never on concrete
//! infrastructure implementations.

pub mod tracker;

pub use tracker::MemoryTracker;

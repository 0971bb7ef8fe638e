//! Tracing setup for rapport binaries.

pub mod tracing_setup;

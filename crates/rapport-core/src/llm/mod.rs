//! Generation capability abstractions for rapport.
//!
//! - `TextGenerator`: RPITIT trait for concrete generator implementations
//! - `BoxTextGenerator`: object-safe wrapper for dynamic dispatch

pub mod box_generator;
pub mod generator;

pub use box_generator::BoxTextGenerator;
pub use generator::TextGenerator;

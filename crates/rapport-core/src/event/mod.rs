//! Event bus for tracker notifications.
//!
//! Provides an `EventBus` that distributes `TrackerEvent` messages to all
//! subscribers via a `tokio::sync::broadcast` channel.

pub mod bus;

pub use bus::EventBus;

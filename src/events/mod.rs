//! # Lifecycle Events
//!
//! Broadcast-based event stream for observing the engine. Components publish named
//! events from `constants::events` with a JSON context; subscribers consume them
//! through an ordinary `tokio::sync::broadcast` receiver.

pub mod publisher;

pub use publisher::{EventPublisher, PublishedEvent};

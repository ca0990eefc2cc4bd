//! # Cluster Membership
//!
//! Node identity, heartbeat-based liveness and conservative cleanup of dead nodes.
//! Every liveness decision in the engine reads the same check-in timestamps, so the
//! heartbeat loop in `manager` and the removal predicate in `cleaner` are two views of
//! one definition of alive.

pub mod cleaner;
pub mod manager;
pub mod node;

pub use cleaner::{CleanupReport, NodeCleaner, NodeCleanerConfig};
pub use manager::{ClusterManager, ClusterManagerConfig};
pub use node::NodeRecord;

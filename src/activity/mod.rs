//! # Activity Execution Layer
//!
//! Everything between a task's configuration blob and its processed items:
//! hierarchical activity paths, compiled activity trees, the handler contract
//! leaf work is dispatched through, and the runner that drives claim-based
//! execution across the cluster.
//!
//! ## Components
//!
//! - **path**: Dot-separated hierarchical activity addresses
//! - **definition**: A work definition bound to its tree position
//! - **tree**: Compilation of config blobs into immutable activity trees
//! - **handler**: The `ActivityHandler` trait and failure severity contract
//! - **run**: `ActivityRunner`, the claim-driven execution engine

pub mod definition;
pub mod handler;
pub mod path;
pub mod run;
pub mod tree;

pub use definition::ActivityDefinition;
pub use handler::{
    ActivityHandler, FilterReport, HandlerError, HandlerResult, ItemDisposition,
};
pub use path::ActivityPath;
pub use run::{ActivityRunner, ActivityRunnerConfig};
pub use tree::{Activity, ActivityTree};

#![allow(clippy::doc_markdown)] // Allow technical terms like YAML, UUID in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # TaskGrid Core
//!
//! Clustered batch-task execution engine for partitioned bulk work.
//!
//! ## Overview
//!
//! TaskGrid Core runs long-lived maintenance tasks (searches, propagations,
//! trigger scans, bulk updates) across a cluster of cooperating nodes. A task
//! is described by a tree of activities; each leaf activity slices its object
//! set into an ordered ledger of work buckets, and workers on any node race to
//! claim, process and complete those buckets through version-checked updates
//! against a shared object store.
//!
//! ## Architecture
//!
//! The engine implements a **store-arbitrated claim protocol**: there is no
//! coordinator process and no distributed lock manager. Every claim, lease
//! takeover and completion is a conditional update on the bucket record, so
//! any node can pick up any runnable task, crashed nodes lose their leases by
//! timeout, and progress survives restarts because all state lives in the
//! store rather than in process memory.
//!
//! ## Key Features
//!
//! - **Durable progress**: per-activity state records with monotonic counters
//! - **Cooperative claiming**: lease-based bucket ownership with crash takeover
//! - **Typed work definitions**: closed enum parsed through a dual-addressed factory
//! - **Composite tasks**: sequential and concurrent activity trees
//! - **Node lifecycle**: heartbeats, stale-node cleanup and orphan release
//!
//! ## Module Organization
//!
//! - [`activity`]: Activity trees, handlers, paths and the leaf/composite runner
//! - [`bucket`]: Work buckets, ledger planning and the claim protocol
//! - [`cluster`]: Node records, heartbeats and the background cleaner
//! - [`config`]: Engine configuration and the YAML configuration loader
//! - [`constants`]: Event names, defaults and status groupings
//! - [`definition`]: Work definitions and the dual-addressed factory
//! - [`error`]: Error taxonomy shared across the crate
//! - [`events`]: Broadcast lifecycle event publisher
//! - [`execution`]: Task runner, execution context and run results
//! - [`logging`]: Structured logging initialization and helpers
//! - [`registry`]: Handler registry wiring kinds to implementations
//! - [`state`]: Durable activity state and the guarded purge
//! - [`store`]: The `ObjectStore` trait and the in-memory implementation
//! - [`task`]: The task record and its scheduling states
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use taskgrid_core::cluster::ClusterManager;
//! use taskgrid_core::definition::{TypeTag, WorkConfig, WorkKind};
//! use taskgrid_core::execution::{StopSignal, TaskRunner};
//! use taskgrid_core::registry::ActivityHandlerRegistry;
//! use taskgrid_core::store::{InMemoryStore, ObjectStore};
//! use taskgrid_core::task::Task;
//!
//! # async fn example() -> taskgrid_core::Result<()> {
//! let store = Arc::new(InMemoryStore::new());
//! let registry = Arc::new(ActivityHandlerRegistry::new());
//! // registry.register_handler(WorkKind::Search, Arc::new(MySearchHandler));
//!
//! let cluster = Arc::new(ClusterManager::new(store.clone()));
//! cluster.register_current_node().await?;
//!
//! let task = Task::new(
//!     "nightly-recon",
//!     WorkConfig::typed(
//!         TypeTag::builtin(WorkKind::Search),
//!         serde_json::json!({"object_set": {"numeric_range": {"from": 0, "to": 10_000}}}),
//!     ),
//! );
//! store.put_task(&task).await?;
//!
//! let runner = TaskRunner::new(store, registry, cluster);
//! let result = runner.run_task(task.task_id, StopSignal::new()).await?;
//! println!("run ended: {result}");
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing
//!
//! All components run against [`store::InMemoryStore`], so the full claim and
//! execution protocol is exercised without external services:
//!
//! ```bash
//! cargo test                    # unit + integration tests
//! cargo test --test activity_run_tests
//! ```

pub mod activity;
pub mod bucket;
pub mod cluster;
pub mod config;
pub mod constants;
pub mod definition;
pub mod error;
pub mod events;
pub mod execution;
pub mod logging;
pub mod registry;
pub mod state;
pub mod store;
pub mod task;

// Re-export core types for convenience
pub use error::{CoreError, Result};

// Re-export event name constants under a crate-level alias
pub use constants::events as system_events;

// Activity execution surface
pub use activity::{
    Activity, ActivityDefinition, ActivityHandler, ActivityPath, ActivityRunner, ActivityTree,
    FilterReport, HandlerError, HandlerResult, ItemDisposition,
};

// Bucket claim protocol
pub use bucket::{BucketClaimer, BucketContent, BucketHolder, BucketState, WorkBucket};

// Cluster membership
pub use cluster::{ClusterManager, NodeCleaner, NodeRecord};

// Configuration
pub use config::{ConfigManager, EngineConfig};

// Work definitions
pub use definition::{
    ObjectSetSpec, TypeTag, WorkConfig, WorkDefinition, WorkDefinitionFactory, WorkKind,
};

// Events
pub use events::{EventPublisher, PublishedEvent};

// Task execution
pub use execution::{ExecutionContext, StopSignal, TaskRunResult, TaskRunner};

// Handler registry
pub use registry::ActivityHandlerRegistry;

// Durable state
pub use state::{ActivityState, ActivityStatus, ProgressCounters, ProgressDelta, StatePurger};

// Object store
pub use store::{InMemoryStore, ObjectStore};

// Tasks
pub use task::{SchedulingState, Task, TaskExecutionState};

//! # Shared Object Store
//!
//! Trait-based interface to the transactional store every node coordinates
//! through. The store is the single source of truth and the sole
//! synchronization point of the cluster: bucket claims are arbitrated purely
//! by the version-checked conditional update primitive, so there is no
//! distributed lock manager anywhere.
//!
//! The crate ships [`InMemoryStore`] for tests and embedders; SQL-backed
//! implementations live with the collaborators that own the schema.
//!
//! # Example
//!
//! ```no_run
//! use taskgrid_core::store::{InMemoryStore, ObjectStore};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = InMemoryStore::new();
//! let nodes = store.list_nodes().await?;
//! assert!(nodes.is_empty());
//! # Ok(())
//! # }
//! ```

use crate::activity::path::ActivityPath;
use crate::bucket::bucket::WorkBucket;
use crate::cluster::node::NodeRecord;
use crate::error::Result;
use crate::state::activity_state::{ActivityState, ProgressDelta};
use crate::task::Task;
use async_trait::async_trait;
use uuid::Uuid;

pub mod memory;

pub use memory::InMemoryStore;

/// Async interface to the shared transactional object store.
///
/// Implementations must be thread-safe; every method may be called
/// concurrently from workers on many nodes. Failures that are worth retrying
/// surface as [`TransientStoreError`](crate::error::CoreError::TransientStoreError).
#[async_trait]
pub trait ObjectStore: Send + Sync {
    // ===== Tasks =====

    async fn get_task(&self, task_id: Uuid) -> Result<Option<Task>>;

    /// Unconditional write of a task record
    async fn put_task(&self, task: &Task) -> Result<()>;

    // ===== Cluster nodes =====

    async fn get_node(&self, node_id: Uuid) -> Result<Option<NodeRecord>>;

    /// Insert or replace a node record (heartbeats overwrite in place)
    async fn upsert_node(&self, node: &NodeRecord) -> Result<()>;

    async fn list_nodes(&self) -> Result<Vec<NodeRecord>>;

    /// Delete a node record; `false` when it was already gone
    async fn delete_node(&self, node_id: Uuid) -> Result<bool>;

    // ===== Activity state =====

    async fn get_activity_state(
        &self,
        task_id: Uuid,
        path: &ActivityPath,
    ) -> Result<Option<ActivityState>>;

    /// Unconditional write of an activity state record
    async fn put_activity_state(&self, state: &ActivityState) -> Result<()>;

    /// All activity states of one task, any order
    async fn list_activity_states(&self, task_id: Uuid) -> Result<Vec<ActivityState>>;

    /// Atomically apply an additive progress delta and return the updated
    /// record. Progress counters only ever grow through this method, which
    /// is what keeps them monotonic under concurrent workers.
    async fn add_activity_progress(
        &self,
        task_id: Uuid,
        path: &ActivityPath,
        delta: &ProgressDelta,
    ) -> Result<ActivityState>;

    // ===== Bucket ledger =====

    /// Insert a bucket if its (task, path, sequence) slot is empty; `false`
    /// when another node seeded it first
    async fn insert_bucket(&self, bucket: &WorkBucket) -> Result<bool>;

    /// Ledger of one activity path, ordered by sequence
    async fn list_buckets(&self, task_id: Uuid, path: &ActivityPath) -> Result<Vec<WorkBucket>>;

    /// The conditional-update primitive behind the claim protocol: write
    /// `desired` only if the stored record's version still equals
    /// `expected.version`. `Ok(false)` means another writer won the race.
    async fn compare_and_update_bucket(
        &self,
        expected: &WorkBucket,
        desired: &WorkBucket,
    ) -> Result<bool>;

    /// Drop the whole ledger of one activity path, returning the count
    async fn delete_buckets(&self, task_id: Uuid, path: &ActivityPath) -> Result<u64>;
}

//! Failure-injecting wrapper around [`InMemoryStore`].

#![allow(dead_code)] // Each test binary uses a different slice of these helpers

use async_trait::async_trait;
use dashmap::DashSet;
use std::sync::Arc;
use taskgrid_core::activity::ActivityPath;
use taskgrid_core::bucket::WorkBucket;
use taskgrid_core::cluster::NodeRecord;
use taskgrid_core::error::{CoreError, Result};
use taskgrid_core::state::{ActivityState, ProgressDelta};
use taskgrid_core::store::{InMemoryStore, ObjectStore};
use taskgrid_core::task::Task;
use uuid::Uuid;

/// Store that delegates to an [`InMemoryStore`] but fails selected operations
/// with a transient error, for exercising the callers' failure handling.
#[derive(Default)]
pub struct FlakyStore {
    inner: InMemoryStore,
    failing_node_deletes: DashSet<Uuid>,
}

impl FlakyStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make every `delete_node` call for this node id fail
    pub fn fail_delete_node_for(&self, node_id: Uuid) {
        self.failing_node_deletes.insert(node_id);
    }
}

#[async_trait]
impl ObjectStore for FlakyStore {
    async fn get_task(&self, task_id: Uuid) -> Result<Option<Task>> {
        self.inner.get_task(task_id).await
    }

    async fn put_task(&self, task: &Task) -> Result<()> {
        self.inner.put_task(task).await
    }

    async fn get_node(&self, node_id: Uuid) -> Result<Option<NodeRecord>> {
        self.inner.get_node(node_id).await
    }

    async fn upsert_node(&self, node: &NodeRecord) -> Result<()> {
        self.inner.upsert_node(node).await
    }

    async fn list_nodes(&self) -> Result<Vec<NodeRecord>> {
        self.inner.list_nodes().await
    }

    async fn delete_node(&self, node_id: Uuid) -> Result<bool> {
        if self.failing_node_deletes.contains(&node_id) {
            return Err(CoreError::TransientStoreError(format!(
                "injected failure deleting node {node_id}"
            )));
        }
        self.inner.delete_node(node_id).await
    }

    async fn get_activity_state(
        &self,
        task_id: Uuid,
        path: &ActivityPath,
    ) -> Result<Option<ActivityState>> {
        self.inner.get_activity_state(task_id, path).await
    }

    async fn put_activity_state(&self, state: &ActivityState) -> Result<()> {
        self.inner.put_activity_state(state).await
    }

    async fn list_activity_states(&self, task_id: Uuid) -> Result<Vec<ActivityState>> {
        self.inner.list_activity_states(task_id).await
    }

    async fn add_activity_progress(
        &self,
        task_id: Uuid,
        path: &ActivityPath,
        delta: &ProgressDelta,
    ) -> Result<ActivityState> {
        self.inner.add_activity_progress(task_id, path, delta).await
    }

    async fn insert_bucket(&self, bucket: &WorkBucket) -> Result<bool> {
        self.inner.insert_bucket(bucket).await
    }

    async fn list_buckets(&self, task_id: Uuid, path: &ActivityPath) -> Result<Vec<WorkBucket>> {
        self.inner.list_buckets(task_id, path).await
    }

    async fn compare_and_update_bucket(
        &self,
        expected: &WorkBucket,
        desired: &WorkBucket,
    ) -> Result<bool> {
        self.inner.compare_and_update_bucket(expected, desired).await
    }

    async fn delete_buckets(&self, task_id: Uuid, path: &ActivityPath) -> Result<u64> {
        self.inner.delete_buckets(task_id, path).await
    }
}

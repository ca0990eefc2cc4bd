//! # In-Memory Object Store
//!
//! DashMap-backed [`ObjectStore`] used by tests and single-process
//! embedders. Conditional updates rely on the entry API locking one shard,
//! which gives the same atomicity the claim protocol expects from a
//! transactional backend.

use crate::activity::path::ActivityPath;
use crate::bucket::bucket::WorkBucket;
use crate::cluster::node::NodeRecord;
use crate::error::{CoreError, Result};
use crate::state::activity_state::{ActivityState, ProgressDelta};
use crate::store::ObjectStore;
use crate::task::Task;
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

/// Thread-safe in-memory store
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tasks: DashMap<Uuid, Task>,
    nodes: DashMap<Uuid, NodeRecord>,
    activity_states: DashMap<String, ActivityState>,
    buckets: DashMap<String, WorkBucket>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state_key(task_id: Uuid, path: &ActivityPath) -> String {
        format!("{task_id}:{path}")
    }

    fn bucket_key(task_id: Uuid, path: &ActivityPath, sequence: u32) -> String {
        format!("{task_id}:{path}:{sequence:08}")
    }
}

#[async_trait]
impl ObjectStore for InMemoryStore {
    async fn get_task(&self, task_id: Uuid) -> Result<Option<Task>> {
        Ok(self.tasks.get(&task_id).map(|entry| entry.clone()))
    }

    async fn put_task(&self, task: &Task) -> Result<()> {
        self.tasks.insert(task.task_id, task.clone());
        Ok(())
    }

    async fn get_node(&self, node_id: Uuid) -> Result<Option<NodeRecord>> {
        Ok(self.nodes.get(&node_id).map(|entry| entry.clone()))
    }

    async fn upsert_node(&self, node: &NodeRecord) -> Result<()> {
        self.nodes.insert(node.node_id, node.clone());
        Ok(())
    }

    async fn list_nodes(&self) -> Result<Vec<NodeRecord>> {
        Ok(self.nodes.iter().map(|entry| entry.clone()).collect())
    }

    async fn delete_node(&self, node_id: Uuid) -> Result<bool> {
        Ok(self.nodes.remove(&node_id).is_some())
    }

    async fn get_activity_state(
        &self,
        task_id: Uuid,
        path: &ActivityPath,
    ) -> Result<Option<ActivityState>> {
        Ok(self
            .activity_states
            .get(&Self::state_key(task_id, path))
            .map(|entry| entry.clone()))
    }

    async fn put_activity_state(&self, state: &ActivityState) -> Result<()> {
        self.activity_states.insert(
            Self::state_key(state.task_id, &state.activity_path),
            state.clone(),
        );
        Ok(())
    }

    async fn list_activity_states(&self, task_id: Uuid) -> Result<Vec<ActivityState>> {
        Ok(self
            .activity_states
            .iter()
            .filter(|entry| entry.task_id == task_id)
            .map(|entry| entry.clone())
            .collect())
    }

    async fn add_activity_progress(
        &self,
        task_id: Uuid,
        path: &ActivityPath,
        delta: &ProgressDelta,
    ) -> Result<ActivityState> {
        let key = Self::state_key(task_id, path);
        let mut entry = self.activity_states.get_mut(&key).ok_or_else(|| {
            CoreError::StateError(format!(
                "no activity state for task {task_id} path '{path}'"
            ))
        })?;
        entry.progress.add(delta);
        entry.updated_at = Utc::now();
        Ok(entry.clone())
    }

    async fn insert_bucket(&self, bucket: &WorkBucket) -> Result<bool> {
        let key = Self::bucket_key(bucket.task_id, &bucket.activity_path, bucket.sequence);
        match self.buckets.entry(key) {
            dashmap::mapref::entry::Entry::Occupied(_) => Ok(false),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(bucket.clone());
                Ok(true)
            }
        }
    }

    async fn list_buckets(&self, task_id: Uuid, path: &ActivityPath) -> Result<Vec<WorkBucket>> {
        let mut buckets: Vec<WorkBucket> = self
            .buckets
            .iter()
            .filter(|entry| entry.task_id == task_id && entry.activity_path == *path)
            .map(|entry| entry.clone())
            .collect();
        buckets.sort_by_key(|b| b.sequence);
        Ok(buckets)
    }

    async fn compare_and_update_bucket(
        &self,
        expected: &WorkBucket,
        desired: &WorkBucket,
    ) -> Result<bool> {
        if expected.task_id != desired.task_id
            || expected.activity_path != desired.activity_path
            || expected.sequence != desired.sequence
        {
            return Err(CoreError::StateError(
                "conditional bucket update must target one record".to_string(),
            ));
        }

        let key = Self::bucket_key(expected.task_id, &expected.activity_path, expected.sequence);
        match self.buckets.entry(key) {
            dashmap::mapref::entry::Entry::Occupied(mut slot) => {
                if slot.get().version == expected.version {
                    slot.insert(desired.clone());
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            dashmap::mapref::entry::Entry::Vacant(_) => Ok(false),
        }
    }

    async fn delete_buckets(&self, task_id: Uuid, path: &ActivityPath) -> Result<u64> {
        let keys: Vec<String> = self
            .buckets
            .iter()
            .filter(|entry| entry.task_id == task_id && entry.activity_path == *path)
            .map(|entry| entry.key().clone())
            .collect();
        let mut removed = 0;
        for key in keys {
            if self.buckets.remove(&key).is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

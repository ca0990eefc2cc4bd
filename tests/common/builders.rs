//! Work configuration builders and a wired-up engine harness.

#![allow(dead_code)] // Each test binary uses a different slice of these helpers

use serde_json::{json, Value};
use std::sync::Arc;
use taskgrid_core::activity::{ActivityHandler, ActivityPath, ActivityRunnerConfig};
use taskgrid_core::cluster::{ClusterManager, ClusterManagerConfig};
use taskgrid_core::constants::system;
use taskgrid_core::definition::{TypeTag, WorkConfig, WorkKind};
use taskgrid_core::error::Result;
use taskgrid_core::execution::{StopSignal, TaskRunResult, TaskRunner};
use taskgrid_core::registry::ActivityHandlerRegistry;
use taskgrid_core::state::ActivityState;
use taskgrid_core::store::{InMemoryStore, ObjectStore};
use taskgrid_core::task::Task;
use uuid::Uuid;

/// Payload accepted by every leaf work kind's supplier.
///
/// Kinds with mandatory extra fields get a fixed filler value.
pub fn leaf_payload(kind: WorkKind, from: i64, to: i64, bucket_size: u64) -> Value {
    let mut payload = json!({
        "object_set": {"numeric_range": {"from": from, "to": to}},
        "bucket_size": bucket_size,
    });
    match kind {
        WorkKind::TriggerScan => payload["trigger"] = "recalculate".into(),
        WorkKind::Scripting => payload["script"] = "obj.touch()".into(),
        WorkKind::AutoScaling => payload["max_buckets"] = 16.into(),
        _ => {}
    }
    payload
}

pub fn search_config(from: i64, to: i64, bucket_size: u64) -> WorkConfig {
    WorkConfig::typed(
        TypeTag::builtin(WorkKind::Search),
        leaf_payload(WorkKind::Search, from, to, bucket_size),
    )
}

pub fn search_config_in_mode(from: i64, to: i64, bucket_size: u64, mode: &str) -> WorkConfig {
    let mut payload = leaf_payload(WorkKind::Search, from, to, bucket_size);
    payload["mode"] = mode.into();
    WorkConfig::typed(TypeTag::builtin(WorkKind::Search), payload)
}

pub fn coordinate_config(children: Vec<(&str, WorkConfig)>, concurrent: bool) -> WorkConfig {
    let children: Vec<Value> = children
        .into_iter()
        .map(|(id, config)| json!({"id": id, "config": config}))
        .collect();
    WorkConfig::typed(
        TypeTag::builtin(WorkKind::Coordinate),
        json!({"concurrent": concurrent, "children": children}),
    )
}

/// A store, registry, registered cluster node and task runner wired together
/// the way an embedding process would do it at startup.
pub struct RunHarness {
    pub store: Arc<InMemoryStore>,
    pub registry: Arc<ActivityHandlerRegistry>,
    pub cluster: Arc<ClusterManager>,
    pub runner: TaskRunner,
}

impl RunHarness {
    /// Harness with `handler` registered for search work
    pub async fn with_handler(handler: Arc<dyn ActivityHandler>) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let registry = Arc::new(ActivityHandlerRegistry::new());
        registry.register_handler(WorkKind::Search, handler);

        let cluster = Arc::new(ClusterManager::with_config(
            store.clone(),
            ClusterManagerConfig::for_testing(),
        ));
        cluster
            .register_current_node()
            .await
            .expect("node registration");

        let runner = TaskRunner::with_config(
            store.clone(),
            registry.clone(),
            cluster.clone(),
            ActivityRunnerConfig::for_testing(),
        );

        Self {
            store,
            registry,
            cluster,
            runner,
        }
    }

    /// Persist a new task with the given root configuration
    pub async fn submit(&self, name: &str, config: WorkConfig) -> Task {
        let task = Task::new(name, config);
        self.store.put_task(&task).await.expect("task stored");
        task
    }

    pub async fn run(&self, task_id: Uuid) -> Result<TaskRunResult> {
        self.runner.run_task(task_id, StopSignal::new()).await
    }

    pub async fn run_with_stop(&self, task_id: Uuid, stop: StopSignal) -> Result<TaskRunResult> {
        self.runner.run_task(task_id, stop).await
    }

    pub async fn task(&self, task_id: Uuid) -> Task {
        self.store
            .get_task(task_id)
            .await
            .expect("task lookup")
            .expect("task exists")
    }

    pub async fn state_at(&self, task_id: Uuid, path: &str) -> Option<ActivityState> {
        let path: ActivityPath = path.parse().expect("valid path");
        self.store
            .get_activity_state(task_id, &path)
            .await
            .expect("state lookup")
    }

    pub async fn root_state(&self, task_id: Uuid) -> Option<ActivityState> {
        self.state_at(task_id, system::ROOT_ACTIVITY_ID).await
    }
}

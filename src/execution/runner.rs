//! # Task Runner
//!
//! The entry point the external scheduler invokes. `run_task` loads the task
//! record, guards against a second run while a live node owns one, marks the
//! task running, compiles and validates its activity tree, executes the root
//! activity, and writes the outcome back: last run result, cleared owning
//! node, and the scheduling state the result implies.
//!
//! A run whose owning node died mid-flight leaves the task RUNNING; the next
//! invocation detects the dead owner through cluster liveness and takes the
//! task over, which together with bucket lease recovery makes node crashes
//! invisible to the schedule beyond the lease delay.

use crate::activity::path::ActivityPath;
use crate::activity::run::{ActivityRunner, ActivityRunnerConfig};
use crate::activity::tree::ActivityTree;
use crate::cluster::ClusterManager;
use crate::constants::{events, system};
use crate::error::{CoreError, Result};
use crate::events::EventPublisher;
use crate::execution::context::{ExecutionContext, StopSignal};
use crate::execution::result::TaskRunResult;
use crate::logging::{log_error, log_task_operation};
use crate::registry::ActivityHandlerRegistry;
use crate::state::ActivityState;
use crate::store::ObjectStore;
use crate::task::{SchedulingState, Task, TaskExecutionState};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Task execution orchestrator for scheduler-triggered runs
pub struct TaskRunner {
    store: Arc<dyn ObjectStore>,
    registry: Arc<ActivityHandlerRegistry>,
    cluster: Arc<ClusterManager>,
    runner: ActivityRunner,
    events: Option<EventPublisher>,
}

impl TaskRunner {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        registry: Arc<ActivityHandlerRegistry>,
        cluster: Arc<ClusterManager>,
    ) -> Self {
        Self::with_config(store, registry, cluster, ActivityRunnerConfig::default())
    }

    pub fn with_config(
        store: Arc<dyn ObjectStore>,
        registry: Arc<ActivityHandlerRegistry>,
        cluster: Arc<ClusterManager>,
        config: ActivityRunnerConfig,
    ) -> Self {
        let runner = ActivityRunner::with_config(store.clone(), registry.clone(), config);
        Self {
            store,
            registry,
            cluster,
            runner,
            events: None,
        }
    }

    /// Attach an event publisher; activity and bucket events flow through it too
    pub fn with_event_publisher(mut self, events: EventPublisher) -> Self {
        self.runner = self.runner.with_event_publisher(events.clone());
        self.events = Some(events);
        self
    }

    /// Execute one run of a task on this node.
    ///
    /// Returns the run's outcome; `Err` means the run was refused (unknown
    /// task, live concurrent run, suspended task) or died on infrastructure,
    /// in which case the classified result is already recorded on the task.
    #[instrument(skip(self, stop), fields(task_id = %task_id, node_id = %self.cluster.node_id()))]
    pub async fn run_task(&self, task_id: Uuid, stop: StopSignal) -> Result<TaskRunResult> {
        let mut task = self.store.get_task(task_id).await?.ok_or_else(|| {
            CoreError::StateError(format!("Task {task_id} not found"))
        })?;

        self.guard_run(&task).await?;

        let now = Utc::now();
        task.begin_run(self.cluster.node_id(), now);
        self.store.put_task(&task).await?;

        log_task_operation(
            "run_started",
            Some(task.task_id),
            Some(&task.name),
            "running",
            None,
        );
        if let Some(publisher) = &self.events {
            publisher.publish(
                events::TASK_RUN_STARTED,
                json!({
                    "task_id": task.task_id,
                    "task_name": task.name,
                    "node_id": self.cluster.node_id(),
                }),
            );
        }

        let outcome = self.execute_run(&task, stop).await;
        let result = match &outcome {
            Ok(result) => *result,
            Err(e) => {
                log_error("task_runner", "run_task", &e.to_string(), Some(&task.name));
                TaskRunResult::from_error(e)
            }
        };

        if let Some(root_state) = self.root_state(task_id).await? {
            task.progress = root_state.progress;
        }
        task.finish_run(result, Utc::now());
        self.store.put_task(&task).await?;

        log_task_operation(
            "run_completed",
            Some(task.task_id),
            Some(&task.name),
            &result.to_string(),
            Some(&task.scheduling_state.to_string()),
        );
        if let Some(publisher) = &self.events {
            publisher.publish(
                events::TASK_RUN_COMPLETED,
                json!({
                    "task_id": task.task_id,
                    "task_name": task.name,
                    "node_id": self.cluster.node_id(),
                    "result": result,
                    "scheduling_state": task.scheduling_state.to_string(),
                }),
            );
        }

        match result {
            TaskRunResult::Finished => info!(task_name = %task.name, "✅ Task run finished"),
            other => warn!(task_name = %task.name, result = %other, "Task run ended early"),
        }

        outcome
    }

    /// Refuse runs that would violate task-level exclusivity or retry a
    /// permanent failure
    async fn guard_run(&self, task: &Task) -> Result<()> {
        if task.execution_state == TaskExecutionState::Running {
            match task.owning_node {
                Some(owner) if owner == self.cluster.node_id() => {
                    // Our own stale record: a previous run on this node never
                    // got its closing write through.
                    warn!("Task still marked running by this node, taking over");
                }
                Some(owner) => {
                    if self.cluster.is_node_checking_in(owner).await? {
                        return Err(CoreError::StateError(format!(
                            "Task '{}' is already running on live node {owner}",
                            task.name
                        )));
                    }
                    warn!(
                        previous_node = %owner,
                        "🎯 Taking over task from node that stopped checking in"
                    );
                }
                None => {
                    warn!("Task marked running without an owning node, taking over");
                }
            }
        }

        if task.scheduling_state == SchedulingState::Suspended {
            return Err(CoreError::StateError(format!(
                "Task '{}' is suspended after a permanent failure; operator action required",
                task.name
            )));
        }
        if task.scheduling_state == SchedulingState::Waiting {
            info!(task_name = %task.name, "Parked task run explicitly invoked");
        }
        Ok(())
    }

    async fn execute_run(&self, task: &Task, stop: StopSignal) -> Result<TaskRunResult> {
        let tree = ActivityTree::compile(self.registry.factory(), &task.root_config)?;
        self.registry.validate_tree(&tree)?;

        let ctx = ExecutionContext::new(task.task_id, self.cluster.node_id(), stop);
        self.runner.run_activity(&ctx, tree.root()).await
    }

    async fn root_state(&self, task_id: Uuid) -> Result<Option<ActivityState>> {
        let root_path = ActivityPath::root(system::ROOT_ACTIVITY_ID);
        self.store.get_activity_state(task_id, &root_path).await
    }
}

//! # Tasks
//!
//! The persistent, schedulable unit of work. A task references its root work
//! configuration (structured-tag or legacy addressed) and carries the
//! scheduling/execution state the external trigger service reads to decide
//! when to invoke the next run.

use crate::definition::factory::WorkConfig;
use crate::execution::result::TaskRunResult;
use crate::state::activity_state::ProgressCounters;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Whether the external scheduler may trigger the task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulingState {
    /// Eligible for triggering
    #[default]
    Runnable,
    /// Explicitly paused, e.g. awaiting external approval
    Waiting,
    /// Failed permanently; requires operator action before rescheduling
    Suspended,
}

impl fmt::Display for SchedulingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Runnable => write!(f, "runnable"),
            Self::Waiting => write!(f, "waiting"),
            Self::Suspended => write!(f, "suspended"),
        }
    }
}

impl std::str::FromStr for SchedulingState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "runnable" => Ok(Self::Runnable),
            "waiting" => Ok(Self::Waiting),
            "suspended" => Ok(Self::Suspended),
            _ => Err(format!("Invalid scheduling state: {s}")),
        }
    }
}

/// Whether a run of the task is currently executing somewhere
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskExecutionState {
    Running,
    #[default]
    Closed,
}

impl fmt::Display for TaskExecutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

impl std::str::FromStr for TaskExecutionState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(Self::Running),
            "closed" => Ok(Self::Closed),
            _ => Err(format!("Invalid task execution state: {s}")),
        }
    }
}

/// Persistent schedulable unit of work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub task_id: Uuid,
    pub name: String,
    pub scheduling_state: SchedulingState,
    pub execution_state: TaskExecutionState,
    /// Root work configuration, parsed by the factory at run time
    pub root_config: WorkConfig,
    /// Node currently executing a run; must refer to a live node while set
    pub owning_node: Option<Uuid>,
    pub last_run_result: Option<TaskRunResult>,
    /// Aggregate counters mirrored from the root activity state
    pub progress: ProgressCounters,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn new(name: impl Into<String>, root_config: WorkConfig) -> Self {
        let now = Utc::now();
        Self {
            task_id: Uuid::new_v4(),
            name: name.into(),
            scheduling_state: SchedulingState::default(),
            execution_state: TaskExecutionState::default(),
            root_config,
            owning_node: None,
            last_run_result: None,
            progress: ProgressCounters::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// True when the scheduler may trigger a run right now
    pub fn is_runnable(&self) -> bool {
        self.scheduling_state == SchedulingState::Runnable
            && self.execution_state == TaskExecutionState::Closed
    }

    /// Mark a run as started on `node_id`
    pub fn begin_run(&mut self, node_id: Uuid, now: DateTime<Utc>) {
        self.execution_state = TaskExecutionState::Running;
        self.owning_node = Some(node_id);
        self.updated_at = now;
    }

    /// Record a finished run: clear the owning node, close execution, and
    /// derive the next scheduling state from the result
    pub fn finish_run(&mut self, result: TaskRunResult, now: DateTime<Utc>) {
        self.execution_state = TaskExecutionState::Closed;
        self.owning_node = None;
        self.last_run_result = Some(result);
        self.scheduling_state = Self::next_scheduling_state(result);
        self.updated_at = now;
    }

    /// Scheduling state implied by a run result: permanent failures suspend
    /// the task until operator action, explicit waits park it, everything
    /// else leaves it eligible for the next trigger
    pub fn next_scheduling_state(result: TaskRunResult) -> SchedulingState {
        match result {
            TaskRunResult::PermanentError => SchedulingState::Suspended,
            TaskRunResult::Waiting => SchedulingState::Waiting,
            TaskRunResult::Finished
            | TaskRunResult::TemporaryError
            | TaskRunResult::Interrupted => SchedulingState::Runnable,
        }
    }
}

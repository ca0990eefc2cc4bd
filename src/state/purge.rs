//! # State Purging
//!
//! Purging erases an activity subtree's persisted run history so its next run starts
//! from nothing: progress counters reset, status returns to NOT_STARTED, the bucket
//! ledger is deleted and the realization counter is bumped so any ledger remnants from
//! the old realization are recognizably stale.
//!
//! The purge is guarded, not forced. It refuses while the owning task runs on a live
//! node or while any bucket in the subtree is held under an unexpired lease by a node
//! that is still checking in. A dead holder does not block purging; its completion
//! attempts fail their conditional update once the records are gone.

use crate::activity::path::ActivityPath;
use crate::cluster::ClusterManager;
use crate::constants::events;
use crate::error::{CoreError, Result};
use crate::events::EventPublisher;
use crate::state::activity_state::ActivityState;
use crate::store::ObjectStore;
use crate::task::TaskExecutionState;
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, instrument};
use uuid::Uuid;

/// Outcome counts from one purge
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeReport {
    pub activities_purged: usize,
    pub buckets_deleted: u64,
}

/// Guarded eraser of activity run state
pub struct StatePurger {
    store: Arc<dyn ObjectStore>,
    events: Option<EventPublisher>,
}

impl StatePurger {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            events: None,
        }
    }

    /// Attach an event publisher for purge events
    pub fn with_event_publisher(mut self, events: EventPublisher) -> Self {
        self.events = Some(events);
        self
    }

    /// Purge persisted state for the subtree rooted at `prefix`.
    ///
    /// Purging a path with no persisted state is a no-op. The guard checks run before
    /// the first deletion, so a refused purge changes nothing.
    #[instrument(skip(self, cluster), fields(task_id = %task_id, prefix = %prefix))]
    pub async fn purge_subtree(
        &self,
        cluster: &ClusterManager,
        task_id: Uuid,
        prefix: &ActivityPath,
    ) -> Result<PurgeReport> {
        if let Some(task) = self.store.get_task(task_id).await? {
            if matches!(task.execution_state, TaskExecutionState::Running) {
                if let Some(owner) = task.owning_node {
                    if cluster.is_node_checking_in(owner).await? {
                        return Err(CoreError::StateError(format!(
                            "Cannot purge '{prefix}': task {task_id} is running on live node {owner}"
                        )));
                    }
                }
            }
        }

        let states = self.store.list_activity_states(task_id).await?;
        let targets: Vec<ActivityState> = states
            .into_iter()
            .filter(|state| state.activity_path.starts_with(prefix))
            .collect();

        let now = Utc::now();
        for state in &targets {
            let buckets = self.store.list_buckets(task_id, &state.activity_path).await?;
            for bucket in &buckets {
                if !bucket.state.is_active() || bucket.is_lease_expired_at(now) {
                    continue;
                }
                if let Some(holder) = bucket.holder {
                    if cluster.is_node_checking_in(holder.node_id).await? {
                        return Err(CoreError::StateError(format!(
                            "Cannot purge '{}': bucket {} is held under a live lease by node {}",
                            state.activity_path, bucket.sequence, holder.node_id
                        )));
                    }
                }
            }
        }

        let mut report = PurgeReport::default();
        for state in &targets {
            report.buckets_deleted += self
                .store
                .delete_buckets(task_id, &state.activity_path)
                .await?;

            let purged = state.purged(now);
            self.store.put_activity_state(&purged).await?;
            report.activities_purged += 1;

            info!(
                path = %purged.activity_path,
                realization = purged.realization,
                "🧹 Activity state purged"
            );
            if let Some(events) = &self.events {
                events.publish(
                    events::ACTIVITY_STATE_PURGED,
                    json!({
                        "task_id": task_id,
                        "activity_path": purged.activity_path.to_string(),
                        "realization": purged.realization,
                    }),
                );
            }
        }

        if report.activities_purged == 0 {
            debug!("No persisted state under prefix, nothing to purge");
        }

        Ok(report)
    }
}

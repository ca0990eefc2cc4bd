//! # Activity Execution
//!
//! ## Architecture: Claim-Driven Leaf Runs, Recursive Composites
//!
//! `ActivityRunner` executes one compiled activity tree against the store. Leaves seed
//! their bucket ledger, spawn a pool of claim-process-complete workers, and derive a
//! run result from worker outcomes plus the final ledger shape. Composites recurse into
//! children, in declaration order or concurrently, and merge child results keeping the
//! most severe.
//!
//! Two cancellation scopes exist. The external stop signal on the run context
//! interrupts the whole task and yields INTERRUPTED; the activity-local halt raised by
//! a failing worker stops that activity's sibling workers from claiming further buckets
//! while the failure itself carries the run result.
//!
//! Crash consistency is inherited from the claim protocol: infrastructure errors abort
//! the run without finishing activity status, which is exactly the state a crashed node
//! leaves behind, and the next run resumes through lease recovery.

use crate::activity::definition::ActivityDefinition;
use crate::activity::handler::{ActivityHandler, ItemDisposition};
use crate::activity::tree::Activity;
use crate::bucket::{BucketClaimer, BucketClaimerConfig, BucketContent, WorkBucket};
use crate::constants::{events, system};
use crate::definition::{ExecutionMode, WorkDefinition};
use crate::error::{CoreError, Result};
use crate::events::EventPublisher;
use crate::execution::{ExecutionContext, StopSignal, TaskRunResult};
use crate::registry::ActivityHandlerRegistry;
use crate::state::{ActivityState, ActivityStatus, ProgressDelta};
use crate::store::ObjectStore;
use chrono::Utc;
use futures::future::{join_all, BoxFuture};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Configuration for activity execution
#[derive(Debug, Clone)]
pub struct ActivityRunnerConfig {
    /// Concurrent claim workers per leaf activity run
    pub workers_per_activity: usize,
    /// Bucket size applied when a definition does not specify one
    pub default_bucket_size: u64,
    /// Claim protocol tuning passed through to the bucket claimer
    pub claimer: BucketClaimerConfig,
}

impl Default for ActivityRunnerConfig {
    fn default() -> Self {
        Self {
            workers_per_activity: system::DEFAULT_WORKERS_PER_ACTIVITY,
            default_bucket_size: system::DEFAULT_BUCKET_SIZE,
            claimer: BucketClaimerConfig::default(),
        }
    }
}

impl ActivityRunnerConfig {
    /// Small buckets and short leases for fast test runs
    pub fn for_testing() -> Self {
        Self {
            workers_per_activity: 3,
            default_bucket_size: 10,
            claimer: BucketClaimerConfig::for_testing(),
        }
    }
}

/// Executes compiled activity trees through the claim protocol
pub struct ActivityRunner {
    store: Arc<dyn ObjectStore>,
    registry: Arc<ActivityHandlerRegistry>,
    claimer: Arc<BucketClaimer>,
    events: Option<EventPublisher>,
    config: ActivityRunnerConfig,
}

impl ActivityRunner {
    pub fn new(store: Arc<dyn ObjectStore>, registry: Arc<ActivityHandlerRegistry>) -> Self {
        Self::with_config(store, registry, ActivityRunnerConfig::default())
    }

    pub fn with_config(
        store: Arc<dyn ObjectStore>,
        registry: Arc<ActivityHandlerRegistry>,
        config: ActivityRunnerConfig,
    ) -> Self {
        let claimer = Arc::new(BucketClaimer::with_config(
            store.clone(),
            config.claimer.clone(),
        ));
        Self {
            store,
            registry,
            claimer,
            events: None,
            config,
        }
    }

    /// Attach an event publisher; claim lifecycle events flow through it too
    pub fn with_event_publisher(mut self, events: EventPublisher) -> Self {
        self.claimer = Arc::new(
            BucketClaimer::with_config(self.store.clone(), self.config.claimer.clone())
                .with_event_publisher(events.clone()),
        );
        self.events = Some(events);
        self
    }

    pub fn config(&self) -> &ActivityRunnerConfig {
        &self.config
    }

    /// Run one activity subtree to a result.
    ///
    /// Returns `Err` only for infrastructure failures; handler failures and
    /// interruptions come back as the corresponding [`TaskRunResult`].
    pub async fn run_activity(
        &self,
        ctx: &ExecutionContext,
        activity: &Activity,
    ) -> Result<TaskRunResult> {
        self.run_boxed(ctx, activity).await
    }

    // Composites recurse through here; boxing keeps the future size finite.
    fn run_boxed<'a>(
        &'a self,
        ctx: &'a ExecutionContext,
        activity: &'a Activity,
    ) -> BoxFuture<'a, Result<TaskRunResult>> {
        Box::pin(async move {
            if activity.is_composite() {
                self.run_composite(ctx, activity).await
            } else {
                self.run_leaf(ctx, activity).await
            }
        })
    }

    #[instrument(skip(self, ctx, activity), fields(task_id = %ctx.task_id, path = %activity.path()))]
    async fn run_composite(
        &self,
        ctx: &ExecutionContext,
        activity: &Activity,
    ) -> Result<TaskRunResult> {
        ctx.stop.ensure_running("starting composite activity")?;

        let state = self.ensure_state(ctx.task_id, activity).await?;
        if state.status == ActivityStatus::Complete {
            debug!("Composite already complete, skipping");
            return Ok(TaskRunResult::Finished);
        }

        let run_started = Utc::now();
        self.mark_started(ctx, activity, state, run_started).await?;

        let concurrent = matches!(
            &activity.definition.definition,
            WorkDefinition::Coordinate(c) if c.concurrent
        );

        let mut merged = TaskRunResult::Finished;
        if concurrent {
            // Children run concurrently on this task; their own workers are spawned.
            let results = join_all(
                activity
                    .children
                    .iter()
                    .map(|child| self.run_boxed(ctx, child)),
            )
            .await;

            let mut first_error = None;
            for result in results {
                match result {
                    Ok(child_result) => merged = merged.merge(child_result),
                    Err(e) => {
                        if first_error.is_none() {
                            first_error = Some(e);
                        }
                    }
                }
            }
            if let Some(e) = first_error {
                return Err(e);
            }
        } else {
            for child in &activity.children {
                let child_result = self.run_boxed(ctx, child).await?;
                merged = merged.merge(child_result);
                if child_result != TaskRunResult::Finished {
                    debug!(
                        child = %child.path(),
                        result = %child_result,
                        "Child did not finish, later siblings stay unstarted"
                    );
                    break;
                }
            }
        }

        self.finish_activity(ctx, activity, merged, run_started).await?;
        Ok(merged)
    }

    #[instrument(skip(self, ctx, activity), fields(task_id = %ctx.task_id, path = %activity.path()))]
    async fn run_leaf(&self, ctx: &ExecutionContext, activity: &Activity) -> Result<TaskRunResult> {
        ctx.stop.ensure_running("starting activity")?;

        let path = activity.path();
        let state = self.ensure_state(ctx.task_id, activity).await?;
        if state.status == ActivityStatus::Complete {
            debug!("Activity already complete, skipping");
            return Ok(TaskRunResult::Finished);
        }
        let realization = state.realization;

        let run_started = Utc::now();
        self.mark_started(ctx, activity, state, run_started).await?;

        let contents = activity
            .definition
            .plan_bucket_contents(self.config.default_bucket_size)?;
        if contents.is_empty() {
            let result = TaskRunResult::Finished;
            self.finish_activity(ctx, activity, result, run_started).await?;
            return Ok(result);
        }

        let handler = self.registry.handler_for(&activity.definition)?;
        let total = self
            .claimer
            .ensure_ledger(ctx.task_id, path, realization, contents)
            .await?;

        let halt = StopSignal::default();
        let worker_count = self.config.workers_per_activity.clamp(1, total.max(1));
        let mut handles = Vec::with_capacity(worker_count);
        for _ in 0..worker_count {
            let worker = LeafWorker {
                claimer: self.claimer.clone(),
                store: self.store.clone(),
                handler: handler.clone(),
                activity: activity.definition.clone(),
                halt: halt.clone(),
                ctx: ctx.for_worker(),
            };
            handles.push(tokio::spawn(worker.run()));
        }

        // Await every worker before propagating anything, so no claimant outlives
        // the run.
        let mut joined = Vec::with_capacity(handles.len());
        for handle in handles {
            joined.push(handle.await);
        }

        let mut merged = TaskRunResult::Finished;
        let mut first_error = None;
        for outcome in joined {
            match outcome {
                Ok(Ok(result)) => merged = merged.merge(result),
                Ok(Err(e)) => {
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
                Err(join_err) => {
                    error!(error = %join_err, "Worker task aborted");
                    if first_error.is_none() {
                        first_error =
                            Some(CoreError::StateError(format!("worker task aborted: {join_err}")));
                    }
                }
            }
        }
        if let Some(e) = first_error {
            return Err(e);
        }

        if merged == TaskRunResult::Finished {
            let summary = self.claimer.ledger_summary(ctx.task_id, path).await?;
            if !summary.all_complete() {
                // Drained locally while another claimant still holds buckets.
                merged = merged.merge(TaskRunResult::Waiting);
            }
        }

        self.finish_activity(ctx, activity, merged, run_started).await?;
        Ok(merged)
    }

    /// Load the activity's persisted state, creating the initial record on first run
    async fn ensure_state(&self, task_id: Uuid, activity: &Activity) -> Result<ActivityState> {
        let path = activity.path();
        if let Some(state) = self.store.get_activity_state(task_id, path).await? {
            return Ok(state);
        }
        let state = ActivityState::new(task_id, path.clone());
        self.store.put_activity_state(&state).await?;
        Ok(state)
    }

    async fn mark_started(
        &self,
        ctx: &ExecutionContext,
        activity: &Activity,
        mut state: ActivityState,
        now: chrono::DateTime<Utc>,
    ) -> Result<()> {
        state.transition_to(ActivityStatus::InProgress, now)?;
        self.store.put_activity_state(&state).await?;

        info!(
            kind = %activity.definition.kind(),
            realization = state.realization,
            "🔧 Activity run started"
        );
        if let Some(events) = &self.events {
            events.publish(
                events::ACTIVITY_STARTED,
                json!({
                    "task_id": ctx.task_id,
                    "activity_path": activity.path().to_string(),
                    "realization": state.realization,
                    "kind": activity.definition.kind().to_string(),
                }),
            );
        }
        Ok(())
    }

    async fn finish_activity(
        &self,
        ctx: &ExecutionContext,
        activity: &Activity,
        result: TaskRunResult,
        run_started: chrono::DateTime<Utc>,
    ) -> Result<()> {
        let path = activity.path();
        let now = Utc::now();
        let Some(mut state) = self.store.get_activity_state(ctx.task_id, path).await? else {
            return Ok(());
        };

        state.record_run_ended(run_started, now);
        let target = match result {
            TaskRunResult::Finished => Some(ActivityStatus::Complete),
            TaskRunResult::Interrupted
            | TaskRunResult::TemporaryError
            | TaskRunResult::PermanentError => Some(ActivityStatus::Paused),
            // Another node is still working; its completion closes the status.
            TaskRunResult::Waiting => None,
        };
        if let Some(next) = target {
            if state.status.can_transition_to(next) {
                state.transition_to(next, now)?;
            } else {
                debug!(status = %state.status, target = %next, "Status already settled elsewhere");
            }
        }
        self.store.put_activity_state(&state).await?;

        match result {
            TaskRunResult::Finished => {
                info!("✅ Activity completed");
                if let Some(events) = &self.events {
                    events.publish(
                        events::ACTIVITY_COMPLETED,
                        json!({
                            "task_id": ctx.task_id,
                            "activity_path": path.to_string(),
                            "items_processed": state.progress.items_processed,
                        }),
                    );
                }
            }
            TaskRunResult::Interrupted => {
                info!("Activity interrupted, state retained for resume");
                if let Some(events) = &self.events {
                    events.publish(
                        events::ACTIVITY_INTERRUPTED,
                        json!({
                            "task_id": ctx.task_id,
                            "activity_path": path.to_string(),
                        }),
                    );
                }
            }
            other => {
                warn!(result = %other, "Activity run ended without completing");
            }
        }
        Ok(())
    }
}

/// How one bucket's processing ended
enum BucketOutcome {
    Completed,
    /// Completion lost the conditional update; another claimant owns the bucket now
    LeaseLost,
    Interrupted,
    /// Stopped because a sibling worker raised the activity-local halt
    Halted,
    Failed(TaskRunResult),
}

/// One claim-process-complete worker inside a leaf run
struct LeafWorker {
    claimer: Arc<BucketClaimer>,
    store: Arc<dyn ObjectStore>,
    handler: Arc<dyn ActivityHandler>,
    activity: ActivityDefinition,
    halt: StopSignal,
    ctx: ExecutionContext,
}

impl LeafWorker {
    async fn run(self) -> Result<TaskRunResult> {
        loop {
            if self.halt.is_stop_requested() {
                return Ok(TaskRunResult::Finished);
            }

            let bucket = match self.claimer.claim_next(&self.ctx, &self.activity.path).await {
                Ok(Some(bucket)) => bucket,
                Ok(None) => return Ok(TaskRunResult::Finished),
                Err(CoreError::Interrupted(_)) => return Ok(TaskRunResult::Interrupted),
                Err(e) => return Err(e),
            };

            match self.process_bucket(&bucket).await? {
                BucketOutcome::Completed | BucketOutcome::LeaseLost => continue,
                BucketOutcome::Interrupted => return Ok(TaskRunResult::Interrupted),
                BucketOutcome::Halted => return Ok(TaskRunResult::Finished),
                BucketOutcome::Failed(result) => {
                    self.halt.request_stop();
                    return Ok(result);
                }
            }
        }
    }

    async fn process_bucket(&self, bucket: &WorkBucket) -> Result<BucketOutcome> {
        match &bucket.content {
            BucketContent::Interval { from, to } => self.process_interval(bucket, *from, *to).await,
            BucketContent::Filter { predicate } => self.process_filter(bucket, predicate).await,
        }
    }

    async fn process_interval(
        &self,
        bucket: &WorkBucket,
        from: i64,
        to: i64,
    ) -> Result<BucketOutcome> {
        let dry_run = self.activity.execution_mode() == ExecutionMode::DryRun;
        let mut delta = ProgressDelta::default();

        for item_id in from..to {
            if self.ctx.stop.is_stop_requested() {
                self.flush(&delta).await?;
                self.claimer.release(&self.ctx, bucket).await?;
                return Ok(BucketOutcome::Interrupted);
            }
            if self.halt.is_stop_requested() {
                self.flush(&delta).await?;
                self.claimer.release(&self.ctx, bucket).await?;
                return Ok(BucketOutcome::Halted);
            }

            if dry_run {
                delta.items_processed += 1;
                continue;
            }

            match self.handler.handle_item(&self.ctx, &self.activity, item_id).await {
                Ok(ItemDisposition::Processed) => delta.items_processed += 1,
                Ok(ItemDisposition::Skipped) => delta.items_skipped += 1,
                Ok(ItemDisposition::Failed) => delta.items_failed += 1,
                Err(err) => {
                    delta.items_failed += 1;
                    self.flush(&delta).await?;
                    self.claimer.release(&self.ctx, bucket).await?;
                    let core: CoreError = err.into();
                    warn!(
                        item_id,
                        sequence = bucket.sequence,
                        error = %core,
                        "❌ Handler failure halts activity"
                    );
                    return Ok(BucketOutcome::Failed(TaskRunResult::from_error(&core)));
                }
            }
        }

        delta.buckets_completed = 1;
        if self.claimer.complete(&self.ctx, bucket).await? {
            self.flush(&delta).await?;
            Ok(BucketOutcome::Completed)
        } else {
            // The reclaiming worker accounts for this bucket; counting ours too
            // would double count its completion.
            Ok(BucketOutcome::LeaseLost)
        }
    }

    async fn process_filter(&self, bucket: &WorkBucket, predicate: &str) -> Result<BucketOutcome> {
        if self.ctx.stop.is_stop_requested() {
            self.claimer.release(&self.ctx, bucket).await?;
            return Ok(BucketOutcome::Interrupted);
        }
        if self.halt.is_stop_requested() {
            self.claimer.release(&self.ctx, bucket).await?;
            return Ok(BucketOutcome::Halted);
        }

        let mut delta = ProgressDelta::default();
        if self.activity.execution_mode() != ExecutionMode::DryRun {
            match self
                .handler
                .handle_filter(&self.ctx, &self.activity, predicate)
                .await
            {
                Ok(report) => {
                    delta.items_processed = report.items_processed;
                    delta.items_failed = report.items_failed;
                    delta.items_skipped = report.items_skipped;
                }
                Err(err) => {
                    self.claimer.release(&self.ctx, bucket).await?;
                    let core: CoreError = err.into();
                    warn!(
                        predicate,
                        sequence = bucket.sequence,
                        error = %core,
                        "❌ Handler failure halts activity"
                    );
                    return Ok(BucketOutcome::Failed(TaskRunResult::from_error(&core)));
                }
            }
        }

        delta.buckets_completed = 1;
        if self.claimer.complete(&self.ctx, bucket).await? {
            self.flush(&delta).await?;
            Ok(BucketOutcome::Completed)
        } else {
            Ok(BucketOutcome::LeaseLost)
        }
    }

    async fn flush(&self, delta: &ProgressDelta) -> Result<()> {
        if delta.is_empty() {
            return Ok(());
        }
        self.store
            .add_activity_progress(self.ctx.task_id, &self.activity.path, delta)
            .await?;
        Ok(())
    }
}

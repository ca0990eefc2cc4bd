//! # Bucket Claimer
//!
//! ## Architecture: Distributed Bucket Claiming over Versioned Records
//!
//! The BucketClaimer component walks an activity's bucket ledger in sequence order and
//! claims the lowest claimable bucket through a compare-and-update on the store. A claim
//! stamps the bucket with the claiming node, worker and a lease deadline, so a crashed
//! worker's bucket becomes claimable again once its lease runs out.
//!
//! ## Key Features
//!
//! - **Atomic Bucket Claiming**: Version-checked compare-and-update for distributed safety
//! - **Deterministic Ordering**: Always claims the lowest-sequence claimable bucket
//! - **Lease-Based Recovery**: Expired leases make abandoned buckets claimable again
//! - **Conditional Completion**: A lost lease turns completion into a no-op, never a double count
//!
//! ## Usage
//!
//! ```rust
//! use taskgrid_core::bucket::{BucketClaimer, BucketContent};
//! use taskgrid_core::execution::ExecutionContext;
//! use taskgrid_core::store::InMemoryStore;
//! use std::sync::Arc;
//!
//! # async fn example(ctx: ExecutionContext, path: taskgrid_core::activity::ActivityPath)
//! #     -> Result<(), Box<dyn std::error::Error>> {
//! let claimer = BucketClaimer::new(Arc::new(InMemoryStore::new()));
//!
//! while let Some(bucket) = claimer.claim_next(&ctx, &path).await? {
//!     // Process the bucket's items...
//!
//!     claimer.complete(&ctx, &bucket).await?;
//! }
//! # Ok(())
//! # }
//! ```

use crate::activity::ActivityPath;
use crate::bucket::bucket::{BucketContent, BucketHolder, BucketState, WorkBucket};
use crate::constants::{events, system};
use crate::error::{CoreError, Result};
use crate::events::EventPublisher;
use crate::execution::ExecutionContext;
use crate::logging::log_bucket_operation;
use crate::store::ObjectStore;
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Configuration for bucket claiming behavior
#[derive(Debug, Clone)]
pub struct BucketClaimerConfig {
    /// How long a claim lease lasts before the bucket becomes reclaimable
    pub lease_timeout: Duration,
    /// Delay before retrying after losing a claim race
    pub claim_retry_delay: Duration,
}

impl Default for BucketClaimerConfig {
    fn default() -> Self {
        Self {
            lease_timeout: Duration::from_secs(system::DEFAULT_LEASE_TIMEOUT_SECONDS),
            claim_retry_delay: Duration::from_millis(system::DEFAULT_CLAIM_RETRY_DELAY_MS),
        }
    }
}

impl BucketClaimerConfig {
    /// Short lease and retry delay so lease-recovery paths run quickly in tests
    pub fn for_testing() -> Self {
        Self {
            lease_timeout: Duration::from_secs(2),
            claim_retry_delay: Duration::from_millis(5),
        }
    }
}

/// Snapshot of a bucket ledger's state distribution
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerSummary {
    pub total: usize,
    pub ready: usize,
    pub in_progress: usize,
    pub complete: usize,
}

impl LedgerSummary {
    /// True when every bucket in the ledger has reached COMPLETE
    pub fn all_complete(&self) -> bool {
        self.total > 0 && self.complete == self.total
    }

    /// True when no bucket is READY or holds an unexpired lease
    pub fn is_drained(&self) -> bool {
        self.ready == 0 && self.in_progress == 0
    }
}

/// Bucket claiming component for distributed activity execution
pub struct BucketClaimer {
    store: Arc<dyn ObjectStore>,
    events: Option<EventPublisher>,
    config: BucketClaimerConfig,
}

impl BucketClaimer {
    /// Create a new bucket claimer with default configuration
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            events: None,
            config: BucketClaimerConfig::default(),
        }
    }

    /// Create a new bucket claimer with custom configuration
    pub fn with_config(store: Arc<dyn ObjectStore>, config: BucketClaimerConfig) -> Self {
        Self {
            store,
            events: None,
            config,
        }
    }

    /// Attach an event publisher for claim lifecycle events
    pub fn with_event_publisher(mut self, events: EventPublisher) -> Self {
        self.events = Some(events);
        self
    }

    /// Get current configuration
    pub fn config(&self) -> &BucketClaimerConfig {
        &self.config
    }

    /// Seed an activity's bucket ledger, tolerating concurrent seeders.
    ///
    /// Insertion is first-writer-wins per sequence, so a crashed or racing seeder leaves
    /// the ledger in a state this call simply completes. A ledger left behind by an
    /// earlier realization of the activity is discarded and reseeded.
    #[instrument(skip(self, contents), fields(task_id = %task_id, path = %path))]
    pub async fn ensure_ledger(
        &self,
        task_id: Uuid,
        path: &ActivityPath,
        realization: u32,
        contents: Vec<BucketContent>,
    ) -> Result<usize> {
        let existing = self.store.list_buckets(task_id, path).await?;

        if let Some(first) = existing.first() {
            if first.realization == realization {
                debug!(
                    bucket_count = existing.len(),
                    "Bucket ledger already seeded"
                );
                return Ok(existing.len());
            }

            warn!(
                stale_realization = first.realization,
                realization, "🧹 Discarding bucket ledger from earlier realization"
            );
            self.store.delete_buckets(task_id, path).await?;
        }

        let mut seeded = 0usize;
        for (sequence, content) in contents.into_iter().enumerate() {
            let bucket = WorkBucket::new(task_id, path.clone(), sequence as u32, content, realization);
            if self.store.insert_bucket(&bucket).await? {
                seeded += 1;
            }
        }

        let ledger = self.store.list_buckets(task_id, path).await?;
        info!(
            bucket_count = ledger.len(),
            newly_seeded = seeded,
            "📋 Bucket ledger ready"
        );
        Ok(ledger.len())
    }

    /// Claim the lowest-sequence claimable bucket for this worker.
    ///
    /// Returns `Ok(None)` when no bucket is READY and no lease has expired. Losing a
    /// claim race retries after a short delay rather than giving up, since the racing
    /// winner took a different bucket or the same one legitimately.
    #[instrument(skip(self, ctx), fields(task_id = %ctx.task_id, worker_id = %ctx.worker_id, path = %path))]
    pub async fn claim_next(
        &self,
        ctx: &ExecutionContext,
        path: &ActivityPath,
    ) -> Result<Option<WorkBucket>> {
        loop {
            ctx.stop.ensure_running("claiming bucket")?;

            let ledger = self.store.list_buckets(ctx.task_id, path).await?;
            let now = Utc::now();

            let Some(candidate) = ledger.iter().find(|bucket| bucket.is_claimable_at(now)) else {
                debug!("No claimable buckets remain");
                return Ok(None);
            };

            let reclaim = candidate.is_reclaim_at(now);
            let previous_holder = candidate.holder;
            let lease_expires_at =
                now + chrono::Duration::milliseconds(self.config.lease_timeout.as_millis() as i64);
            let claimed = candidate.claimed_by(
                BucketHolder {
                    node_id: ctx.node_id,
                    worker_id: ctx.worker_id,
                },
                lease_expires_at,
            );

            if self
                .store
                .compare_and_update_bucket(candidate, &claimed)
                .await?
            {
                if reclaim {
                    warn!(
                        sequence = claimed.sequence,
                        previous_worker = ?previous_holder.map(|h| h.worker_id),
                        "🎯 Reclaimed bucket with expired lease"
                    );
                    self.publish_bucket_event(events::BUCKET_RECLAIMED, ctx, &claimed);
                } else {
                    debug!(sequence = claimed.sequence, "🎯 Claimed bucket");
                    self.publish_bucket_event(events::BUCKET_CLAIMED, ctx, &claimed);
                }
                return Ok(Some(claimed));
            }

            debug!(
                sequence = candidate.sequence,
                "Lost claim race, retrying after delay"
            );
            tokio::time::sleep(self.config.claim_retry_delay).await;
        }
    }

    /// Mark a held bucket COMPLETE.
    ///
    /// Returns `Ok(false)` when the lease was lost before completion, in which case the
    /// bucket now belongs to another worker and this worker's results must not be counted.
    #[instrument(skip(self, ctx, bucket), fields(task_id = %ctx.task_id, worker_id = %ctx.worker_id, sequence = bucket.sequence))]
    pub async fn complete(&self, ctx: &ExecutionContext, bucket: &WorkBucket) -> Result<bool> {
        if !bucket.is_held_by(ctx.node_id, ctx.worker_id) {
            return Err(CoreError::StateError(format!(
                "Cannot complete bucket {} of {}: not held by worker {}",
                bucket.sequence, bucket.activity_path, ctx.worker_id
            )));
        }

        let completed = bucket.completed();
        let updated = self
            .store
            .compare_and_update_bucket(bucket, &completed)
            .await?;

        if updated {
            log_bucket_operation(
                "complete_bucket",
                &bucket.activity_path.to_string(),
                Some(bucket.sequence),
                "complete",
                None,
            );
            self.publish_bucket_event(events::BUCKET_COMPLETED, ctx, &completed);
        } else {
            warn!("Bucket lease lost before completion, results discarded");
        }

        Ok(updated)
    }

    /// Return a held bucket to READY without completing it.
    ///
    /// Used on interruption so an orderly shutdown leaves no lease running out the clock.
    #[instrument(skip(self, ctx, bucket), fields(task_id = %ctx.task_id, worker_id = %ctx.worker_id, sequence = bucket.sequence))]
    pub async fn release(&self, ctx: &ExecutionContext, bucket: &WorkBucket) -> Result<bool> {
        if !bucket.is_held_by(ctx.node_id, ctx.worker_id) {
            return Err(CoreError::StateError(format!(
                "Cannot release bucket {} of {}: not held by worker {}",
                bucket.sequence, bucket.activity_path, ctx.worker_id
            )));
        }

        let released = bucket.released();
        let updated = self
            .store
            .compare_and_update_bucket(bucket, &released)
            .await?;

        if updated {
            debug!("Bucket released back to ready");
            self.publish_bucket_event(events::BUCKET_RELEASED, ctx, &released);
        } else {
            warn!("Bucket lease lost before release");
        }

        Ok(updated)
    }

    /// Summarize the ledger's state distribution for run-result determination
    pub async fn ledger_summary(&self, task_id: Uuid, path: &ActivityPath) -> Result<LedgerSummary> {
        let ledger = self.store.list_buckets(task_id, path).await?;
        let mut summary = LedgerSummary {
            total: ledger.len(),
            ..Default::default()
        };
        let now = Utc::now();

        for bucket in &ledger {
            match bucket.state {
                BucketState::Ready => summary.ready += 1,
                BucketState::InProgress => {
                    // An expired lease counts as ready work, not an active holder.
                    if bucket.is_lease_expired_at(now) {
                        summary.ready += 1;
                    } else {
                        summary.in_progress += 1;
                    }
                }
                BucketState::Complete => summary.complete += 1,
            }
        }

        Ok(summary)
    }

    fn publish_bucket_event(&self, event: &str, ctx: &ExecutionContext, bucket: &WorkBucket) {
        if let Some(events) = &self.events {
            events.publish(
                event,
                json!({
                    "task_id": ctx.task_id,
                    "activity_path": bucket.activity_path.to_string(),
                    "sequence": bucket.sequence,
                    "node_id": ctx.node_id,
                    "worker_id": ctx.worker_id,
                    "state": bucket.state.to_string(),
                }),
            );
        }
    }
}

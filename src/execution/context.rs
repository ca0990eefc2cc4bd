//! # Execution Context and Cooperative Cancellation
//!
//! Every call that may suspend receives an [`ExecutionContext`] carrying the
//! run identity and a [`StopSignal`]. Workers poll the signal at iteration
//! boundaries (per item for interval buckets, per bucket for filter buckets);
//! on a stop request they flush partial progress, release their claimed
//! bucket, and return `Interrupted` instead of being forcibly terminated.

use crate::error::{CoreError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use uuid::Uuid;

/// Shared state for cooperative stop requests
#[derive(Debug, Default)]
struct StopState {
    /// Control flag checked by workers at iteration boundaries
    stop_requested: AtomicBool,
    /// Wakes background loops blocked in `tokio::select!`
    notify: Notify,
}

/// Cooperative cancellation signal threaded through every run.
///
/// Cloning is cheap and all clones observe the same request. A signal is
/// one-way: once stopped it stays stopped for the run it belongs to; a
/// resumed run gets a fresh signal.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    state: Arc<StopState>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a cooperative stop and wake any waiters
    pub fn request_stop(&self) {
        self.state.stop_requested.store(true, Ordering::Release);
        self.state.notify.notify_waiters();
    }

    pub fn is_stop_requested(&self) -> bool {
        self.state.stop_requested.load(Ordering::Acquire)
    }

    /// Check whether the caller should keep processing
    pub fn should_continue(&self) -> bool {
        !self.is_stop_requested()
    }

    /// Iteration-boundary check: `Err(Interrupted)` once a stop is requested
    pub fn ensure_running(&self, during: &str) -> Result<()> {
        if self.is_stop_requested() {
            Err(CoreError::Interrupted(format!("stop requested while {during}")))
        } else {
            Ok(())
        }
    }

    /// Wait until a stop is requested.
    ///
    /// The notified future is created before the flag check so a request
    /// landing between the two cannot be missed.
    pub async fn stopped(&self) {
        loop {
            let notified = self.state.notify.notified();
            if self.is_stop_requested() {
                return;
            }
            notified.await;
        }
    }
}

/// Identity and cancellation state for one activity run.
///
/// Cloned per worker so the (node id, worker id) pair tagging bucket claims
/// is unique per claimant while the stop signal stays shared.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub task_id: Uuid,
    pub node_id: Uuid,
    pub worker_id: Uuid,
    pub stop: StopSignal,
}

impl ExecutionContext {
    pub fn new(task_id: Uuid, node_id: Uuid, stop: StopSignal) -> Self {
        Self {
            task_id,
            node_id,
            worker_id: Uuid::new_v4(),
            stop,
        }
    }

    /// Derive a context for one worker inside a leaf run
    pub fn for_worker(&self) -> Self {
        Self {
            task_id: self.task_id,
            node_id: self.node_id,
            worker_id: Uuid::new_v4(),
            stop: self.stop.clone(),
        }
    }
}

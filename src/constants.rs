//! # System Constants
//!
//! Core constants and status groupings that define the operational
//! boundaries of the activity execution engine: lifecycle event names
//! published through the event system, system-wide defaults, and status
//! groups used by maintenance queries and tests.

/// Lifecycle events published through the [`EventPublisher`](crate::events::EventPublisher)
pub mod events {
    // Task run lifecycle events
    pub const TASK_RUN_STARTED: &str = "task.run_started";
    pub const TASK_RUN_COMPLETED: &str = "task.run_completed";

    // Activity lifecycle events
    pub const ACTIVITY_STARTED: &str = "activity.started";
    pub const ACTIVITY_COMPLETED: &str = "activity.completed";
    pub const ACTIVITY_INTERRUPTED: &str = "activity.interrupted";
    pub const ACTIVITY_STATE_PURGED: &str = "activity.state_purged";

    // Bucket claim lifecycle events
    pub const BUCKET_CLAIMED: &str = "bucket.claimed";
    pub const BUCKET_RECLAIMED: &str = "bucket.reclaimed";
    pub const BUCKET_COMPLETED: &str = "bucket.completed";
    pub const BUCKET_RELEASED: &str = "bucket.released";

    // Cluster membership events
    pub const NODE_REGISTERED: &str = "node.registered";
    pub const NODE_REMOVED: &str = "node.removed";
}

/// System-wide default values
pub mod system {
    /// Default exclusive claim duration for a work bucket
    pub const DEFAULT_LEASE_TIMEOUT_SECONDS: u64 = 300;

    /// Delay between claim attempts after losing a conditional-update race
    pub const DEFAULT_CLAIM_RETRY_DELAY_MS: u64 = 25;

    /// Default number of items per numeric-interval bucket
    pub const DEFAULT_BUCKET_SIZE: u64 = 100;

    /// Default number of concurrent workers per leaf activity run
    pub const DEFAULT_WORKERS_PER_ACTIVITY: usize = 3;

    /// Default interval between node heartbeat writes
    pub const DEFAULT_HEARTBEAT_INTERVAL_SECONDS: u64 = 60;

    /// A node whose last check-in is within this window counts as checking in
    pub const DEFAULT_CHECKIN_TOLERANCE_SECONDS: u64 = 90;

    /// A node record staler than this is eligible for cleanup
    pub const DEFAULT_NODE_MAX_AGE_SECONDS: u64 = 600;

    /// Default interval between stale-node cleanup passes
    pub const DEFAULT_CLEANUP_INTERVAL_SECONDS: u64 = 300;

    /// Default broadcast capacity of the event publisher
    pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 1000;

    /// Path segment of every compiled tree's root activity. Fixed rather than
    /// derived from the task name so renaming a task never orphans its state.
    pub const ROOT_ACTIVITY_ID: &str = "root";
}

/// Status groupings referenced by maintenance routines and tests
pub mod status_groups {
    /// Bucket states a claimant may consider (IN_PROGRESS only when the
    /// lease has expired)
    pub const CLAIMABLE_BUCKET_STATES: &[&str] = &["ready", "in_progress"];

    /// Run results after which the scheduler does not automatically retry
    pub const NON_RETRIABLE_RUN_RESULTS: &[&str] = &["finished", "permanent_error"];

    /// Activity statuses describing a realization that has begun but not
    /// finished
    pub const ACTIVE_ACTIVITY_STATUSES: &[&str] = &["in_progress", "paused"];
}

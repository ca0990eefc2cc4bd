//! # Durable Activity State
//!
//! Persisted per-activity-path progress, status, and statistics records, plus the
//! guarded purge that erases them for a fresh realization.

pub mod activity_state;
pub mod purge;

pub use activity_state::{
    ActivityState, ActivityStatistics, ActivityStatus, ProgressCounters, ProgressDelta,
};
pub use purge::{PurgeReport, StatePurger};

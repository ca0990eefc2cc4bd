//! # Activity State
//!
//! Durable per-activity-path execution state: the tree-level status machine,
//! monotonic progress counters, and a statistics snapshot. One record exists
//! per (task, activity path), created on first run and surviving process
//! restarts; a purge resets it for the next realization.

use crate::activity::path::ActivityPath;
use crate::error::{CoreError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Tree-level execution status of one activity path.
///
/// NOT_STARTED → IN_PROGRESS → COMPLETE, with PAUSED as the substate entered
/// on suspend/interrupt and left by resume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityStatus {
    #[default]
    NotStarted,
    InProgress,
    Paused,
    Complete,
}

impl ActivityStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete)
    }

    /// Check if a realization has begun but not finished
    pub fn is_active(&self) -> bool {
        matches!(self, Self::InProgress | Self::Paused)
    }

    /// Valid transitions; same-state transitions are allowed so crash
    /// recovery can restart an IN_PROGRESS path without ceremony
    pub fn can_transition_to(&self, next: ActivityStatus) -> bool {
        if *self == next {
            return true;
        }
        matches!(
            (self, next),
            (Self::NotStarted, Self::InProgress)
                | (Self::InProgress, Self::Paused)
                | (Self::InProgress, Self::Complete)
                | (Self::Paused, Self::InProgress)
        )
    }
}

impl fmt::Display for ActivityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => write!(f, "not_started"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Paused => write!(f, "paused"),
            Self::Complete => write!(f, "complete"),
        }
    }
}

impl std::str::FromStr for ActivityStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "not_started" => Ok(Self::NotStarted),
            "in_progress" => Ok(Self::InProgress),
            "paused" => Ok(Self::Paused),
            "complete" => Ok(Self::Complete),
            _ => Err(format!("Invalid activity status: {s}")),
        }
    }
}

/// Monotonic non-decreasing counters within one realization
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressCounters {
    pub items_processed: u64,
    pub items_failed: u64,
    pub items_skipped: u64,
    pub buckets_completed: u32,
}

impl ProgressCounters {
    /// Apply an additive delta; counters never decrease
    pub fn add(&mut self, delta: &ProgressDelta) {
        self.items_processed += delta.items_processed;
        self.items_failed += delta.items_failed;
        self.items_skipped += delta.items_skipped;
        self.buckets_completed += delta.buckets_completed;
    }

    pub fn items_seen(&self) -> u64 {
        self.items_processed + self.items_failed + self.items_skipped
    }
}

/// Additive progress update flushed by workers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressDelta {
    pub items_processed: u64,
    pub items_failed: u64,
    pub items_skipped: u64,
    pub buckets_completed: u32,
}

impl ProgressDelta {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Statistics snapshot updated as runs progress
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityStatistics {
    pub started_at: Option<DateTime<Utc>>,
    pub last_run_ended_at: Option<DateTime<Utc>>,
    pub last_run_duration_ms: Option<u64>,
}

/// Persisted execution state of one activity path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityState {
    pub task_id: Uuid,
    pub activity_path: ActivityPath,
    pub status: ActivityStatus,
    /// Realization counter, bumped by each purge
    pub realization: u32,
    pub progress: ProgressCounters,
    pub statistics: ActivityStatistics,
    pub updated_at: DateTime<Utc>,
}

impl ActivityState {
    pub fn new(task_id: Uuid, activity_path: ActivityPath) -> Self {
        Self {
            task_id,
            activity_path,
            status: ActivityStatus::NotStarted,
            realization: 1,
            progress: ProgressCounters::default(),
            statistics: ActivityStatistics::default(),
            updated_at: Utc::now(),
        }
    }

    /// Move to `next`, rejecting transitions the status machine forbids
    pub fn transition_to(&mut self, next: ActivityStatus, now: DateTime<Utc>) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(CoreError::StateError(format!(
                "activity '{}' cannot move from {} to {}",
                self.activity_path, self.status, next
            )));
        }
        if next == ActivityStatus::InProgress && self.statistics.started_at.is_none() {
            self.statistics.started_at = Some(now);
        }
        self.status = next;
        self.updated_at = now;
        Ok(())
    }

    /// Record the end of one run for the statistics snapshot
    pub fn record_run_ended(&mut self, started: DateTime<Utc>, now: DateTime<Utc>) {
        self.statistics.last_run_ended_at = Some(now);
        self.statistics.last_run_duration_ms =
            Some((now - started).num_milliseconds().max(0) as u64);
        self.updated_at = now;
    }

    /// Fresh state for the next realization: counters and statistics reset,
    /// realization bumped
    pub fn purged(&self, now: DateTime<Utc>) -> Self {
        Self {
            task_id: self.task_id,
            activity_path: self.activity_path.clone(),
            status: ActivityStatus::NotStarted,
            realization: self.realization + 1,
            progress: ProgressCounters::default(),
            statistics: ActivityStatistics::default(),
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> ActivityState {
        ActivityState::new(Uuid::new_v4(), ActivityPath::root("scan"))
    }

    #[test]
    fn test_lifecycle_transitions() {
        let now = Utc::now();
        let mut s = state();
        s.transition_to(ActivityStatus::InProgress, now).unwrap();
        s.transition_to(ActivityStatus::Paused, now).unwrap();
        s.transition_to(ActivityStatus::InProgress, now).unwrap();
        s.transition_to(ActivityStatus::Complete, now).unwrap();
        assert!(s.status.is_terminal());
    }

    #[test]
    fn test_invalid_transitions_rejected() {
        let now = Utc::now();
        let mut s = state();
        // cannot pause or complete before starting
        assert!(matches!(
            s.clone().transition_to(ActivityStatus::Paused, now),
            Err(CoreError::StateError(_))
        ));
        assert!(matches!(
            s.clone().transition_to(ActivityStatus::Complete, now),
            Err(CoreError::StateError(_))
        ));

        s.transition_to(ActivityStatus::InProgress, now).unwrap();
        s.transition_to(ActivityStatus::Complete, now).unwrap();
        // complete is terminal without a purge
        assert!(matches!(
            s.transition_to(ActivityStatus::InProgress, now),
            Err(CoreError::StateError(_))
        ));
    }

    #[test]
    fn test_same_state_transition_is_idempotent() {
        let now = Utc::now();
        let mut s = state();
        s.transition_to(ActivityStatus::InProgress, now).unwrap();
        s.transition_to(ActivityStatus::InProgress, now).unwrap();
        assert_eq!(s.status, ActivityStatus::InProgress);
    }

    #[test]
    fn test_started_at_stamped_once() {
        let first = Utc::now();
        let mut s = state();
        s.transition_to(ActivityStatus::InProgress, first).unwrap();
        let later = first + chrono::Duration::seconds(30);
        s.transition_to(ActivityStatus::Paused, later).unwrap();
        s.transition_to(ActivityStatus::InProgress, later).unwrap();
        assert_eq!(s.statistics.started_at, Some(first));
    }

    #[test]
    fn test_progress_is_additive() {
        let mut s = state();
        s.progress.add(&ProgressDelta {
            items_processed: 90,
            items_failed: 7,
            items_skipped: 3,
            buckets_completed: 1,
        });
        s.progress.add(&ProgressDelta {
            items_processed: 100,
            buckets_completed: 1,
            ..Default::default()
        });
        assert_eq!(s.progress.items_processed, 190);
        assert_eq!(s.progress.items_failed, 7);
        assert_eq!(s.progress.items_seen(), 200);
        assert_eq!(s.progress.buckets_completed, 2);
    }

    #[test]
    fn test_purge_resets_and_bumps_realization() {
        let now = Utc::now();
        let mut s = state();
        s.transition_to(ActivityStatus::InProgress, now).unwrap();
        s.progress.add(&ProgressDelta {
            items_processed: 10,
            ..Default::default()
        });

        let purged = s.purged(now);
        assert_eq!(purged.realization, 2);
        assert_eq!(purged.status, ActivityStatus::NotStarted);
        assert_eq!(purged.progress, ProgressCounters::default());
        assert_eq!(purged.statistics, ActivityStatistics::default());
        assert_eq!(purged.activity_path, s.activity_path);
    }
}

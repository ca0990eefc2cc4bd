//! # Work Buckets
//!
//! A claimable partition of a leaf activity's object set. Bucket records live
//! in the shared store and all claim coordination happens through
//! version-checked conditional updates on them; the transition methods here
//! build the desired record for such an update, they never write anything
//! themselves.

use crate::activity::path::ActivityPath;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Claim state of a work bucket.
///
/// READY → IN_PROGRESS → COMPLETE; an expired lease makes an IN_PROGRESS
/// bucket equivalent to READY for claim purposes, so there is no distinct
/// failed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BucketState {
    /// Unclaimed, or abandoned back to claimable
    #[default]
    Ready,
    /// Exclusively held under a lease
    InProgress,
    /// All addressed items processed; terminal
    Complete,
}

impl BucketState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete)
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::InProgress)
    }
}

impl fmt::Display for BucketState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready => write!(f, "ready"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Complete => write!(f, "complete"),
        }
    }
}

impl std::str::FromStr for BucketState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ready" => Ok(Self::Ready),
            "in_progress" => Ok(Self::InProgress),
            "complete" => Ok(Self::Complete),
            _ => Err(format!("Invalid bucket state: {s}")),
        }
    }
}

/// What a bucket addresses: exactly one content strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BucketContent {
    /// Half-open range of sequential item ids
    Interval { from: i64, to: i64 },
    /// Opaque predicate evaluated by the handler
    Filter { predicate: String },
}

impl BucketContent {
    /// Item count for interval content, unknown for filters
    pub fn item_count(&self) -> Option<u64> {
        match self {
            Self::Interval { from, to } => Some((to - from).max(0) as u64),
            Self::Filter { .. } => None,
        }
    }

    /// True when an item id belongs to this bucket's interval.
    ///
    /// Filter content cannot attribute items by id; it always answers false.
    pub fn contains_item(&self, item_id: i64) -> bool {
        match self {
            Self::Interval { from, to } => (*from..*to).contains(&item_id),
            Self::Filter { .. } => false,
        }
    }
}

impl fmt::Display for BucketContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Interval { from, to } => write!(f, "[{from}, {to})"),
            Self::Filter { predicate } => write!(f, "filter({predicate})"),
        }
    }
}

/// The (node, worker) pair holding an exclusive claim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketHolder {
    pub node_id: Uuid,
    pub worker_id: Uuid,
}

/// One claimable partition in a leaf activity's bucket ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkBucket {
    pub task_id: Uuid,
    pub activity_path: ActivityPath,
    /// Position in the ledger; claimants scan in non-decreasing order
    pub sequence: u32,
    pub content: BucketContent,
    pub state: BucketState,
    pub holder: Option<BucketHolder>,
    pub lease_expires_at: Option<DateTime<Utc>>,
    /// Realization this ledger belongs to; bumped on purge
    pub realization: u32,
    /// Compare token for conditional store updates
    pub version: u64,
}

impl WorkBucket {
    pub fn new(
        task_id: Uuid,
        activity_path: ActivityPath,
        sequence: u32,
        content: BucketContent,
        realization: u32,
    ) -> Self {
        Self {
            task_id,
            activity_path,
            sequence,
            content,
            state: BucketState::Ready,
            holder: None,
            lease_expires_at: None,
            realization,
            version: 0,
        }
    }

    /// True when the lease has strictly passed; an IN_PROGRESS bucket with no
    /// lease timestamp is malformed and treated as expired so it can never
    /// wedge the ledger
    pub fn is_lease_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.lease_expires_at {
            Some(expires_at) => expires_at < now,
            None => true,
        }
    }

    /// True when a claimant may attempt the conditional claim transition
    pub fn is_claimable_at(&self, now: DateTime<Utc>) -> bool {
        match self.state {
            BucketState::Ready => true,
            BucketState::InProgress => self.is_lease_expired_at(now),
            BucketState::Complete => false,
        }
    }

    /// True when this is a reclaim of an abandoned lease rather than a first
    /// claim
    pub fn is_reclaim_at(&self, now: DateTime<Utc>) -> bool {
        self.state == BucketState::InProgress && self.is_lease_expired_at(now)
    }

    pub fn is_held_by(&self, node_id: Uuid, worker_id: Uuid) -> bool {
        self.holder
            .is_some_and(|h| h.node_id == node_id && h.worker_id == worker_id)
    }

    /// Desired record for the READY→IN_PROGRESS conditional update
    pub fn claimed_by(&self, holder: BucketHolder, lease_expires_at: DateTime<Utc>) -> Self {
        let mut next = self.clone();
        next.state = BucketState::InProgress;
        next.holder = Some(holder);
        next.lease_expires_at = Some(lease_expires_at);
        next.version = self.version + 1;
        next
    }

    /// Desired record for the IN_PROGRESS→COMPLETE conditional update.
    /// The holder is kept for the ledger audit trail; the lease is cleared.
    pub fn completed(&self) -> Self {
        let mut next = self.clone();
        next.state = BucketState::Complete;
        next.lease_expires_at = None;
        next.version = self.version + 1;
        next
    }

    /// Desired record for abandoning a claim back to READY
    pub fn released(&self) -> Self {
        let mut next = self.clone();
        next.state = BucketState::Ready;
        next.holder = None;
        next.lease_expires_at = None;
        next.version = self.version + 1;
        next
    }
}

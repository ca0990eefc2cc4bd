//! # Cluster Node Records
//!
//! One record per process instance participating in the cluster, written at
//! startup and refreshed by the heartbeat loop. Liveness questions are
//! answered from the record alone so the answers are deterministic for a
//! given `now`, which is what makes the cleanup boundary rules testable.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Cluster membership record of one node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub node_id: Uuid,
    pub hostname: String,
    pub started_at: DateTime<Utc>,
    /// Stamped by the heartbeat loop; `None` only for records that crashed
    /// before their first check-in
    pub last_check_in: Option<DateTime<Utc>>,
    /// Operator flag: a node can be present but drained
    pub operational: bool,
}

impl NodeRecord {
    pub fn new(node_id: Uuid, hostname: impl Into<String>) -> Self {
        Self {
            node_id,
            hostname: hostname.into(),
            started_at: Utc::now(),
            last_check_in: None,
            operational: true,
        }
    }

    /// Record with the check-in timestamp advanced to `now`
    pub fn checked_in_at(&self, now: DateTime<Utc>) -> Self {
        let mut next = self.clone();
        next.last_check_in = Some(now);
        next
    }

    /// True when the last check-in is within the tolerance window.
    /// Boundary inclusive: a check-in exactly `tolerance` old still counts.
    pub fn is_checking_in_at(&self, now: DateTime<Utc>, tolerance: Duration) -> bool {
        match self.last_check_in {
            Some(last) => last >= now - tolerance,
            None => false,
        }
    }

    /// True when the record is strictly older than `max_age`.
    /// A never-checked-in record counts as infinitely old; a check-in exactly
    /// at the cutoff is still within the window.
    pub fn is_stale_at(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        match self.last_check_in {
            Some(last) => last < now - max_age,
            None => true,
        }
    }
}

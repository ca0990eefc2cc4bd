//! # Node Cleaner
//!
//! ## Architecture: Conservative Removal of Dead Nodes
//!
//! The NodeCleaner periodically sweeps the node table and removes records that have
//! clearly been abandoned. The removal predicate is deliberately one-sided: a node is
//! only removed when it is not this process, not checking in within the tolerance
//! window, and stale beyond the maximum age. Anything ambiguous is kept, because a
//! wrongly removed node re-registers on its next heartbeat while a wrongly kept record
//! costs nothing but a table row.
//!
//! Bucket leases recover on their own through expiry, so removing a node never needs to
//! touch its claims.

use crate::cluster::node::NodeRecord;
use crate::constants::{events, system};
use crate::error::Result;
use crate::events::EventPublisher;
use crate::execution::StopSignal;
use crate::logging::log_cluster_operation;
use crate::store::ObjectStore;
use chrono::{DateTime, Utc};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

/// Configuration for stale node cleanup
#[derive(Debug, Clone)]
pub struct NodeCleanerConfig {
    /// How recent a check-in must be for a node to count as checking in
    pub checkin_tolerance: Duration,
    /// Age beyond which a silent node counts as stale
    pub max_age: Duration,
    /// Interval between cleanup passes
    pub cleanup_interval: Duration,
}

impl Default for NodeCleanerConfig {
    fn default() -> Self {
        Self {
            checkin_tolerance: Duration::from_secs(system::DEFAULT_CHECKIN_TOLERANCE_SECONDS),
            max_age: Duration::from_secs(system::DEFAULT_NODE_MAX_AGE_SECONDS),
            cleanup_interval: Duration::from_secs(system::DEFAULT_CLEANUP_INTERVAL_SECONDS),
        }
    }
}

impl NodeCleanerConfig {
    /// Millisecond-scale windows so staleness transitions are observable in tests
    pub fn for_testing() -> Self {
        Self {
            checkin_tolerance: Duration::from_millis(100),
            max_age: Duration::from_millis(250),
            cleanup_interval: Duration::from_millis(50),
        }
    }
}

/// Outcome counts from one cleanup pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub examined: usize,
    pub removed: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Stale node removal component
pub struct NodeCleaner {
    store: Arc<dyn ObjectStore>,
    node_id: Uuid,
    events: Option<EventPublisher>,
    config: NodeCleanerConfig,
}

impl NodeCleaner {
    /// Create a cleaner acting on behalf of the given node identity
    pub fn new(store: Arc<dyn ObjectStore>, node_id: Uuid) -> Self {
        Self::with_config(store, node_id, NodeCleanerConfig::default())
    }

    /// Create a cleaner with custom configuration
    pub fn with_config(store: Arc<dyn ObjectStore>, node_id: Uuid, config: NodeCleanerConfig) -> Self {
        Self {
            store,
            node_id,
            events: None,
            config,
        }
    }

    /// Attach an event publisher for removal events
    pub fn with_event_publisher(mut self, events: EventPublisher) -> Self {
        self.events = Some(events);
        self
    }

    /// Get current configuration
    pub fn config(&self) -> &NodeCleanerConfig {
        &self.config
    }

    /// Decide whether a node record should be removed at the given instant.
    ///
    /// The current node is never removed, even when its own record looks stale. A node
    /// checking in within the tolerance window is never removed, even when it is older
    /// than the maximum age. A record with no check-in at all counts as infinitely stale.
    pub fn should_remove(&self, node: &NodeRecord, now: DateTime<Utc>) -> bool {
        if node.node_id == self.node_id {
            return false;
        }

        let tolerance =
            chrono::Duration::milliseconds(self.config.checkin_tolerance.as_millis() as i64);
        if node.is_checking_in_at(now, tolerance) {
            return false;
        }

        let max_age = chrono::Duration::milliseconds(self.config.max_age.as_millis() as i64);
        node.is_stale_at(now, max_age)
    }

    /// Sweep the node table once, removing stale records.
    ///
    /// A failure removing one node is counted and skipped so a single bad record cannot
    /// stall the rest of the pass.
    #[instrument(skip(self), fields(node_id = %self.node_id))]
    pub async fn clean_stale_nodes(&self) -> Result<CleanupReport> {
        let nodes = self.store.list_nodes().await?;
        let now = Utc::now();
        let mut report = CleanupReport::default();

        for node in nodes {
            report.examined += 1;

            if !self.should_remove(&node, now) {
                report.skipped += 1;
                continue;
            }

            match self.store.delete_node(node.node_id).await {
                Ok(true) => {
                    report.removed += 1;
                    log_cluster_operation(
                        "remove_stale_node",
                        Some(node.node_id),
                        "removed",
                        Some(&node.hostname),
                    );
                    if let Some(events) = &self.events {
                        events.publish(
                            events::NODE_REMOVED,
                            json!({
                                "node_id": node.node_id,
                                "hostname": node.hostname,
                                "reason": "stale",
                                "last_check_in": node.last_check_in,
                            }),
                        );
                    }
                }
                Ok(false) => {
                    // Another cleaner got there first.
                    debug!(stale_node_id = %node.node_id, "Stale node already removed");
                    report.skipped += 1;
                }
                Err(e) => {
                    report.failed += 1;
                    error!(
                        stale_node_id = %node.node_id,
                        error = %e,
                        "🧹 Failed to remove stale node, continuing pass"
                    );
                }
            }
        }

        if report.removed > 0 {
            info!(
                removed = report.removed,
                examined = report.examined,
                "🧹 Cleanup pass removed stale nodes"
            );
        } else {
            debug!(examined = report.examined, "🧹 Cleanup pass found nothing stale");
        }

        Ok(report)
    }

    /// Spawn the background cleanup loop, stopping when the signal fires
    pub fn spawn_cleanup_loop(self: &Arc<Self>, stop: StopSignal) -> JoinHandle<()> {
        let cleaner = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(cleaner.config.cleanup_interval);

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if let Err(e) = cleaner.clean_stale_nodes().await {
                            error!(error = %e, "🧹 Cleanup pass failed");
                        }
                    }
                    _ = stop.stopped() => {
                        info!(node_id = %cleaner.node_id, "🧹 Cleanup loop stopping");
                        break;
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;

    fn cleaner_with_config(config: NodeCleanerConfig) -> (NodeCleaner, Arc<InMemoryStore>, Uuid) {
        let store = Arc::new(InMemoryStore::new());
        let own_id = Uuid::new_v4();
        let cleaner = NodeCleaner::with_config(store.clone(), own_id, config);
        (cleaner, store, own_id)
    }

    fn stale_record(node_id: Uuid, now: DateTime<Utc>, age: chrono::Duration) -> NodeRecord {
        NodeRecord::new(node_id, "old-host").checked_in_at(now - age)
    }

    #[test]
    fn never_removes_own_record() {
        let (cleaner, _store, own_id) = cleaner_with_config(NodeCleanerConfig::default());
        let now = Utc::now();

        let own = NodeRecord::new(own_id, "self-host");
        assert!(own.last_check_in.is_none());
        assert!(!cleaner.should_remove(&own, now));
    }

    #[test]
    fn keeps_checking_in_node_even_past_max_age() {
        let config = NodeCleanerConfig {
            checkin_tolerance: Duration::from_secs(90),
            max_age: Duration::from_secs(60),
            ..NodeCleanerConfig::default()
        };
        let (cleaner, _store, _own) = cleaner_with_config(config);
        let now = Utc::now();

        let node = stale_record(Uuid::new_v4(), now, chrono::Duration::seconds(70));
        assert!(!cleaner.should_remove(&node, now));
    }

    #[test]
    fn keeps_node_at_exact_tolerance_boundary() {
        let (cleaner, _store, _own) = cleaner_with_config(NodeCleanerConfig::default());
        let now = Utc::now();
        let tolerance =
            chrono::Duration::seconds(system::DEFAULT_CHECKIN_TOLERANCE_SECONDS as i64);

        let node = NodeRecord::new(Uuid::new_v4(), "edge-host").checked_in_at(now - tolerance);
        assert!(!cleaner.should_remove(&node, now));
    }

    #[test]
    fn removes_silent_stale_node() {
        let (cleaner, _store, _own) = cleaner_with_config(NodeCleanerConfig::default());
        let now = Utc::now();

        let node = stale_record(Uuid::new_v4(), now, chrono::Duration::hours(2));
        assert!(cleaner.should_remove(&node, now));
    }

    #[test]
    fn removes_node_that_never_checked_in() {
        let (cleaner, _store, _own) = cleaner_with_config(NodeCleanerConfig::default());
        let now = Utc::now();

        let node = NodeRecord::new(Uuid::new_v4(), "ghost-host");
        assert!(cleaner.should_remove(&node, now));
    }

    #[tokio::test]
    async fn cleanup_pass_removes_only_stale_records() {
        let (cleaner, store, own_id) = cleaner_with_config(NodeCleanerConfig::default());
        let now = Utc::now();

        store
            .upsert_node(&NodeRecord::new(own_id, "self-host"))
            .await
            .unwrap();
        store
            .upsert_node(&NodeRecord::new(Uuid::new_v4(), "live-host").checked_in_at(now))
            .await
            .unwrap();
        let dead_id = Uuid::new_v4();
        store
            .upsert_node(&stale_record(dead_id, now, chrono::Duration::hours(1)))
            .await
            .unwrap();

        let report = cleaner.clean_stale_nodes().await.unwrap();

        assert_eq!(report.examined, 3);
        assert_eq!(report.removed, 1);
        assert_eq!(report.skipped, 2);
        assert_eq!(report.failed, 0);
        assert!(store.get_node(dead_id).await.unwrap().is_none());
        assert!(store.get_node(own_id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn cleanup_loop_stops_on_signal() {
        let (cleaner, _store, _own) = cleaner_with_config(NodeCleanerConfig::for_testing());
        let cleaner = Arc::new(cleaner);

        let stop = StopSignal::default();
        let handle = cleaner.spawn_cleanup_loop(stop.clone());

        tokio::time::sleep(Duration::from_millis(80)).await;
        stop.request_stop();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("cleanup loop should stop promptly")
            .unwrap();
    }
}

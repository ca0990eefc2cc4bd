//! # Cluster Manager
//!
//! ## Architecture: Node Identity and Liveness
//!
//! Each engine process owns one `ClusterManager`. On startup it registers a node record
//! with a fresh node ID and stamps an initial check-in, then a background heartbeat loop
//! refreshes the check-in timestamp on a fixed interval. Every other cluster decision
//! that asks "is this node alive" reads those check-in timestamps through the same
//! tolerance window, so ownership checks and cleanup agree on what alive means.
//!
//! ## Key Features
//!
//! - **Registered at Birth**: The initial check-in is stamped during registration, so a
//!   freshly started node is immediately distinguishable from a dead one
//! - **Heartbeat Loop**: Interval-driven check-ins with cooperative stop
//! - **Liveness Queries**: Check-in recency within a configurable tolerance

use crate::cluster::node::NodeRecord;
use crate::constants::{events, system};
use crate::error::Result;
use crate::events::EventPublisher;
use crate::execution::StopSignal;
use crate::store::ObjectStore;
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Configuration for node heartbeat and liveness behavior
#[derive(Debug, Clone)]
pub struct ClusterManagerConfig {
    /// Interval between heartbeat check-ins
    pub heartbeat_interval: Duration,
    /// How recent a check-in must be for a node to count as checking in
    pub checkin_tolerance: Duration,
}

impl Default for ClusterManagerConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(system::DEFAULT_HEARTBEAT_INTERVAL_SECONDS),
            checkin_tolerance: Duration::from_secs(system::DEFAULT_CHECKIN_TOLERANCE_SECONDS),
        }
    }
}

impl ClusterManagerConfig {
    /// Millisecond-scale intervals so liveness transitions are observable in tests
    pub fn for_testing() -> Self {
        Self {
            heartbeat_interval: Duration::from_millis(25),
            checkin_tolerance: Duration::from_millis(150),
        }
    }
}

/// Node identity and heartbeat component for one engine process
pub struct ClusterManager {
    store: Arc<dyn ObjectStore>,
    node_id: Uuid,
    hostname: String,
    events: Option<EventPublisher>,
    config: ClusterManagerConfig,
}

impl ClusterManager {
    /// Create a manager with a fresh node identity and default configuration
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self::with_config(store, ClusterManagerConfig::default())
    }

    /// Create a manager with a fresh node identity and custom configuration
    pub fn with_config(store: Arc<dyn ObjectStore>, config: ClusterManagerConfig) -> Self {
        Self {
            store,
            node_id: Uuid::new_v4(),
            hostname: detect_hostname(),
            events: None,
            config,
        }
    }

    /// Attach an event publisher for node lifecycle events
    pub fn with_event_publisher(mut self, events: EventPublisher) -> Self {
        self.events = Some(events);
        self
    }

    /// This process's node ID
    pub fn node_id(&self) -> Uuid {
        self.node_id
    }

    /// This process's hostname
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// Get current configuration
    pub fn config(&self) -> &ClusterManagerConfig {
        &self.config
    }

    /// True when the given node ID is this process
    pub fn is_current_node(&self, node_id: Uuid) -> bool {
        self.node_id == node_id
    }

    /// Register this process's node record, stamping its first check-in.
    ///
    /// Registration and the initial check-in happen together so the record never exists
    /// in a never-checked-in state that liveness queries would read as dead.
    #[instrument(skip(self), fields(node_id = %self.node_id))]
    pub async fn register_current_node(&self) -> Result<NodeRecord> {
        let now = Utc::now();
        let record = NodeRecord::new(self.node_id, self.hostname.clone()).checked_in_at(now);
        self.store.upsert_node(&record).await?;

        info!(hostname = %self.hostname, "🔧 Node registered with cluster");
        if let Some(events) = &self.events {
            events.publish(
                events::NODE_REGISTERED,
                json!({
                    "node_id": self.node_id,
                    "hostname": self.hostname,
                    "registered_at": now,
                }),
            );
        }

        Ok(record)
    }

    /// Refresh this node's check-in timestamp.
    ///
    /// A missing record is re-registered rather than treated as an error, since the
    /// cleaner on another node may have removed us while this process was suspended.
    #[instrument(skip(self), fields(node_id = %self.node_id))]
    pub async fn heartbeat_once(&self) -> Result<()> {
        let now = Utc::now();

        match self.store.get_node(self.node_id).await? {
            Some(record) => {
                self.store.upsert_node(&record.checked_in_at(now)).await?;
                debug!("💓 Node checked in");
            }
            None => {
                warn!("💓 Node record missing at heartbeat, re-registering");
                self.register_current_node().await?;
            }
        }

        Ok(())
    }

    /// Spawn the background heartbeat loop, stopping when the signal fires
    pub fn spawn_heartbeat_loop(self: &Arc<Self>, stop: StopSignal) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(manager.config.heartbeat_interval);
            // The first tick fires immediately and registration already checked in.
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if let Err(e) = manager.heartbeat_once().await {
                            error!(error = %e, "💓 Heartbeat check-in failed");
                        }
                    }
                    _ = stop.stopped() => {
                        info!(node_id = %manager.node_id, "💓 Heartbeat loop stopping");
                        break;
                    }
                }
            }
        })
    }

    /// True when the node's last check-in falls within the configured tolerance
    pub async fn is_node_checking_in(&self, node_id: Uuid) -> Result<bool> {
        let Some(record) = self.store.get_node(node_id).await? else {
            return Ok(false);
        };
        let tolerance =
            chrono::Duration::milliseconds(self.config.checkin_tolerance.as_millis() as i64);
        Ok(record.is_checking_in_at(Utc::now(), tolerance))
    }

    /// Remove this node's record during orderly shutdown
    #[instrument(skip(self), fields(node_id = %self.node_id))]
    pub async fn deregister_current_node(&self) -> Result<bool> {
        let removed = self.store.delete_node(self.node_id).await?;

        if removed {
            info!("🔧 Node deregistered from cluster");
            if let Some(events) = &self.events {
                events.publish(
                    events::NODE_REMOVED,
                    json!({
                        "node_id": self.node_id,
                        "hostname": self.hostname,
                        "reason": "shutdown",
                    }),
                );
            }
        }

        Ok(removed)
    }
}

fn detect_hostname() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string())
}

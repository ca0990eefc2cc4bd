//! # Engine Configuration
//!
//! YAML-based configuration for the execution engine. Every tunable has a
//! default from [`constants::system`](crate::constants::system), so embedders
//! may run with no configuration file at all, a partial file, or a full file
//! with per-environment overrides.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use taskgrid_core::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load configuration (environment auto-detected)
//! let manager = ConfigManager::load()?;
//!
//! let workers = manager.config().execution.workers_per_activity;
//! let runner_config = manager.config().runner_config();
//! # Ok(())
//! # }
//! ```

pub mod loader;

use crate::activity::run::ActivityRunnerConfig;
use crate::bucket::BucketClaimerConfig;
use crate::cluster::{ClusterManagerConfig, NodeCleanerConfig};
use crate::constants::system;
use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use loader::ConfigManager;

fn default_workers_per_activity() -> usize {
    system::DEFAULT_WORKERS_PER_ACTIVITY
}

fn default_lease_timeout_seconds() -> u64 {
    system::DEFAULT_LEASE_TIMEOUT_SECONDS
}

fn default_claim_retry_delay_ms() -> u64 {
    system::DEFAULT_CLAIM_RETRY_DELAY_MS
}

fn default_bucket_size() -> u64 {
    system::DEFAULT_BUCKET_SIZE
}

fn default_heartbeat_interval_seconds() -> u64 {
    system::DEFAULT_HEARTBEAT_INTERVAL_SECONDS
}

fn default_checkin_tolerance_seconds() -> u64 {
    system::DEFAULT_CHECKIN_TOLERANCE_SECONDS
}

fn default_node_max_age_seconds() -> u64 {
    system::DEFAULT_NODE_MAX_AGE_SECONDS
}

fn default_cleanup_interval_seconds() -> u64 {
    system::DEFAULT_CLEANUP_INTERVAL_SECONDS
}

fn default_event_channel_capacity() -> usize {
    system::DEFAULT_EVENT_CHANNEL_CAPACITY
}

/// Root configuration structure mirroring taskgrid-config.yaml
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Leaf run execution settings
    #[serde(default)]
    pub execution: ExecutionConfig,

    /// Object-set partitioning settings
    #[serde(default)]
    pub bucketing: BucketingConfig,

    /// Cluster membership and liveness settings
    #[serde(default)]
    pub cluster: ClusterConfig,

    /// Event publishing settings
    #[serde(default)]
    pub events: EventsConfig,
}

/// Leaf run execution configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Concurrent claim workers per leaf activity run
    #[serde(default = "default_workers_per_activity")]
    pub workers_per_activity: usize,

    /// Exclusive claim duration for a work bucket
    #[serde(default = "default_lease_timeout_seconds")]
    pub lease_timeout_seconds: u64,

    /// Delay between claim attempts after losing a conditional-update race
    #[serde(default = "default_claim_retry_delay_ms")]
    pub claim_retry_delay_ms: u64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            workers_per_activity: default_workers_per_activity(),
            lease_timeout_seconds: default_lease_timeout_seconds(),
            claim_retry_delay_ms: default_claim_retry_delay_ms(),
        }
    }
}

/// Object-set partitioning configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketingConfig {
    /// Items per numeric-interval bucket when a definition does not specify
    /// its own size
    #[serde(default = "default_bucket_size")]
    pub default_bucket_size: u64,
}

impl Default for BucketingConfig {
    fn default() -> Self {
        Self {
            default_bucket_size: default_bucket_size(),
        }
    }
}

/// Cluster membership and liveness configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Interval between node heartbeat writes
    #[serde(default = "default_heartbeat_interval_seconds")]
    pub heartbeat_interval_seconds: u64,

    /// A node whose last check-in is within this window counts as checking in
    #[serde(default = "default_checkin_tolerance_seconds")]
    pub checkin_tolerance_seconds: u64,

    /// A node record staler than this is eligible for cleanup
    #[serde(default = "default_node_max_age_seconds")]
    pub node_max_age_seconds: u64,

    /// Interval between stale-node cleanup passes
    #[serde(default = "default_cleanup_interval_seconds")]
    pub cleanup_interval_seconds: u64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_seconds: default_heartbeat_interval_seconds(),
            checkin_tolerance_seconds: default_checkin_tolerance_seconds(),
            node_max_age_seconds: default_node_max_age_seconds(),
            cleanup_interval_seconds: default_cleanup_interval_seconds(),
        }
    }
}

/// Event publishing configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventsConfig {
    /// Broadcast channel capacity; slow subscribers lag rather than block
    #[serde(default = "default_event_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_event_channel_capacity(),
        }
    }
}

impl EngineConfig {
    /// Fast timings and small buckets for test runs
    pub fn for_testing() -> Self {
        Self {
            execution: ExecutionConfig {
                workers_per_activity: 3,
                lease_timeout_seconds: 2,
                claim_retry_delay_ms: 5,
            },
            bucketing: BucketingConfig {
                default_bucket_size: 10,
            },
            cluster: ClusterConfig {
                heartbeat_interval_seconds: 1,
                checkin_tolerance_seconds: 3,
                node_max_age_seconds: 10,
                cleanup_interval_seconds: 1,
            },
            events: EventsConfig {
                channel_capacity: 64,
            },
        }
    }

    /// Reject configurations that would wedge or silently disable the engine
    pub fn validate(&self) -> Result<()> {
        if self.execution.workers_per_activity == 0 {
            return Err(CoreError::ConfigurationError(
                "execution.workers_per_activity must be at least 1".to_string(),
            ));
        }
        if self.execution.lease_timeout_seconds == 0 {
            return Err(CoreError::ConfigurationError(
                "execution.lease_timeout_seconds must be positive".to_string(),
            ));
        }
        if self.execution.claim_retry_delay_ms >= self.execution.lease_timeout_seconds * 1000 {
            return Err(CoreError::ConfigurationError(format!(
                "execution.claim_retry_delay_ms ({}) must be shorter than the lease timeout",
                self.execution.claim_retry_delay_ms
            )));
        }
        if self.bucketing.default_bucket_size == 0 {
            return Err(CoreError::ConfigurationError(
                "bucketing.default_bucket_size must be at least 1".to_string(),
            ));
        }
        if self.cluster.heartbeat_interval_seconds == 0 {
            return Err(CoreError::ConfigurationError(
                "cluster.heartbeat_interval_seconds must be positive".to_string(),
            ));
        }
        if self.cluster.heartbeat_interval_seconds >= self.cluster.checkin_tolerance_seconds {
            return Err(CoreError::ConfigurationError(format!(
                "cluster.heartbeat_interval_seconds ({}) must be shorter than \
                 cluster.checkin_tolerance_seconds ({})",
                self.cluster.heartbeat_interval_seconds, self.cluster.checkin_tolerance_seconds
            )));
        }
        if self.cluster.checkin_tolerance_seconds > self.cluster.node_max_age_seconds {
            return Err(CoreError::ConfigurationError(format!(
                "cluster.checkin_tolerance_seconds ({}) must not exceed \
                 cluster.node_max_age_seconds ({})",
                self.cluster.checkin_tolerance_seconds, self.cluster.node_max_age_seconds
            )));
        }
        if self.events.channel_capacity == 0 {
            return Err(CoreError::ConfigurationError(
                "events.channel_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Activity runner settings implied by this configuration
    pub fn runner_config(&self) -> ActivityRunnerConfig {
        ActivityRunnerConfig {
            workers_per_activity: self.execution.workers_per_activity,
            default_bucket_size: self.bucketing.default_bucket_size,
            claimer: self.claimer_config(),
        }
    }

    /// Bucket claim settings implied by this configuration
    pub fn claimer_config(&self) -> BucketClaimerConfig {
        BucketClaimerConfig {
            lease_timeout: Duration::from_secs(self.execution.lease_timeout_seconds),
            claim_retry_delay: Duration::from_millis(self.execution.claim_retry_delay_ms),
        }
    }

    /// Cluster manager settings implied by this configuration
    pub fn cluster_manager_config(&self) -> ClusterManagerConfig {
        ClusterManagerConfig {
            heartbeat_interval: Duration::from_secs(self.cluster.heartbeat_interval_seconds),
            checkin_tolerance: Duration::from_secs(self.cluster.checkin_tolerance_seconds),
        }
    }

    /// Node cleaner settings implied by this configuration
    pub fn node_cleaner_config(&self) -> NodeCleanerConfig {
        NodeCleanerConfig {
            checkin_tolerance: Duration::from_secs(self.cluster.checkin_tolerance_seconds),
            max_age: Duration::from_secs(self.cluster.node_max_age_seconds),
            cleanup_interval: Duration::from_secs(self.cluster.cleanup_interval_seconds),
        }
    }
}

//! # Work Definitions
//!
//! Typed, immutable configuration for one unit of work. The original system's
//! deep definition class hierarchy is flattened into one closed enum plus a
//! shared field block; per-variant behavior lives in handlers resolved
//! through the [`ActivityHandlerRegistry`](crate::registry::ActivityHandlerRegistry),
//! never in inheritance chains.
//!
//! Definitions are cloned, never mutated in place. A composite definition
//! stores its children as unparsed [`WorkConfig`] blobs; they are parsed
//! through the factory (honoring dual addressing per child) when the activity
//! tree is compiled.

use crate::definition::factory::WorkConfig;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// How a unit of work selects the objects it operates on.
///
/// Exactly one content strategy applies, which is what makes the bucket
/// ledger well-formed: numeric ranges partition into half-open intervals,
/// filter sets into one bucket per predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectSetSpec {
    /// Addressable object space of sequential ids or row offsets, `[from, to)`
    NumericRange { from: i64, to: i64 },
    /// Opaque predicates (e.g. hash-partition filters), one bucket each
    FilterSet { filters: Vec<String> },
}

impl ObjectSetSpec {
    /// Number of addressable items, where statically known
    pub fn len(&self) -> Option<u64> {
        match self {
            Self::NumericRange { from, to } => Some((to - from).max(0) as u64),
            Self::FilterSet { .. } => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::NumericRange { from, to } => from >= to,
            Self::FilterSet { filters } => filters.is_empty(),
        }
    }
}

/// How thoroughly a run applies its effects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Apply all effects
    #[default]
    Full,
    /// Evaluate and record what would happen without writing
    Simulate,
    /// Walk the object set without evaluating effects
    DryRun,
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full => write!(f, "full"),
            Self::Simulate => write!(f, "simulate"),
            Self::DryRun => write!(f, "dry_run"),
        }
    }
}

impl std::str::FromStr for ExecutionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "full" => Ok(Self::Full),
            "simulate" => Ok(Self::Simulate),
            "dry_run" => Ok(Self::DryRun),
            _ => Err(format!("Invalid execution mode: {s}")),
        }
    }
}

/// Runtime variant of a work definition; the key of the handler dispatch
/// table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkKind {
    Search,
    Coordinate,
    Propagation,
    TriggerScan,
    AsyncUpdate,
    Scripting,
    AutoScaling,
}

impl WorkKind {
    /// All variants, in registration order
    pub const ALL: [WorkKind; 7] = [
        WorkKind::Search,
        WorkKind::Coordinate,
        WorkKind::Propagation,
        WorkKind::TriggerScan,
        WorkKind::AsyncUpdate,
        WorkKind::Scripting,
        WorkKind::AutoScaling,
    ];
}

impl fmt::Display for WorkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Search => write!(f, "search"),
            Self::Coordinate => write!(f, "coordinate"),
            Self::Propagation => write!(f, "propagation"),
            Self::TriggerScan => write!(f, "trigger_scan"),
            Self::AsyncUpdate => write!(f, "async_update"),
            Self::Scripting => write!(f, "scripting"),
            Self::AutoScaling => write!(f, "auto_scaling"),
        }
    }
}

impl std::str::FromStr for WorkKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "search" => Ok(Self::Search),
            "coordinate" => Ok(Self::Coordinate),
            "propagation" => Ok(Self::Propagation),
            "trigger_scan" => Ok(Self::TriggerScan),
            "async_update" => Ok(Self::AsyncUpdate),
            "scripting" => Ok(Self::Scripting),
            "auto_scaling" => Ok(Self::AutoScaling),
            _ => Err(format!("Invalid work kind: {s}")),
        }
    }
}

/// Fields shared by every leaf work variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkCommon {
    pub object_set: ObjectSetSpec,
    #[serde(default)]
    pub mode: ExecutionMode,
    /// Items per bucket; engine default applies when absent
    #[serde(default)]
    pub bucket_size: Option<u64>,
    /// Opaque per-deployment tailoring overrides, passed through to handlers
    #[serde(default)]
    pub tailoring: Option<Value>,
}

/// Plain search-and-process over an object set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchWork {
    #[serde(flatten)]
    pub common: WorkCommon,
}

/// Reference to a composite's child: identifier plus its unparsed config blob
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildWorkRef {
    pub id: String,
    pub config: WorkConfig,
}

/// Composite definition coordinating ordered children
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinateWork {
    /// Run children concurrently instead of in declaration order
    #[serde(default)]
    pub concurrent: bool,
    #[serde(default)]
    pub mode: ExecutionMode,
    pub children: Vec<ChildWorkRef>,
}

/// Push changes from matched objects to their linked targets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropagationWork {
    #[serde(flatten)]
    pub common: WorkCommon,
    /// Also propagate through indirect links
    #[serde(default)]
    pub cascade: bool,
}

/// Fire a named trigger for every object in the set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerScanWork {
    #[serde(flatten)]
    pub common: WorkCommon,
    pub trigger: String,
}

/// Re-drive asynchronous update requests that have not completed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AsyncUpdateWork {
    #[serde(flatten)]
    pub common: WorkCommon,
    #[serde(default)]
    pub request_timeout_seconds: Option<u64>,
}

/// Evaluate a script per object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptingWork {
    #[serde(flatten)]
    pub common: WorkCommon,
    pub script: String,
}

/// Search work that sizes its own buckets from the object-set span
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoScalingWork {
    #[serde(flatten)]
    pub common: WorkCommon,
    /// Upper bound on planned buckets; an explicit bucket_size wins
    pub max_buckets: u64,
}

/// Closed set of work definition variants.
///
/// Handler dispatch goes through [`kind`](Self::kind) and the registry's
/// explicit variant-to-handler table; there is no reflection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkDefinition {
    Search(SearchWork),
    Coordinate(CoordinateWork),
    Propagation(PropagationWork),
    TriggerScan(TriggerScanWork),
    AsyncUpdate(AsyncUpdateWork),
    Scripting(ScriptingWork),
    AutoScaling(AutoScalingWork),
}

impl WorkDefinition {
    pub fn kind(&self) -> WorkKind {
        match self {
            Self::Search(_) => WorkKind::Search,
            Self::Coordinate(_) => WorkKind::Coordinate,
            Self::Propagation(_) => WorkKind::Propagation,
            Self::TriggerScan(_) => WorkKind::TriggerScan,
            Self::AsyncUpdate(_) => WorkKind::AsyncUpdate,
            Self::Scripting(_) => WorkKind::Scripting,
            Self::AutoScaling(_) => WorkKind::AutoScaling,
        }
    }

    /// Shared leaf fields; `None` for the composite variant
    pub fn common(&self) -> Option<&WorkCommon> {
        match self {
            Self::Search(w) => Some(&w.common),
            Self::Coordinate(_) => None,
            Self::Propagation(w) => Some(&w.common),
            Self::TriggerScan(w) => Some(&w.common),
            Self::AsyncUpdate(w) => Some(&w.common),
            Self::Scripting(w) => Some(&w.common),
            Self::AutoScaling(w) => Some(&w.common),
        }
    }

    pub fn object_set(&self) -> Option<&ObjectSetSpec> {
        self.common().map(|c| &c.object_set)
    }

    pub fn execution_mode(&self) -> ExecutionMode {
        match self {
            Self::Coordinate(w) => w.mode,
            other => other
                .common()
                .map(|c| c.mode)
                .unwrap_or_default(),
        }
    }

    pub fn bucket_size(&self) -> Option<u64> {
        self.common().and_then(|c| c.bucket_size)
    }

    pub fn tailoring(&self) -> Option<&Value> {
        self.common().and_then(|c| c.tailoring.as_ref())
    }

    pub fn is_composite(&self) -> bool {
        matches!(self, Self::Coordinate(_))
    }
}

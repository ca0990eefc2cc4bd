use crate::activity::path::ActivityPath;
use crate::bucket::partition::plan_buckets;
use crate::bucket::BucketContent;
use crate::definition::{ExecutionMode, WorkDefinition, WorkKind};
use crate::error::Result;
use serde::{Deserialize, Serialize};

/// One activity in a compiled tree: a work definition bound to its path.
///
/// The path is assigned during tree compilation and never changes afterward, so every
/// store record the activity produces carries the same address across runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityDefinition {
    pub path: ActivityPath,
    pub definition: WorkDefinition,
}

impl ActivityDefinition {
    pub fn new(path: ActivityPath, definition: WorkDefinition) -> Self {
        Self { path, definition }
    }

    /// The work kind this activity executes
    pub fn kind(&self) -> WorkKind {
        self.definition.kind()
    }

    /// Final path segment, the activity's local identifier
    pub fn leaf_id(&self) -> &str {
        self.path.leaf_id()
    }

    /// True for coordinator activities whose work is running their children
    pub fn is_composite(&self) -> bool {
        self.definition.is_composite()
    }

    /// Execution mode requested by the definition
    pub fn execution_mode(&self) -> ExecutionMode {
        self.definition.execution_mode()
    }

    /// Slice this activity's object set into bucket contents
    pub fn plan_bucket_contents(&self, default_bucket_size: u64) -> Result<Vec<BucketContent>> {
        plan_buckets(&self.definition, default_bucket_size)
    }
}

//! # Activity Paths
//!
//! A path of identifiers addressing one node in an activity tree, rendered
//! as a dot-separated string (`root.propagate.update`). Paths key the
//! persisted ActivityState records and the bucket ledger, so the string form
//! is canonical and stable.

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Address of one activity node, from the root down
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ActivityPath {
    segments: Vec<String>,
}

impl ActivityPath {
    /// Path of a root activity.
    ///
    /// Segment validity (non-empty, no separator) is checked when activity
    /// definitions are compiled; see [`parse`](Self::parse) for untrusted
    /// input.
    pub fn root(id: impl Into<String>) -> Self {
        Self {
            segments: vec![id.into()],
        }
    }

    /// Extend the path by one child identifier
    pub fn child(&self, id: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(id.into());
        Self { segments }
    }

    /// Parse a dot-separated path, rejecting empty input and empty segments
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.is_empty() {
            return Err(CoreError::SchemaError("activity path is empty".to_string()));
        }
        let segments: Vec<String> = raw.split('.').map(str::to_string).collect();
        if segments.iter().any(String::is_empty) {
            return Err(CoreError::SchemaError(format!(
                "activity path '{raw}' contains an empty segment"
            )));
        }
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Identifier of the addressed node itself (the last segment)
    pub fn leaf_id(&self) -> &str {
        self.segments
            .last()
            .map(String::as_str)
            .unwrap_or_default()
    }

    /// Path of the parent node, `None` at the root
    pub fn parent(&self) -> Option<ActivityPath> {
        if self.segments.len() <= 1 {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    pub fn is_root(&self) -> bool {
        self.segments.len() == 1
    }

    /// True when `prefix` addresses this node or one of its ancestors
    pub fn starts_with(&self, prefix: &ActivityPath) -> bool {
        self.segments.len() >= prefix.segments.len()
            && self.segments[..prefix.segments.len()] == prefix.segments[..]
    }

    pub fn depth(&self) -> usize {
        self.segments.len()
    }
}

impl fmt::Display for ActivityPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

impl std::str::FromStr for ActivityPath {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ActivityPath {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<ActivityPath> for String {
    fn from(path: ActivityPath) -> Self {
        path.to_string()
    }
}

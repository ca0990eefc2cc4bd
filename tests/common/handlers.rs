//! Instrumented activity handlers shared across the integration suites.

#![allow(dead_code)] // Each test binary uses a different slice of these helpers

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use taskgrid_core::activity::{
    ActivityDefinition, ActivityHandler, FilterReport, HandlerError, HandlerResult,
    ItemDisposition,
};
use taskgrid_core::execution::ExecutionContext;

/// Handler that counts how often each item id is handed to it.
///
/// Optionally fails on one specific item, and optionally sleeps per item so
/// interruption tests can stop a run mid-flight.
#[derive(Default)]
pub struct RecordingHandler {
    pub seen: DashMap<i64, u32>,
    pub predicates: DashMap<String, u32>,
    pub fail_on: Option<i64>,
    pub temporary: bool,
    pub delay: Option<Duration>,
}

impl RecordingHandler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing_on(item: i64, temporary: bool) -> Arc<Self> {
        Arc::new(Self {
            fail_on: Some(item),
            temporary,
            ..Self::default()
        })
    }

    pub fn with_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay: Some(delay),
            ..Self::default()
        })
    }

    pub fn times_seen(&self, item: i64) -> u32 {
        self.seen.get(&item).map(|count| *count).unwrap_or(0)
    }

    pub fn distinct_items(&self) -> usize {
        self.seen.len()
    }

    pub fn total_calls(&self) -> u64 {
        self.seen.iter().map(|entry| u64::from(*entry.value())).sum()
    }
}

#[async_trait]
impl ActivityHandler for RecordingHandler {
    async fn handle_item(
        &self,
        _ctx: &ExecutionContext,
        _activity: &ActivityDefinition,
        item_id: i64,
    ) -> HandlerResult<ItemDisposition> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        *self.seen.entry(item_id).or_insert(0) += 1;

        if self.fail_on == Some(item_id) {
            return Err(if self.temporary {
                HandlerError::temporary(format!("backend unavailable for item {item_id}"))
            } else {
                HandlerError::permanent(format!("item {item_id} is malformed"))
            });
        }
        Ok(ItemDisposition::Processed)
    }

    async fn handle_filter(
        &self,
        _ctx: &ExecutionContext,
        _activity: &ActivityDefinition,
        predicate: &str,
    ) -> HandlerResult<FilterReport> {
        *self.predicates.entry(predicate.to_string()).or_insert(0) += 1;
        Ok(FilterReport::processed(10))
    }
}

/// Handler that records the activity path of every call, preserving order.
///
/// Lets composite tests assert which child an item was processed under and
/// whether sequential children actually ran one after the other.
#[derive(Default)]
pub struct PathRecordingHandler {
    pub calls: Mutex<Vec<(String, i64)>>,
}

impl PathRecordingHandler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls_for(&self, path: &str) -> Vec<i64> {
        self.calls
            .lock()
            .iter()
            .filter(|(p, _)| p == path)
            .map(|(_, item)| *item)
            .collect()
    }

    /// Index of the first call under `path`, if any
    pub fn first_index_of(&self, path: &str) -> Option<usize> {
        self.calls.lock().iter().position(|(p, _)| p == path)
    }

    /// Index of the last call under `path`, if any
    pub fn last_index_of(&self, path: &str) -> Option<usize> {
        self.calls.lock().iter().rposition(|(p, _)| p == path)
    }
}

#[async_trait]
impl ActivityHandler for PathRecordingHandler {
    async fn handle_item(
        &self,
        _ctx: &ExecutionContext,
        activity: &ActivityDefinition,
        item_id: i64,
    ) -> HandlerResult<ItemDisposition> {
        self.calls
            .lock()
            .push((activity.path.to_string(), item_id));
        Ok(ItemDisposition::Processed)
    }
}

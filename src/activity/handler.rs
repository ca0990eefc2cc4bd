//! # Activity Handlers
//!
//! A handler supplies the domain logic for one work kind. The engine claims buckets and
//! drives iteration; the handler is called once per item for interval buckets and once
//! per predicate for filter buckets. Handlers signal recoverable trouble with
//! `HandlerError::Temporary` and unrecoverable trouble with `HandlerError::Permanent`,
//! and that severity decides whether the task is rescheduled or suspended.

use crate::activity::definition::ActivityDefinition;
use crate::error::CoreError;
use crate::execution::ExecutionContext;
use async_trait::async_trait;

/// Outcome of handling a single item.
///
/// `Failed` records the item in the failure counters without halting the activity. A
/// failure that should halt is returned as a `HandlerError` instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemDisposition {
    Processed,
    Skipped,
    Failed,
}

/// Item counts produced by handling one filter predicate
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterReport {
    pub items_processed: u64,
    pub items_failed: u64,
    pub items_skipped: u64,
}

impl FilterReport {
    pub fn processed(count: u64) -> Self {
        Self {
            items_processed: count,
            ..Default::default()
        }
    }
}

/// Failure raised by handler logic, classified by whether retrying can help
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// Retrying will not help; the task is suspended until an operator intervenes
    #[error("permanent handler failure: {0}")]
    Permanent(String),
    /// A later attempt may succeed; the task stays eligible for rescheduling
    #[error("temporary handler failure: {0}")]
    Temporary(String),
}

impl HandlerError {
    pub fn permanent(message: impl Into<String>) -> Self {
        Self::Permanent(message.into())
    }

    pub fn temporary(message: impl Into<String>) -> Self {
        Self::Temporary(message.into())
    }

    pub fn is_temporary(&self) -> bool {
        matches!(self, Self::Temporary(_))
    }
}

impl From<HandlerError> for CoreError {
    fn from(err: HandlerError) -> Self {
        match err {
            HandlerError::Permanent(msg) => CoreError::HandlerPermanentError(msg),
            HandlerError::Temporary(msg) => CoreError::HandlerTemporaryError(msg),
        }
    }
}

pub type HandlerResult<T> = std::result::Result<T, HandlerError>;

/// Domain logic for one work kind.
///
/// Implementations must be stateless with respect to bucket boundaries: the same item
/// may be handed to a different worker after a lease expires, so per-item work has to
/// be idempotent or tolerate re-execution.
#[async_trait]
pub trait ActivityHandler: Send + Sync {
    /// Process one item from an interval bucket
    async fn handle_item(
        &self,
        ctx: &ExecutionContext,
        activity: &ActivityDefinition,
        item_id: i64,
    ) -> HandlerResult<ItemDisposition>;

    /// Process one filter predicate from a filter bucket.
    ///
    /// Kinds that only ever run over numeric ranges can leave the default, which
    /// rejects filter buckets as a configuration mistake.
    async fn handle_filter(
        &self,
        ctx: &ExecutionContext,
        activity: &ActivityDefinition,
        predicate: &str,
    ) -> HandlerResult<FilterReport> {
        let _ = (ctx, predicate);
        Err(HandlerError::permanent(format!(
            "handler for {} work does not support filter buckets",
            activity.kind()
        )))
    }
}

impl std::fmt::Debug for dyn ActivityHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ActivityHandler")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::path::ActivityPath;
    use crate::definition::work_definition::{ObjectSetSpec, SearchWork, WorkCommon};
    use crate::definition::{ExecutionMode, WorkDefinition};
    use crate::execution::StopSignal;
    use uuid::Uuid;

    struct ItemsOnlyHandler;

    #[async_trait]
    impl ActivityHandler for ItemsOnlyHandler {
        async fn handle_item(
            &self,
            _ctx: &ExecutionContext,
            _activity: &ActivityDefinition,
            _item_id: i64,
        ) -> HandlerResult<ItemDisposition> {
            Ok(ItemDisposition::Processed)
        }
    }

    fn search_activity() -> ActivityDefinition {
        ActivityDefinition::new(
            ActivityPath::root("root"),
            WorkDefinition::Search(SearchWork {
                common: WorkCommon {
                    object_set: ObjectSetSpec::NumericRange { from: 0, to: 10 },
                    mode: ExecutionMode::default(),
                    bucket_size: None,
                    tailoring: None,
                },
            }),
        )
    }

    #[tokio::test]
    async fn default_filter_handling_is_a_permanent_failure() {
        let handler = ItemsOnlyHandler;
        let ctx = ExecutionContext::new(Uuid::new_v4(), Uuid::new_v4(), StopSignal::default());

        let result = handler
            .handle_filter(&ctx, &search_activity(), "region = 'eu'")
            .await;

        match result {
            Err(HandlerError::Permanent(msg)) => assert!(msg.contains("filter buckets")),
            other => panic!("expected permanent failure, got {other:?}"),
        }
    }

    #[test]
    fn handler_error_severity_maps_to_core_error() {
        let permanent: CoreError = HandlerError::permanent("bad schema").into();
        let temporary: CoreError = HandlerError::temporary("backend busy").into();

        assert!(matches!(permanent, CoreError::HandlerPermanentError(_)));
        assert!(matches!(temporary, CoreError::HandlerTemporaryError(_)));
        assert!(temporary.is_retryable());
        assert!(!permanent.is_retryable());
    }
}

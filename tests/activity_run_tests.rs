//! End-to-end task execution scenarios through the full engine stack:
//! task runner, activity tree, claim protocol and durable state against a
//! shared in-memory store.

mod common;

use common::builders::{coordinate_config, search_config, search_config_in_mode, RunHarness};
use common::handlers::{PathRecordingHandler, RecordingHandler};
use std::time::Duration;
use taskgrid_core::bucket::{BucketClaimer, BucketClaimerConfig, BucketContent, BucketState};
use taskgrid_core::error::CoreError;
use taskgrid_core::execution::{ExecutionContext, StopSignal, TaskRunResult};
use taskgrid_core::state::ActivityStatus;
use taskgrid_core::store::ObjectStore;
use taskgrid_core::task::{SchedulingState, TaskExecutionState};
use uuid::Uuid;

#[tokio::test]
async fn full_range_is_processed_exactly_once_across_workers() {
    let handler = RecordingHandler::new();
    let harness = RunHarness::with_handler(handler.clone()).await;
    let task = harness
        .submit("bulk-scan", search_config(0, 1000, 10))
        .await;

    let result = harness.run(task.task_id).await.unwrap();
    assert_eq!(result, TaskRunResult::Finished);

    // Every item handled exactly once, across all claim workers.
    assert_eq!(handler.distinct_items(), 1000);
    assert_eq!(handler.total_calls(), 1000);

    let task = harness.task(task.task_id).await;
    assert_eq!(task.execution_state, TaskExecutionState::Closed);
    assert_eq!(task.scheduling_state, SchedulingState::Runnable);
    assert_eq!(task.last_run_result, Some(TaskRunResult::Finished));
    assert_eq!(task.owning_node, None);
    assert_eq!(task.progress.items_processed, 1000);
    assert_eq!(task.progress.buckets_completed, 100);

    let state = harness.root_state(task.task_id).await.unwrap();
    assert_eq!(state.status, ActivityStatus::Complete);
}

#[tokio::test]
async fn permanent_failure_suspends_task_without_retrying_the_item() {
    let handler = RecordingHandler::failing_on(500, false);
    let harness = RunHarness::with_handler(handler.clone()).await;
    let task = harness
        .submit("poison-scan", search_config(0, 1000, 50))
        .await;

    let result = harness.run(task.task_id).await.unwrap();
    assert_eq!(result, TaskRunResult::PermanentError);
    assert_eq!(handler.times_seen(500), 1, "failing item is not retried");

    let task = harness.task(task.task_id).await;
    assert_eq!(task.scheduling_state, SchedulingState::Suspended);
    assert_eq!(task.last_run_result, Some(TaskRunResult::PermanentError));

    // A suspended task refuses further runs until an operator intervenes.
    let err = harness.run(task.task_id).await.unwrap_err();
    assert!(matches!(err, CoreError::StateError(_)));
    assert_eq!(handler.times_seen(500), 1);
}

#[tokio::test]
async fn temporary_failure_keeps_task_runnable() {
    let handler = RecordingHandler::failing_on(7, true);
    let harness = RunHarness::with_handler(handler).await;
    let task = harness.submit("flaky-scan", search_config(0, 30, 10)).await;

    let result = harness.run(task.task_id).await.unwrap();
    assert_eq!(result, TaskRunResult::TemporaryError);

    let task = harness.task(task.task_id).await;
    assert_eq!(task.scheduling_state, SchedulingState::Runnable);
    assert_eq!(task.last_run_result, Some(TaskRunResult::TemporaryError));
}

#[tokio::test]
async fn interrupted_run_resumes_without_reprocessing_completed_buckets() {
    let handler = RecordingHandler::with_delay(Duration::from_millis(1));
    let harness = RunHarness::with_handler(handler.clone()).await;
    let task = harness
        .submit("interruptible-scan", search_config(0, 300, 10))
        .await;

    // With a 1ms floor per item, 300 items over 3 workers cannot finish
    // inside 50ms, so the stop always lands mid-run.
    let stop = StopSignal::new();
    let stopper = {
        let stop = stop.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            stop.request_stop();
        })
    };
    let result = harness.run_with_stop(task.task_id, stop).await.unwrap();
    stopper.await.unwrap();
    assert_eq!(result, TaskRunResult::Interrupted);

    let interrupted = harness.task(task.task_id).await;
    assert_eq!(interrupted.execution_state, TaskExecutionState::Closed);
    assert_eq!(interrupted.scheduling_state, SchedulingState::Runnable);
    assert_eq!(
        interrupted.last_run_result,
        Some(TaskRunResult::Interrupted)
    );

    // No bucket is left held: everything is complete or back to ready.
    let root_path = "root".parse().unwrap();
    let ledger = harness
        .store
        .list_buckets(task.task_id, &root_path)
        .await
        .unwrap();
    let mut completed_ranges = Vec::new();
    for bucket in &ledger {
        assert_ne!(bucket.state, BucketState::InProgress);
        if bucket.state == BucketState::Complete {
            let BucketContent::Interval { from, to } = &bucket.content else {
                panic!("interval task planned a filter bucket");
            };
            completed_ranges.push((*from, *to));
        }
    }
    assert!(
        !completed_ranges.is_empty(),
        "some buckets completed before the stop landed"
    );
    assert!(
        completed_ranges.len() < 30,
        "the stop landed before the run finished"
    );

    // Resume with a fresh signal and drain the remainder.
    let result = harness.run(task.task_id).await.unwrap();
    assert_eq!(result, TaskRunResult::Finished);

    for item in 0..300 {
        assert!(handler.times_seen(item) >= 1, "item {item} never processed");
    }
    // Items inside buckets that completed before the interrupt were not
    // touched again by the resumed run.
    for (from, to) in completed_ranges {
        for item in from..to {
            assert_eq!(
                handler.times_seen(item),
                1,
                "item {item} of a completed bucket was reprocessed"
            );
        }
    }

    let task = harness.task(task.task_id).await;
    assert_eq!(task.progress.buckets_completed, 30);
    assert!(task.progress.items_processed >= 300);
    assert_eq!(task.progress.items_processed, handler.total_calls());

    let state = harness.root_state(task.task_id).await.unwrap();
    assert_eq!(state.status, ActivityStatus::Complete);
}

#[tokio::test]
async fn sequential_children_run_in_declaration_order() {
    let handler = PathRecordingHandler::new();
    let harness = RunHarness::with_handler(handler.clone()).await;
    let task = harness
        .submit(
            "ordered-phases",
            coordinate_config(
                vec![
                    ("alpha", search_config(0, 30, 10)),
                    ("beta", search_config(0, 30, 10)),
                ],
                false,
            ),
        )
        .await;

    let result = harness.run(task.task_id).await.unwrap();
    assert_eq!(result, TaskRunResult::Finished);

    assert_eq!(handler.calls_for("root.alpha").len(), 30);
    assert_eq!(handler.calls_for("root.beta").len(), 30);
    let last_alpha = handler.last_index_of("root.alpha").unwrap();
    let first_beta = handler.first_index_of("root.beta").unwrap();
    assert!(
        last_alpha < first_beta,
        "beta started before alpha finished"
    );

    for path in ["root", "root.alpha", "root.beta"] {
        let state = harness.state_at(task.task_id, path).await.unwrap();
        assert_eq!(state.status, ActivityStatus::Complete, "{path}");
    }
}

#[tokio::test]
async fn concurrent_children_all_complete() {
    let handler = RecordingHandler::new();
    let harness = RunHarness::with_handler(handler.clone()).await;
    let task = harness
        .submit(
            "parallel-phases",
            coordinate_config(
                vec![
                    ("left", search_config(0, 40, 10)),
                    ("right", search_config(100, 140, 10)),
                ],
                true,
            ),
        )
        .await;

    let result = harness.run(task.task_id).await.unwrap();
    assert_eq!(result, TaskRunResult::Finished);
    assert_eq!(handler.distinct_items(), 80);
    assert_eq!(handler.total_calls(), 80);

    for path in ["root", "root.left", "root.right"] {
        let state = harness.state_at(task.task_id, path).await.unwrap();
        assert_eq!(state.status, ActivityStatus::Complete, "{path}");
    }
}

#[tokio::test]
async fn failed_child_halts_later_siblings() {
    let handler = RecordingHandler::failing_on(25, false);
    let harness = RunHarness::with_handler(handler.clone()).await;
    let task = harness
        .submit(
            "halting-phases",
            coordinate_config(
                vec![
                    ("ok", search_config(0, 20, 10)),
                    ("bad", search_config(20, 40, 10)),
                    ("never", search_config(40, 60, 10)),
                ],
                false,
            ),
        )
        .await;

    let result = harness.run(task.task_id).await.unwrap();
    assert_eq!(result, TaskRunResult::PermanentError);

    let task = harness.task(task.task_id).await;
    assert_eq!(task.scheduling_state, SchedulingState::Suspended);

    assert_eq!(
        harness
            .state_at(task.task_id, "root.ok")
            .await
            .unwrap()
            .status,
        ActivityStatus::Complete
    );
    assert_eq!(
        harness
            .state_at(task.task_id, "root.bad")
            .await
            .unwrap()
            .status,
        ActivityStatus::Paused
    );
    assert!(
        harness.state_at(task.task_id, "root.never").await.is_none(),
        "the sibling after the failure must not start"
    );
    for item in 40..60 {
        assert_eq!(handler.times_seen(item), 0);
    }
}

#[tokio::test]
async fn foreign_live_lease_parks_the_task_until_handed_back() {
    let handler = RecordingHandler::new();
    let harness = RunHarness::with_handler(handler.clone()).await;
    let task = harness
        .submit("shared-scan", search_config(0, 30, 10))
        .await;

    // A worker on another node claims the first bucket with a long lease
    // before this node ever runs the task.
    let foreign_claimer = BucketClaimer::with_config(
        harness.store.clone(),
        BucketClaimerConfig {
            lease_timeout: Duration::from_secs(600),
            claim_retry_delay: Duration::from_millis(5),
        },
    );
    let root_path = "root".parse().unwrap();
    let foreign_ctx = ExecutionContext::new(task.task_id, Uuid::new_v4(), StopSignal::new());
    foreign_claimer
        .ensure_ledger(task.task_id, &root_path, 1, vec![
            BucketContent::Interval { from: 0, to: 10 },
            BucketContent::Interval { from: 10, to: 20 },
            BucketContent::Interval { from: 20, to: 30 },
        ])
        .await
        .unwrap();
    let held = foreign_claimer
        .claim_next(&foreign_ctx, &root_path)
        .await
        .unwrap()
        .unwrap();

    let result = harness.run(task.task_id).await.unwrap();
    assert_eq!(result, TaskRunResult::Waiting);
    assert_eq!(handler.distinct_items(), 20, "only the unheld buckets ran");

    let parked = harness.task(task.task_id).await;
    assert_eq!(parked.scheduling_state, SchedulingState::Waiting);
    assert_eq!(
        harness.root_state(task.task_id).await.unwrap().status,
        ActivityStatus::InProgress
    );

    // The foreign worker finishes its bucket; an explicit re-run then closes
    // the activity without redoing anything.
    assert!(foreign_claimer.complete(&foreign_ctx, &held).await.unwrap());
    let result = harness.run(task.task_id).await.unwrap();
    assert_eq!(result, TaskRunResult::Finished);
    assert_eq!(handler.distinct_items(), 20, "no item was reprocessed");
    assert_eq!(
        harness.root_state(task.task_id).await.unwrap().status,
        ActivityStatus::Complete
    );
    assert_eq!(
        harness.task(task.task_id).await.scheduling_state,
        SchedulingState::Runnable
    );
}

#[tokio::test]
async fn dry_run_counts_objects_without_calling_the_handler() {
    let handler = RecordingHandler::new();
    let harness = RunHarness::with_handler(handler.clone()).await;
    let task = harness
        .submit("rehearsal", search_config_in_mode(0, 25, 10, "dry_run"))
        .await;

    let result = harness.run(task.task_id).await.unwrap();
    assert_eq!(result, TaskRunResult::Finished);
    assert_eq!(handler.total_calls(), 0);

    let task = harness.task(task.task_id).await;
    assert_eq!(task.progress.items_processed, 25);
}

#[tokio::test]
async fn finished_task_rerun_is_a_no_op() {
    let handler = RecordingHandler::new();
    let harness = RunHarness::with_handler(handler.clone()).await;
    let task = harness.submit("idempotent", search_config(0, 30, 10)).await;

    assert_eq!(
        harness.run(task.task_id).await.unwrap(),
        TaskRunResult::Finished
    );
    assert_eq!(handler.total_calls(), 30);

    assert_eq!(
        harness.run(task.task_id).await.unwrap(),
        TaskRunResult::Finished
    );
    assert_eq!(handler.total_calls(), 30, "no rework on rerun");
}

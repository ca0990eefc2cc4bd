//! Integration tests for the distributed bucket claim protocol.
//!
//! These run many claimants against one shared in-memory store, so the
//! version-checked update path is exercised under real task interleaving.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use taskgrid_core::activity::ActivityPath;
use taskgrid_core::bucket::{BucketClaimer, BucketClaimerConfig, BucketContent};
use taskgrid_core::execution::{ExecutionContext, StopSignal};
use taskgrid_core::store::{InMemoryStore, ObjectStore};
use uuid::Uuid;

fn interval_contents(count: i64, size: i64) -> Vec<BucketContent> {
    (0..count)
        .map(|i| BucketContent::Interval {
            from: i * size,
            to: (i + 1) * size,
        })
        .collect()
}

#[tokio::test]
async fn racing_workers_complete_each_bucket_exactly_once() {
    let store = Arc::new(InMemoryStore::new());
    let claimer = Arc::new(BucketClaimer::with_config(
        store.clone(),
        BucketClaimerConfig::for_testing(),
    ));
    let task_id = Uuid::new_v4();
    let path = ActivityPath::root("scan");

    claimer
        .ensure_ledger(task_id, &path, 1, interval_contents(24, 10))
        .await
        .unwrap();

    let stop = StopSignal::new();
    let mut workers = Vec::new();
    for _ in 0..8 {
        let claimer = claimer.clone();
        let path = path.clone();
        let ctx = ExecutionContext::new(task_id, Uuid::new_v4(), stop.clone());
        workers.push(tokio::spawn(async move {
            let mut sequences = Vec::new();
            while let Some(bucket) = claimer.claim_next(&ctx, &path).await.unwrap() {
                assert!(claimer.complete(&ctx, &bucket).await.unwrap());
                sequences.push(bucket.sequence);
            }
            sequences
        }));
    }

    let mut all_sequences = Vec::new();
    for worker in workers {
        all_sequences.extend(worker.await.unwrap());
    }

    assert_eq!(all_sequences.len(), 24, "every bucket completed once");
    let distinct: HashSet<u32> = all_sequences.iter().copied().collect();
    assert_eq!(distinct.len(), 24, "no bucket completed twice");

    let summary = claimer.ledger_summary(task_id, &path).await.unwrap();
    assert!(summary.all_complete());
}

#[tokio::test]
async fn concurrent_seeders_produce_one_ledger() {
    let store = Arc::new(InMemoryStore::new());
    let task_id = Uuid::new_v4();
    let path = ActivityPath::root("scan");

    let mut seeders = Vec::new();
    for _ in 0..4 {
        let store = store.clone();
        let path = path.clone();
        seeders.push(tokio::spawn(async move {
            let claimer =
                BucketClaimer::with_config(store, BucketClaimerConfig::for_testing());
            claimer
                .ensure_ledger(task_id, &path, 1, interval_contents(10, 100))
                .await
                .unwrap()
        }));
    }

    for seeder in seeders {
        assert_eq!(seeder.await.unwrap(), 10);
    }

    let ledger = store.list_buckets(task_id, &path).await.unwrap();
    assert_eq!(ledger.len(), 10);
    let sequences: Vec<u32> = ledger.iter().map(|bucket| bucket.sequence).collect();
    assert_eq!(sequences, (0..10).collect::<Vec<u32>>());
}

#[tokio::test]
async fn expired_lease_is_reclaimed_by_exactly_one_worker() {
    let store = Arc::new(InMemoryStore::new());
    let task_id = Uuid::new_v4();
    let path = ActivityPath::root("scan");

    // A short-leased claimer plays the crashed worker; the rescuers hold
    // long leases so the winner's claim cannot itself expire mid-test.
    let crashed_claimer = BucketClaimer::with_config(
        store.clone(),
        BucketClaimerConfig {
            lease_timeout: Duration::from_millis(30),
            claim_retry_delay: Duration::from_millis(5),
        },
    );
    let rescuer_claimer = Arc::new(BucketClaimer::with_config(
        store.clone(),
        BucketClaimerConfig {
            lease_timeout: Duration::from_secs(300),
            claim_retry_delay: Duration::from_millis(5),
        },
    ));

    crashed_claimer
        .ensure_ledger(task_id, &path, 1, interval_contents(1, 10))
        .await
        .unwrap();

    let stop = StopSignal::new();
    let crashed = ExecutionContext::new(task_id, Uuid::new_v4(), stop.clone());
    crashed_claimer
        .claim_next(&crashed, &path)
        .await
        .unwrap()
        .unwrap();
    tokio::time::sleep(Duration::from_millis(60)).await;

    let mut rescuers = Vec::new();
    for _ in 0..4 {
        let claimer = rescuer_claimer.clone();
        let path = path.clone();
        let ctx = ExecutionContext::new(task_id, Uuid::new_v4(), stop.clone());
        rescuers.push(tokio::spawn(async move {
            claimer
                .claim_next(&ctx, &path)
                .await
                .unwrap()
                .map(|bucket| bucket.sequence)
        }));
    }

    let mut winners = 0;
    for rescuer in rescuers {
        if rescuer.await.unwrap().is_some() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1, "exactly one rescuer reclaims the bucket");
}

#[tokio::test]
async fn interleaved_release_hands_work_between_nodes() {
    let store = Arc::new(InMemoryStore::new());
    let claimer = Arc::new(BucketClaimer::with_config(
        store.clone(),
        BucketClaimerConfig::for_testing(),
    ));
    let task_id = Uuid::new_v4();
    let path = ActivityPath::root("scan");

    claimer
        .ensure_ledger(task_id, &path, 1, interval_contents(2, 10))
        .await
        .unwrap();

    let stop = StopSignal::new();
    let first = ExecutionContext::new(task_id, Uuid::new_v4(), stop.clone());
    let second = ExecutionContext::new(task_id, Uuid::new_v4(), stop.clone());

    // First node claims both buckets, finishes one, releases the other on
    // shutdown. Second node picks up only the released one.
    let kept = claimer.claim_next(&first, &path).await.unwrap().unwrap();
    let released = claimer.claim_next(&first, &path).await.unwrap().unwrap();
    assert!(claimer.complete(&first, &kept).await.unwrap());
    assert!(claimer.release(&first, &released).await.unwrap());

    let handed_over = claimer.claim_next(&second, &path).await.unwrap().unwrap();
    assert_eq!(handed_over.sequence, released.sequence);
    assert!(claimer.complete(&second, &handed_over).await.unwrap());

    assert!(claimer.claim_next(&second, &path).await.unwrap().is_none());
    let summary = claimer.ledger_summary(task_id, &path).await.unwrap();
    assert!(summary.all_complete());
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::job::JobSpec;
use std::sync::Arc;
use std::time::Duration;

fn make_job(id: &str) -> Job {
    Job::new(id, JobSpec::new(format!("{}.dwg", id), "PLOT"))
}

fn ids(jobs: &[Job]) -> Vec<&str> {
    jobs.iter().map(|j| j.id.as_str()).collect()
}

/// Drive a job all the way to `Verifying` on worker 1
fn run_to_verifying(queue: &WorkQueue) -> JobId {
    let job = queue.dequeue().unwrap();
    queue.mark_running(&job.id, WorkerId(1)).unwrap();
    queue.mark_verifying(&job.id).unwrap();
    job.id
}

#[test]
fn queue_starts_empty() {
    let queue = WorkQueue::default();
    assert!(queue.is_empty());
    assert!(queue.snapshot().is_empty());
    assert!(!queue.is_signaled());
}

#[test]
fn submit_appends_in_order_and_raises_signal() {
    let queue = WorkQueue::default();
    queue.submit(make_job("a")).unwrap();
    queue.submit(make_job("b")).unwrap();

    assert_eq!(queue.pending_len(), 2);
    assert!(queue.is_signaled());
    assert_eq!(ids(&queue.snapshot()), vec!["a", "b"]);
}

#[test]
fn same_name_submissions_are_independent_jobs() {
    let queue = WorkQueue::default();
    let spec = JobSpec::new("plan.dwg", "PLOT");
    queue.submit(Job::new("a", spec.clone())).unwrap();
    queue.submit(Job::new("b", spec)).unwrap();
    assert_eq!(queue.pending_len(), 2);
}

#[test]
fn submit_rejects_duplicate_ids() {
    let queue = WorkQueue::default();
    queue.submit(make_job("a")).unwrap();
    assert_eq!(
        queue.submit(make_job("a")),
        Err(QueueError::DuplicateId(JobId::from("a")))
    );
}

#[test]
fn submit_rejects_jobs_past_waiting() {
    let queue = WorkQueue::default();
    let mut job = make_job("a");
    job.advance(JobStatus::Running).unwrap();
    assert_eq!(
        queue.submit(job),
        Err(QueueError::NotWaiting(JobId::from("a")))
    );
}

#[test]
fn dequeue_takes_head_and_moves_it_in_flight() {
    let queue = WorkQueue::default();
    queue.submit(make_job("a")).unwrap();
    queue.submit(make_job("b")).unwrap();

    let job = queue.dequeue().unwrap();
    assert_eq!(job.id.as_str(), "a");
    assert_eq!(queue.pending_len(), 1);
    assert_eq!(queue.in_flight_len(), 1);

    // still visible while being assigned
    assert_eq!(ids(&queue.snapshot()), vec!["a", "b"]);
}

#[test]
fn dequeue_on_empty_returns_none() {
    let queue = WorkQueue::default();
    assert!(queue.dequeue().is_none());
}

#[test]
fn mark_running_records_worker() {
    let queue = WorkQueue::default();
    queue.submit(make_job("a")).unwrap();
    let job = queue.dequeue().unwrap();

    queue.mark_running(&job.id, WorkerId(3)).unwrap();

    let job = queue.get(&job.id).unwrap();
    assert_eq!(job.status, JobStatus::Running);
    assert_eq!(job.worker, Some(WorkerId(3)));
}

#[test]
fn mark_running_requires_in_flight_job() {
    let queue = WorkQueue::default();
    queue.submit(make_job("a")).unwrap();
    assert_eq!(
        queue.mark_running(&JobId::from("a"), WorkerId(1)),
        Err(QueueError::UnknownJob(JobId::from("a")))
    );
}

#[test]
fn complete_moves_verifying_job_to_completed() {
    let queue = WorkQueue::default();
    queue.submit(make_job("a")).unwrap();
    let id = run_to_verifying(&queue);

    let job = queue.complete(&id).unwrap();

    assert_eq!(job.status, JobStatus::Complete);
    assert_eq!(queue.in_flight_len(), 0);
    assert_eq!(queue.completed_len(), 1);
    assert_eq!(queue.get(&id).unwrap().status, JobStatus::Complete);
}

#[test]
fn complete_rejects_running_job_and_keeps_it_in_flight() {
    let queue = WorkQueue::default();
    queue.submit(make_job("a")).unwrap();
    let job = queue.dequeue().unwrap();
    queue.mark_running(&job.id, WorkerId(1)).unwrap();

    let err = queue.complete(&job.id).unwrap_err();

    assert!(matches!(err, QueueError::Transition(_)));
    assert_eq!(queue.in_flight_len(), 1);
    assert_eq!(queue.get(&job.id).unwrap().status, JobStatus::Running);
}

#[test]
fn fail_works_for_pending_and_in_flight_jobs() {
    let queue = WorkQueue::default();
    queue.submit(make_job("a")).unwrap();
    queue.submit(make_job("b")).unwrap();

    let running = queue.dequeue().unwrap();
    queue.mark_running(&running.id, WorkerId(1)).unwrap();

    assert_eq!(queue.fail(&running.id).unwrap().status, JobStatus::Error);
    assert_eq!(
        queue.fail(&JobId::from("b")).unwrap().status,
        JobStatus::Error
    );
    assert!(queue.is_empty());
    assert_eq!(queue.completed_len(), 2);
}

#[test]
fn finished_jobs_are_immutable() {
    let queue = WorkQueue::default();
    queue.submit(make_job("a")).unwrap();
    let id = run_to_verifying(&queue);
    queue.complete(&id).unwrap();

    assert!(queue.fail(&id).is_err());
    assert!(queue.mark_verifying(&id).is_err());
    assert_eq!(queue.get(&id).unwrap().status, JobStatus::Complete);
}

#[test]
fn snapshot_orders_completed_then_in_flight_then_pending() {
    let queue = WorkQueue::default();
    for id in ["a", "b", "c"] {
        queue.submit(make_job(id)).unwrap();
    }
    let a = run_to_verifying(&queue);
    queue.complete(&a).unwrap();
    queue.dequeue().unwrap();

    let summaries = queue.summaries();
    let statuses: Vec<_> = summaries
        .iter()
        .map(|s| (s.id.as_str(), s.status))
        .collect();
    assert_eq!(
        statuses,
        vec![
            ("a", JobStatus::Complete),
            ("b", JobStatus::Waiting),
            ("c", JobStatus::Waiting),
        ]
    );
}

#[test]
fn snapshot_is_idempotent() {
    let queue = WorkQueue::default();
    queue.submit(make_job("a")).unwrap();
    queue.submit(make_job("b")).unwrap();
    queue.dequeue().unwrap();

    assert_eq!(queue.snapshot(), queue.snapshot());
}

#[test]
fn completed_is_bounded_and_evicts_oldest() {
    let queue = WorkQueue::new(2);
    for id in ["a", "b", "c"] {
        queue.submit(make_job(id)).unwrap();
        let id = run_to_verifying(&queue);
        queue.complete(&id).unwrap();
    }

    assert_eq!(queue.completed_len(), 2);
    assert_eq!(queue.evicted(), 1);
    assert_eq!(ids(&queue.snapshot()), vec!["b", "c"]);
    assert!(queue.get(&JobId::from("a")).is_none());

    // evicted ids may be reused
    queue.submit(make_job("a")).unwrap();
}

#[test]
fn clear_signal_keeps_signal_while_jobs_pending() {
    let queue = WorkQueue::default();
    queue.submit(make_job("a")).unwrap();

    queue.clear_signal();
    assert!(queue.is_signaled());

    queue.dequeue().unwrap();
    queue.clear_signal();
    assert!(!queue.is_signaled());
}

#[tokio::test]
async fn wait_non_empty_wakes_on_submit() {
    let queue = Arc::new(WorkQueue::default());
    let waiter = {
        let queue = Arc::clone(&queue);
        tokio::spawn(async move { queue.wait_non_empty().await })
    };

    tokio::task::yield_now().await;
    queue.submit(make_job("a")).unwrap();

    tokio::time::timeout(Duration::from_secs(1), waiter)
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn wait_non_empty_returns_immediately_when_raised() {
    let queue = WorkQueue::default();
    queue.submit(make_job("a")).unwrap();
    tokio::time::timeout(Duration::from_millis(100), queue.wait_non_empty())
        .await
        .unwrap();
}

#[test]
fn concurrent_submitters_lose_nothing() {
    let queue = Arc::new(WorkQueue::default());
    let handles: Vec<_> = (0..4)
        .map(|t| {
            let queue = Arc::clone(&queue);
            std::thread::spawn(move || {
                for n in 0..50 {
                    queue.submit(make_job(&format!("t{}-{}", t, n))).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(queue.pending_len(), 200);
    // per-submitter order is preserved
    let snapshot = queue.snapshot();
    for t in 0..4 {
        let prefix = format!("t{}-", t);
        let seq: Vec<usize> = snapshot
            .iter()
            .filter_map(|j| j.id.as_str().strip_prefix(&prefix))
            .map(|n| n.parse().unwrap())
            .collect();
        assert_eq!(seq, (0..50).collect::<Vec<_>>());
    }
}

// Property-based tests
use proptest::prelude::*;

proptest! {
    #[test]
    fn dequeue_order_matches_submission_order(count in 1usize..40, takes in 0usize..40) {
        let queue = WorkQueue::default();
        for n in 0..count {
            queue.submit(make_job(&format!("job-{}", n))).unwrap();
        }

        let mut taken = Vec::new();
        for _ in 0..takes {
            match queue.dequeue() {
                Some(job) => taken.push(job.id.0),
                None => break,
            }
        }

        let expected: Vec<String> = (0..count.min(takes)).map(|n| format!("job-{}", n)).collect();
        prop_assert_eq!(taken, expected);

        let pending: Vec<String> = queue
            .snapshot()
            .into_iter()
            .filter(|j| j.status == JobStatus::Waiting)
            .map(|j| j.id.0)
            .collect();
        let all: Vec<String> = (0..count).map(|n| format!("job-{}", n)).collect();
        prop_assert_eq!(pending, all);
    }
}

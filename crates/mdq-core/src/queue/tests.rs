use std::sync::Arc;
use std::time::Duration;

use super::*;
use crate::job::{JobError, JobErrorKind};

fn spec(n: usize) -> JobSpec {
    JobSpec::new(format!("https://good.example/v/{n}"), "mp4", "720p")
}

#[test]
fn submit_rejects_invalid_spec_without_creating_a_job() {
    let queue = JobQueue::new(5);
    let err = queue
        .submit(JobSpec::new("bad-url", "mp4", "720p"))
        .unwrap_err();
    assert!(matches!(err, SubmitError::InvalidUrl { .. }));
    assert!(queue.list(None).is_empty());
}

#[test]
fn dispatch_is_fifo_and_capped_at_max_concurrent() {
    let queue = JobQueue::new(5);
    let ids: Vec<JobId> = (0..7).map(|n| queue.submit(spec(n)).unwrap()).collect();

    let claims: Vec<Claim> = std::iter::from_fn(|| queue.try_claim()).collect();
    assert_eq!(claims.len(), 5);
    for (claim, id) in claims.iter().zip(&ids) {
        assert_eq!(claim.job_id(), id);
    }
    let counts = queue.counts();
    assert_eq!(counts.active, 5);
    assert_eq!(counts.pending, 2);

    // Releasing one slot admits the oldest pending job.
    let mut claims = claims.into_iter();
    let first = claims.next().unwrap();
    queue.finish(first, JobOutcome::Completed).unwrap();
    let next = queue.try_claim().unwrap();
    assert_eq!(next.job_id(), &ids[5]);
    assert!(queue.try_claim().is_none());
}

#[test]
fn cancel_pending_job_never_sets_started() {
    let queue = JobQueue::new(1);
    let a = queue.submit(spec(0)).unwrap();
    let b = queue.submit(spec(1)).unwrap();

    assert_eq!(queue.cancel(&b).unwrap(), CancelOutcome::Cancelled);
    let rec = queue.status(&b).unwrap();
    assert_eq!(rec.state, JobState::Cancelled);
    assert!(rec.started.is_none());
    assert!(rec.finished.is_some());

    // The cancelled job is skipped by dispatch.
    let claim = queue.try_claim().unwrap();
    assert_eq!(claim.job_id(), &a);
    queue.finish(claim, JobOutcome::Completed).unwrap();
    assert!(queue.try_claim().is_none());
}

#[test]
fn cancel_active_job_signals_its_owner() {
    let queue = JobQueue::new(2);
    let id = queue.submit(spec(0)).unwrap();
    let claim = queue.try_claim().unwrap();
    assert!(!claim.is_cancelled());

    assert_eq!(queue.cancel(&id).unwrap(), CancelOutcome::Requested);
    assert!(claim.is_cancelled());
    // State only changes once the worker observes the signal.
    assert_eq!(queue.status(&id).unwrap().state, JobState::Active);

    let rec = queue.finish(claim, JobOutcome::Cancelled).unwrap();
    assert_eq!(rec.state, JobState::Cancelled);
    assert!(rec.started.is_some());
}

#[test]
fn cancel_terminal_is_a_noop_and_unknown_is_not_found() {
    let queue = JobQueue::new(1);
    let id = queue.submit(spec(0)).unwrap();
    let claim = queue.try_claim().unwrap();
    queue.finish(claim, JobOutcome::Completed).unwrap();

    assert_eq!(queue.cancel(&id).unwrap(), CancelOutcome::AlreadyTerminal);
    assert_eq!(queue.status(&id).unwrap().state, JobState::Completed);

    let missing = JobId::from("dl_missing");
    assert_eq!(
        queue.cancel(&missing),
        Err(QueueError::NotFound(missing.clone()))
    );
    assert!(queue.status(&missing).is_err());
}

#[test]
fn progress_is_monotonic_and_reserved_100_for_completion() {
    let queue = JobQueue::new(1);
    let id = queue.submit(spec(0)).unwrap();
    let claim = queue.try_claim().unwrap();

    assert_eq!(queue.record_progress(&claim, 10), Some(10));
    assert_eq!(queue.record_progress(&claim, 5), None);
    assert_eq!(queue.record_progress(&claim, 10), None);
    assert_eq!(queue.record_progress(&claim, 100), Some(99));
    assert_eq!(queue.status(&id).unwrap().progress, 99);

    let rec = queue.finish(claim, JobOutcome::Completed).unwrap();
    assert_eq!(rec.progress, 100);
}

#[test]
fn failed_job_keeps_error_and_frozen_progress() {
    let queue = JobQueue::new(1);
    let id = queue.submit(spec(0)).unwrap();
    let claim = queue.try_claim().unwrap();
    queue.record_progress(&claim, 42);

    let err = JobError::retrieval("HTTP Error 403: Forbidden");
    queue.finish(claim, JobOutcome::Failed(err)).unwrap();

    let rec = queue.status(&id).unwrap();
    assert_eq!(rec.state, JobState::Failed);
    assert_eq!(rec.progress, 42);
    let err = rec.error.unwrap();
    assert_eq!(err.kind, JobErrorKind::RetrievalError);
    assert_eq!(err.message, "HTTP Error 403: Forbidden");
}

#[test]
fn batch_validates_items_independently() {
    let queue = JobQueue::new(5);
    let batch = queue.submit_batch(vec![
        JobSpec::new("bad-url", "mp4", "720p"),
        JobSpec::new("http://good.example/x", "mp4", "720p"),
    ]);
    assert_eq!(batch.results.len(), 2);
    assert!(matches!(batch.results[0], Err(SubmitError::InvalidUrl { .. })));
    let ids = batch.job_ids();
    assert_eq!(ids.len(), 1);

    let rec = queue.status(&ids[0]).unwrap();
    assert_eq!(rec.spec.batch_id.as_ref(), Some(&batch.batch_id));
    assert_eq!(rec.state, JobState::Pending);
}

#[test]
fn batch_siblings_interleave_with_other_jobs_in_submission_order() {
    let queue = JobQueue::new(10);
    let solo = queue.submit(spec(0)).unwrap();
    let batch = queue.submit_batch(vec![spec(1), spec(2)]);
    let later = queue.submit(spec(3)).unwrap();

    let order: Vec<JobId> = std::iter::from_fn(|| queue.try_claim())
        .map(|c| c.job_id().clone())
        .collect();
    let mut expected = vec![solo];
    expected.extend(batch.job_ids());
    expected.push(later);
    assert_eq!(order, expected);
}

#[test]
fn clear_terminal_removes_only_terminal_records() {
    let queue = JobQueue::new(1);
    let done = queue.submit(spec(0)).unwrap();
    let cancelled = queue.submit(spec(1)).unwrap();
    let claim = queue.try_claim().unwrap();
    queue.finish(claim, JobOutcome::Completed).unwrap();
    queue.cancel(&cancelled).unwrap();

    let active = queue.submit(spec(2)).unwrap();
    let _claim = queue.try_claim().unwrap();
    let pending = queue.submit(spec(3)).unwrap();

    assert_eq!(queue.clear_terminal(), 2);
    assert!(queue.status(&done).is_err());
    assert!(queue.status(&cancelled).is_err());
    assert_eq!(queue.status(&active).unwrap().state, JobState::Active);
    assert_eq!(queue.status(&pending).unwrap().state, JobState::Pending);
}

#[test]
fn list_filters_by_state_in_submission_order() {
    let queue = JobQueue::new(1);
    let a = queue.submit(spec(0)).unwrap();
    let b = queue.submit(spec(1)).unwrap();
    let c = queue.submit(spec(2)).unwrap();
    let _claim = queue.try_claim().unwrap();

    let pending: Vec<JobId> = queue
        .list(Some(JobState::Pending))
        .into_iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(pending, vec![b.clone(), c.clone()]);
    let all: Vec<JobId> = queue.list(None).into_iter().map(|r| r.id).collect();
    assert_eq!(all, vec![a, b, c]);
}

#[test]
fn closed_queue_refuses_submissions_and_cancels_active() {
    let queue = JobQueue::new(2);
    queue.submit(spec(0)).unwrap();
    let claim = queue.try_claim().unwrap();

    queue.close();
    assert!(claim.is_cancelled());
    assert_eq!(queue.submit(spec(1)), Err(SubmitError::ShuttingDown));
    assert!(queue.try_claim().is_none());
}

#[tokio::test]
async fn claim_next_wakes_on_submission() {
    let queue = Arc::new(JobQueue::new(1));
    let waiter = {
        let queue = Arc::clone(&queue);
        tokio::spawn(async move { queue.claim_next().await.map(|c| c.job_id().clone()) })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    let id = queue.submit(spec(0)).unwrap();

    let claimed = tokio::time::timeout(Duration::from_secs(2), waiter)
        .await
        .expect("waiter woke up")
        .unwrap();
    assert_eq!(claimed, Some(id));
}

#[tokio::test]
async fn claim_next_returns_none_after_close() {
    let queue = Arc::new(JobQueue::new(1));
    let waiter = {
        let queue = Arc::clone(&queue);
        tokio::spawn(async move { queue.claim_next().await.is_none() })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    queue.close();
    let stopped = tokio::time::timeout(Duration::from_secs(2), waiter)
        .await
        .expect("waiter woke up")
        .unwrap();
    assert!(stopped);
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Work queue shared between submitters and the scheduler
//!
//! Holds every job the scheduler knows about in one of three places:
//! - `pending`: FIFO of submitted jobs not yet assigned to a worker
//! - `in_flight`: jobs assigned to a worker, in dispatch order
//! - `completed`: terminal jobs, bounded; the oldest is evicted when full
//!
//! All three live behind a single mutex, so a snapshot never misses a job
//! that is halfway through assignment. A `watch` flag mirrors "pending is
//! non-empty" so the scheduler can sleep instead of polling.

use crate::id::{JobId, WorkerId};
use crate::job::{Job, JobError, JobStatus, JobSummary};
use std::collections::{HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;
use tokio::sync::watch;

/// Default number of finished jobs retained for status queries
pub const DEFAULT_COMPLETED_CAPACITY: usize = 1000;

/// Errors returned by queue operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error("unknown job: {0}")]
    UnknownJob(JobId),
    #[error("job {0} already exists")]
    DuplicateId(JobId),
    #[error("job {0} must be waiting to be submitted")]
    NotWaiting(JobId),
    #[error(transparent)]
    Transition(#[from] JobError),
}

#[derive(Debug, Default)]
struct QueueState {
    pending: VecDeque<Job>,
    in_flight: Vec<Job>,
    completed: VecDeque<Job>,
    ids: HashSet<JobId>,
    evicted: u64,
}

impl QueueState {
    fn in_flight_mut(&mut self, id: &JobId) -> Result<&mut Job, QueueError> {
        self.in_flight
            .iter_mut()
            .find(|j| &j.id == id)
            .ok_or_else(|| QueueError::UnknownJob(id.clone()))
    }

    fn take_in_flight(&mut self, id: &JobId) -> Option<Job> {
        let pos = self.in_flight.iter().position(|j| &j.id == id)?;
        Some(self.in_flight.remove(pos))
    }

    fn take_pending(&mut self, id: &JobId) -> Option<Job> {
        let pos = self.pending.iter().position(|j| &j.id == id)?;
        self.pending.remove(pos)
    }

    fn push_completed(&mut self, job: Job, capacity: usize) {
        self.completed.push_back(job);
        while self.completed.len() > capacity {
            let Some(old) = self.completed.pop_front() else {
                break;
            };
            self.ids.remove(&old.id);
            self.evicted += 1;
            tracing::debug!(job_id = %old.id, "evicted finished job");
        }
    }
}

/// Thread-safe job queue
#[derive(Debug)]
pub struct WorkQueue {
    state: Mutex<QueueState>,
    completed_capacity: usize,
    non_empty: watch::Sender<bool>,
}

impl Default for WorkQueue {
    fn default() -> Self {
        Self::new(DEFAULT_COMPLETED_CAPACITY)
    }
}

impl WorkQueue {
    /// Create a queue retaining at most `completed_capacity` finished jobs
    pub fn new(completed_capacity: usize) -> Self {
        let (non_empty, _) = watch::channel(false);
        Self {
            state: Mutex::new(QueueState::default()),
            completed_capacity,
            non_empty,
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Append a waiting job to the tail of `pending` and raise the signal
    pub fn submit(&self, job: Job) -> Result<JobId, QueueError> {
        if job.status != JobStatus::Waiting {
            return Err(QueueError::NotWaiting(job.id));
        }

        let id = job.id.clone();
        let mut state = self.lock();
        if !state.ids.insert(id.clone()) {
            return Err(QueueError::DuplicateId(id));
        }
        tracing::debug!(job_id = %id, name = %job.name, "job submitted");
        state.pending.push_back(job);
        self.non_empty.send_replace(true);
        Ok(id)
    }

    /// Remove the head of `pending` and move it in flight
    pub fn dequeue(&self) -> Option<Job> {
        let mut state = self.lock();
        let job = state.pending.pop_front()?;
        state.in_flight.push(job.clone());
        Some(job)
    }

    /// Record that an in-flight job was handed to `worker`
    pub fn mark_running(&self, id: &JobId, worker: WorkerId) -> Result<(), QueueError> {
        let mut state = self.lock();
        let job = state.in_flight_mut(id)?;
        job.advance(JobStatus::Running)?;
        job.worker = Some(worker);
        Ok(())
    }

    /// Record that the worker finished with an in-flight job
    pub fn mark_verifying(&self, id: &JobId) -> Result<(), QueueError> {
        let mut state = self.lock();
        state.in_flight_mut(id)?.advance(JobStatus::Verifying)?;
        Ok(())
    }

    /// Promote a verifying job to `Complete` and move it to `completed`
    pub fn complete(&self, id: &JobId) -> Result<Job, QueueError> {
        self.finish(id, JobStatus::Complete)
    }

    /// Mark a pending or in-flight job as `Error` and move it to `completed`
    pub fn fail(&self, id: &JobId) -> Result<Job, QueueError> {
        self.finish(id, JobStatus::Error)
    }

    fn finish(&self, id: &JobId, status: JobStatus) -> Result<Job, QueueError> {
        let mut state = self.lock();

        // Validate before removal so a rejected transition leaves the job in place
        let current = state
            .in_flight
            .iter()
            .chain(state.pending.iter())
            .find(|j| &j.id == id)
            .map(|j| j.status)
            .ok_or_else(|| QueueError::UnknownJob(id.clone()))?;
        if !current.can_advance_to(status) {
            return Err(JobError::InvalidTransition {
                id: id.clone(),
                from: current,
                to: status,
            }
            .into());
        }

        let mut job = match state.take_in_flight(id) {
            Some(job) => job,
            None => state
                .take_pending(id)
                .ok_or_else(|| QueueError::UnknownJob(id.clone()))?,
        };
        job.advance(status)?;
        state.push_completed(job.clone(), self.completed_capacity);
        Ok(job)
    }

    /// Look up a job wherever it currently lives
    pub fn get(&self, id: &JobId) -> Option<Job> {
        let state = self.lock();
        state
            .completed
            .iter()
            .chain(state.in_flight.iter())
            .chain(state.pending.iter())
            .find(|j| &j.id == id)
            .cloned()
    }

    /// Completed jobs (oldest first), then in-flight, then pending (FIFO)
    pub fn snapshot(&self) -> Vec<Job> {
        let state = self.lock();
        state
            .completed
            .iter()
            .chain(state.in_flight.iter())
            .chain(state.pending.iter())
            .cloned()
            .collect()
    }

    /// Status lines in snapshot order
    pub fn summaries(&self) -> Vec<JobSummary> {
        let state = self.lock();
        state
            .completed
            .iter()
            .chain(state.in_flight.iter())
            .chain(state.pending.iter())
            .map(Job::summary)
            .collect()
    }

    pub fn pending_len(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn in_flight_len(&self) -> usize {
        self.lock().in_flight.len()
    }

    pub fn completed_len(&self) -> usize {
        self.lock().completed.len()
    }

    /// Number of finished jobs dropped to respect the capacity
    pub fn evicted(&self) -> u64 {
        self.lock().evicted
    }

    /// True when nothing is pending
    pub fn is_empty(&self) -> bool {
        self.lock().pending.is_empty()
    }

    /// Lower the non-empty signal, unless a submit raced in
    pub fn clear_signal(&self) {
        let state = self.lock();
        if state.pending.is_empty() {
            self.non_empty.send_replace(false);
        }
    }

    /// Whether the non-empty signal is currently raised
    pub fn is_signaled(&self) -> bool {
        *self.non_empty.borrow()
    }

    /// Resolve once the non-empty signal is raised
    pub async fn wait_non_empty(&self) {
        let mut rx = self.non_empty.subscribe();
        // The sender lives as long as `self`, so this cannot fail while borrowed
        let _ = rx.wait_for(|raised| *raised).await;
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Caller-facing handle to a running scheduler

use crate::error::SchedulerError;
use pj_core::{IdGen, Job, JobId, JobSpec, JobSummary, WorkQueue, WorkerSummary};
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Cheap to clone; every clone talks to the same scheduler
#[derive(Clone)]
pub struct SchedulerHandle<G> {
    queue: Arc<WorkQueue>,
    ids: G,
    workers: watch::Receiver<Vec<WorkerSummary>>,
    stop: CancellationToken,
}

impl<G: IdGen> SchedulerHandle<G> {
    pub(crate) fn new(
        queue: Arc<WorkQueue>,
        ids: G,
        workers: watch::Receiver<Vec<WorkerSummary>>,
        stop: CancellationToken,
    ) -> Self {
        Self {
            queue,
            ids,
            workers,
            stop,
        }
    }

    /// Queue a job; it starts `Waiting`
    pub fn submit(&self, spec: JobSpec) -> Result<JobId, SchedulerError> {
        if self.stop.is_cancelled() {
            return Err(SchedulerError::Stopped);
        }
        let job = Job::new(self.ids.next_job_id(), spec);
        Ok(self.queue.submit(job)?)
    }

    /// Every known job: completed, then in flight, then pending
    pub fn status(&self) -> Vec<JobSummary> {
        self.queue.summaries()
    }

    /// Full job records in the same order as [`SchedulerHandle::status`]
    pub fn jobs(&self) -> Vec<Job> {
        self.queue.snapshot()
    }

    pub fn job(&self, id: &JobId) -> Option<Job> {
        self.queue.get(id)
    }

    /// Worker list as of the end of the last cycle
    pub fn workers(&self) -> Vec<WorkerSummary> {
        self.workers.borrow().clone()
    }

    /// Ask the scheduler to shut down; returns immediately
    pub fn stop(&self) {
        self.stop.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.is_cancelled()
    }
}

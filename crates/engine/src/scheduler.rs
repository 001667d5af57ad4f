// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The scheduling loop
//!
//! Each cycle: health check, assignment, wait, reconciliation, publish.
//! The loop is the only writer of worker state; submitters only touch the
//! queue.

use crate::handle::SchedulerHandle;
use crate::worker::{SettleRules, Settlement, Worker};
use pj_adapters::ProcessAdapter;
use pj_core::{Config, IdGen, Job, JobStatus, Outcome, WorkQueue, WorkerId, WorkerSummary};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;

type Joined<P> = Result<(tokio::task::Id, Settlement<P>), JoinError>;

/// Owns the worker pool and drives jobs through it
pub struct Scheduler<A: ProcessAdapter> {
    adapter: A,
    config: Config,
    queue: Arc<WorkQueue>,
    rules: Arc<SettleRules>,
    workers: Vec<Worker<A::Process>>,
    tasks: JoinSet<Settlement<A::Process>>,
    dispatched: HashMap<tokio::task::Id, WorkerId>,
    stopping: JoinSet<()>,
    next_worker: u64,
    launch_failures: u32,
    stop: CancellationToken,
    cancel: CancellationToken,
    snapshot: watch::Sender<Vec<WorkerSummary>>,
}

impl<A: ProcessAdapter> Scheduler<A> {
    /// Build a scheduler and the handle used to talk to it
    pub fn new<G: IdGen>(adapter: A, config: Config, ids: G) -> (Self, SchedulerHandle<G>) {
        let queue = Arc::new(WorkQueue::new(config.scheduler.completed_capacity));
        let stop = CancellationToken::new();
        let (snapshot, workers_rx) = watch::channel(Vec::new());
        let handle = SchedulerHandle::new(Arc::clone(&queue), ids, workers_rx, stop.clone());

        let scheduler = Self {
            adapter,
            rules: Arc::new(SettleRules::from_config(&config)),
            config,
            queue,
            workers: Vec::new(),
            tasks: JoinSet::new(),
            dispatched: HashMap::new(),
            stopping: JoinSet::new(),
            next_worker: 1,
            launch_failures: 0,
            stop,
            cancel: CancellationToken::new(),
            snapshot,
        };
        (scheduler, handle)
    }

    pub fn queue(&self) -> &Arc<WorkQueue> {
        &self.queue
    }

    pub fn workers(&self) -> &[Worker<A::Process>] {
        &self.workers
    }

    /// Run cycles until stopped, then shut the pool down
    pub async fn run(mut self) {
        tracing::info!(
            max_workers = self.config.scheduler.max_workers,
            cycle_interval = ?self.config.scheduler.cycle_interval,
            "scheduler started"
        );
        while !self.stop.is_cancelled() {
            self.run_cycle().await;
        }
        self.shutdown().await;
    }

    pub async fn run_cycle(&mut self) {
        self.health_check();
        let queue_idle = self.queue.is_empty();
        if queue_idle {
            self.queue.clear_signal();
        } else {
            self.assign().await;
        }
        self.wait(queue_idle).await;
        self.reconcile();
        self.publish();
    }

    /// Drain idle workers' output and drop the ones whose process is gone
    pub fn health_check(&mut self) {
        for worker in self.workers.iter_mut().filter(|w| w.is_idle()) {
            worker.drain_output();
            worker.check_alive();
        }
        self.remove_retired();
    }

    /// Hand pending jobs to idle workers, head first
    pub async fn assign(&mut self) {
        let mut dispatched = 0;
        while dispatched < self.config.scheduler.max_dispatches_per_cycle
            && !self.queue.is_empty()
            && !self.stop.is_cancelled()
        {
            let Some(index) = self.idle_worker().await else {
                break;
            };
            let Some(job) = self.queue.dequeue() else {
                break;
            };
            self.dispatch(index, job);
            dispatched += 1;
        }
    }

    /// Index of the first idle worker, launching one if the pool has room
    async fn idle_worker(&mut self) -> Option<usize> {
        if let Some(index) = self.workers.iter().position(|w| w.is_idle()) {
            return Some(index);
        }
        if self.workers.len() >= self.config.scheduler.max_workers {
            return None;
        }

        let id = WorkerId(self.next_worker);
        self.next_worker += 1;
        match Worker::launch(&self.adapter, id, self.config.worker.log_capacity).await {
            Ok(worker) => {
                tracing::info!(worker_id = %id, pool = self.workers.len() + 1, "worker launched");
                self.launch_failures = 0;
                self.workers.push(worker);
                Some(self.workers.len() - 1)
            }
            Err(e) => {
                self.launch_failures += 1;
                tracing::error!(
                    worker_id = %id,
                    failures = self.launch_failures,
                    error = %e,
                    "worker launch failed"
                );
                if self.workers.is_empty()
                    && self.launch_failures >= self.config.scheduler.launch_retry_limit
                {
                    self.fail_head();
                    self.launch_failures = 0;
                }
                None
            }
        }
    }

    /// No worker can be launched; fail the head job so the queue keeps moving
    fn fail_head(&mut self) {
        let Some(job) = self.queue.dequeue() else {
            return;
        };
        tracing::error!(job_id = %job.id, "no worker could be launched, failing job");
        if let Err(e) = self.queue.fail(&job.id) {
            tracing::error!(job_id = %job.id, error = %e, "failed to record job error");
        }
    }

    fn dispatch(&mut self, index: usize, job: Job) {
        let Some(worker) = self.workers.get_mut(index) else {
            return;
        };
        let worker_id = worker.id();

        if let Err(e) = self.queue.mark_running(&job.id, worker_id) {
            tracing::error!(job_id = %job.id, error = %e, "failed to mark job running");
            let _ = self.queue.fail(&job.id);
            return;
        }

        match worker.dispatch(&job, &self.rules, self.cancel.clone(), &mut self.tasks) {
            Ok(task) => {
                tracing::info!(job_id = %job.id, name = %job.name, %worker_id, "job dispatched");
                self.dispatched.insert(task, worker_id);
            }
            Err(e) => {
                tracing::error!(job_id = %job.id, %worker_id, error = %e, "dispatch failed");
                worker.retire();
                if let Err(e) = self.queue.fail(&job.id) {
                    tracing::error!(job_id = %job.id, error = %e, "failed to record job error");
                }
                self.remove_retired();
            }
        }
    }

    /// Sleep for one interval, returning early when a dispatch settles, work
    /// arrives on an idle queue, or a stop is requested
    pub async fn wait(&mut self, queue_idle: bool) {
        let interval = self.config.scheduler.cycle_interval;
        let joined = tokio::select! {
            _ = tokio::time::sleep(interval) => None,
            _ = self.stop.cancelled() => None,
            Some(joined) = self.tasks.join_next_with_id(), if !self.tasks.is_empty() => Some(joined),
            _ = self.queue.wait_non_empty(), if queue_idle => None,
        };
        if let Some(joined) = joined {
            self.on_settled(joined);
        }
    }

    fn on_settled(&mut self, joined: Joined<A::Process>) {
        match joined {
            Ok((task, settlement)) => {
                self.dispatched.remove(&task);
                let job = settlement.job.clone();
                let Some(worker) = self.workers.iter_mut().find(|w| w.id() == settlement.worker)
                else {
                    tracing::error!(job_id = %job, worker_id = %settlement.worker, "settled job has no worker");
                    let _ = self.queue.fail(&job);
                    return;
                };
                if let Err(e) = worker.finish(settlement) {
                    tracing::error!(job_id = %job, error = %e, "could not settle job");
                    worker.retire();
                    let _ = self.queue.fail(&job);
                    return;
                }
                if let Err(e) = self.queue.mark_verifying(&job) {
                    tracing::error!(job_id = %job, error = %e, "failed to mark job verifying");
                }
            }
            Err(e) => {
                let Some(worker_id) = self.dispatched.remove(&e.id()) else {
                    tracing::error!(error = %e, "unknown settle task failed");
                    return;
                };
                tracing::error!(%worker_id, error = %e, "settle task failed");
                if let Some(job) = self
                    .workers
                    .iter_mut()
                    .find(|w| w.id() == worker_id)
                    .and_then(|w| w.retire())
                {
                    let _ = self.queue.fail(&job);
                }
            }
        }
    }

    /// Promote every settled job and free or drop its worker
    pub fn reconcile(&mut self) {
        while let Some(joined) = self.tasks.try_join_next_with_id() {
            self.on_settled(joined);
        }

        for worker in self.workers.iter_mut().filter(|w| w.is_settled()) {
            let (job, outcome) = match worker.release() {
                Ok(released) => released,
                Err(e) => {
                    tracing::error!(worker_id = %worker.id(), error = %e, "release failed");
                    continue;
                }
            };
            let result = match &outcome {
                Outcome::Succeeded => self.queue.complete(&job),
                Outcome::Failed { reason, retire } => {
                    tracing::warn!(job_id = %job, worker_id = %worker.id(), %reason, retire, "job failed");
                    self.queue.fail(&job)
                }
            };
            match result {
                Ok(done) if done.status == JobStatus::Complete => {
                    tracing::info!(job_id = %job, worker_id = %worker.id(), "job complete");
                }
                Ok(_) => {}
                Err(e) => tracing::error!(job_id = %job, error = %e, "reconcile failed"),
            }
        }
        self.remove_retired();
    }

    /// Stop and drop retired workers in the background
    fn remove_retired(&mut self) {
        while self.stopping.try_join_next().is_some() {}
        if !self.workers.iter().any(|w| w.is_retired()) {
            return;
        }
        let (retired, kept): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.workers).into_iter().partition(|w| w.is_retired());
        self.workers = kept;
        for worker in retired {
            tracing::info!(worker_id = %worker.id(), jobs_run = worker.jobs_run(), "worker retired");
            self.stop_in_background(worker);
        }
    }

    fn stop_in_background(&mut self, mut worker: Worker<A::Process>) {
        let exit_command = self.config.worker.exit_command.clone();
        let timeout = self.config.worker.stop_timeout;
        self.stopping.spawn(async move {
            worker.stop(&exit_command, timeout).await;
        });
    }

    /// Send the current worker list to status readers
    pub fn publish(&self) {
        let summaries = self.workers.iter().map(Worker::summary).collect();
        self.snapshot.send_replace(summaries);
    }

    /// Let running jobs finish within the grace period, cancel the rest,
    /// then stop every worker
    pub async fn shutdown(&mut self) {
        let grace = self.config.scheduler.shutdown_grace;
        tracing::info!(
            in_flight = self.tasks.len(),
            pending = self.queue.pending_len(),
            ?grace,
            "scheduler stopping"
        );

        self.settle_within(grace).await;
        if !self.tasks.is_empty() {
            tracing::warn!(remaining = self.tasks.len(), "grace period over, cancelling jobs");
            self.cancel.cancel();
            while let Some(joined) = self.tasks.join_next_with_id().await {
                self.on_settled(joined);
            }
        }
        self.reconcile();

        for mut worker in std::mem::take(&mut self.workers) {
            worker.retire();
            self.stop_in_background(worker);
        }
        while self.stopping.join_next().await.is_some() {}
        self.publish();
        tracing::info!("scheduler stopped");
    }

    async fn settle_within(&mut self, grace: Duration) {
        let deadline = tokio::time::sleep(grace);
        tokio::pin!(deadline);
        loop {
            let joined = tokio::select! {
                _ = &mut deadline => return,
                joined = self.tasks.join_next_with_id() => joined,
            };
            match joined {
                Some(joined) => self.on_settled(joined),
                None => return,
            }
        }
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A pool worker: one external process running one job at a time
//!
//! The worker owns its process for its whole life. While a job runs, the
//! process is lent to a settle task and handed back with the outcome.

use crate::error::WorkerError;
use pj_adapters::{OutputLine, ProcessAdapter, Stream, WorkerProcess};
use pj_core::{Config, Job, JobId, Outcome, WorkerId, WorkerPhase, WorkerState, WorkerSummary};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Lines of log included in a worker summary
pub const SUMMARY_LOG_TAIL: usize = 10;

/// How a dispatched job is fed to a worker and how its end is recognized
#[derive(Debug, Clone)]
pub struct SettleRules {
    pub done_marker: String,
    pub error_markers: Vec<String>,
    pub trailer: Option<String>,
    pub timeout: Duration,
    /// Cap on lines carried back from one job
    pub max_lines: usize,
}

impl SettleRules {
    pub fn from_config(config: &Config) -> Self {
        Self {
            done_marker: config.worker.done_marker.clone(),
            error_markers: config.worker.error_markers.clone(),
            trailer: config.worker.trailer.clone(),
            timeout: config.scheduler.job_timeout,
            max_lines: config.worker.log_capacity,
        }
    }

    /// Text written to stdin for `payload`
    pub fn compose(&self, payload: &str) -> String {
        let payload = payload.trim_end_matches(['\r', '\n']);
        match &self.trailer {
            Some(trailer) => format!("{}\n{}", payload, trailer),
            None => payload.to_string(),
        }
    }

    /// Outcome signalled by an output line, if any
    pub fn classify(&self, line: &str) -> Option<Outcome> {
        if let Some(marker) = self.error_markers.iter().find(|m| line.contains(m.as_str())) {
            tracing::debug!(marker = %marker, "error marker seen");
            return Some(Outcome::failed(line.trim()));
        }
        if line.contains(&self.done_marker) {
            return Some(Outcome::Succeeded);
        }
        None
    }
}

/// What a settle task hands back to the scheduler
pub struct Settlement<P> {
    pub worker: WorkerId,
    pub job: JobId,
    pub process: P,
    pub outcome: Outcome,
    pub lines: Vec<OutputLine>,
}

/// One pool member
pub struct Worker<P> {
    id: WorkerId,
    process: Option<P>,
    pid: Option<u32>,
    state: WorkerState,
    log: VecDeque<String>,
    log_capacity: usize,
    jobs_run: u64,
}

impl<P: WorkerProcess> Worker<P> {
    /// Launch the worker's process; starts `Idle`
    pub async fn launch<A>(adapter: &A, id: WorkerId, log_capacity: usize) -> Result<Self, WorkerError>
    where
        A: ProcessAdapter<Process = P>,
    {
        let process = adapter
            .launch(&id.to_string())
            .await
            .map_err(|source| WorkerError::Launch { id, source })?;
        Ok(Self::with_process(id, process, log_capacity))
    }

    pub fn with_process(id: WorkerId, process: P, log_capacity: usize) -> Self {
        Self {
            id,
            pid: process.pid(),
            process: Some(process),
            state: WorkerState::Idle,
            log: VecDeque::new(),
            log_capacity: log_capacity.max(1),
            jobs_run: 0,
        }
    }

    pub fn id(&self) -> WorkerId {
        self.id
    }

    pub fn state(&self) -> &WorkerState {
        &self.state
    }

    pub fn phase(&self) -> WorkerPhase {
        self.state.phase()
    }

    pub fn is_idle(&self) -> bool {
        self.state.is_idle()
    }

    pub fn is_retired(&self) -> bool {
        self.state.is_retired()
    }

    pub fn is_settled(&self) -> bool {
        self.phase() == WorkerPhase::Settled
    }

    pub fn job(&self) -> Option<&JobId> {
        self.state.job()
    }

    pub fn jobs_run(&self) -> u64 {
        self.jobs_run
    }

    /// Captured output, oldest first
    pub fn log(&self) -> impl Iterator<Item = &str> {
        self.log.iter().map(String::as_str)
    }

    fn record(&mut self, line: OutputLine) {
        let text = match line.stream {
            Stream::Stdout => line.text,
            Stream::Stderr => format!("stderr: {}", line.text),
        };
        if self.log.len() >= self.log_capacity {
            self.log.pop_front();
        }
        self.log.push_back(text);
    }

    /// Start `job` on this worker's process
    ///
    /// The process moves into a settle task on `tasks`; the worker is
    /// `Settling` until [`Worker::finish`] hands it back.
    pub fn dispatch(
        &mut self,
        job: &Job,
        rules: &Arc<SettleRules>,
        cancel: CancellationToken,
        tasks: &mut JoinSet<Settlement<P>>,
    ) -> Result<tokio::task::Id, WorkerError> {
        if self.process.is_none() {
            return Err(WorkerError::NoProcess(self.id));
        }
        // Leftovers from the previous job must not settle this one
        self.drain_output();
        self.state.begin_dispatch(job.id.clone())?;
        let Some(process) = self.process.take() else {
            return Err(WorkerError::NoProcess(self.id));
        };

        let worker = self.id;
        let job_id = job.id.clone();
        let payload = rules.compose(&job.payload);
        let rules = Arc::clone(rules);
        let handle = tasks.spawn(async move {
            let (process, outcome, lines) = settle(process, &payload, &rules, cancel).await;
            Settlement {
                worker,
                job: job_id,
                process,
                outcome,
                lines,
            }
        });
        self.state.begin_settle()?;
        Ok(handle.id())
    }

    /// Take back the process from a finished settle task; the worker becomes `Settled`
    pub fn finish(&mut self, settlement: Settlement<P>) -> Result<(), WorkerError> {
        if self.state.job() != Some(&settlement.job) {
            return Err(WorkerError::Mismatch {
                worker: self.id,
                job: settlement.job,
            });
        }
        self.process = Some(settlement.process);
        for line in settlement.lines {
            self.record(line);
        }
        self.jobs_run += 1;
        self.state.settle(settlement.outcome)?;
        Ok(())
    }

    /// Detach the settled job; the worker goes back to `Idle` or retires
    pub fn release(&mut self) -> Result<(JobId, Outcome), WorkerError> {
        Ok(self.state.release()?)
    }

    /// Take the worker out of service, handing back any attached job
    pub fn retire(&mut self) -> Option<JobId> {
        self.state.retire()
    }

    /// Move at most one buffered output line into the log
    pub fn pump_output(&mut self) -> bool {
        let Some(line) = self.process.as_mut().and_then(|p| p.try_next_line()) else {
            return false;
        };
        self.record(line);
        true
    }

    /// Pump until nothing is buffered; returns the number of lines taken
    pub fn drain_output(&mut self) -> usize {
        let mut count = 0;
        while self.pump_output() {
            count += 1;
        }
        count
    }

    /// Probe the process; an exited process retires the worker
    pub fn check_alive(&mut self) -> bool {
        let Some(process) = self.process.as_mut() else {
            if self.is_idle() {
                self.retire();
                return false;
            }
            // lent to a settle task
            return !self.is_retired();
        };
        let exited = match process.try_exit() {
            Ok(None) => return true,
            Ok(Some(exit)) => exit.to_string(),
            Err(e) => e.to_string(),
        };
        tracing::warn!(worker_id = %self.id, %exited, "worker process is gone");
        self.record(OutputLine::stderr(format!("process exited: {}", exited)));
        self.retire();
        false
    }

    /// Ask the process to exit, then kill it after `timeout`
    pub async fn stop(&mut self, exit_command: &str, timeout: Duration) {
        self.retire();
        let Some(mut process) = self.process.take() else {
            return;
        };

        if let Err(e) = process.send(exit_command).await {
            tracing::debug!(worker_id = %self.id, error = %e, "exit request not delivered");
        }
        match tokio::time::timeout(timeout, process.wait_exit()).await {
            Ok(Ok(exit)) => {
                tracing::info!(worker_id = %self.id, %exit, "worker stopped");
            }
            Ok(Err(e)) => {
                tracing::warn!(worker_id = %self.id, error = %e, "wait failed, killing worker");
                kill(self.id, &mut process).await;
            }
            Err(_) => {
                tracing::warn!(worker_id = %self.id, ?timeout, "worker ignored exit, killing");
                kill(self.id, &mut process).await;
            }
        }
        while let Some(line) = process.try_next_line() {
            self.record(line);
        }
    }

    pub fn summary(&self) -> WorkerSummary {
        let skip = self.log.len().saturating_sub(SUMMARY_LOG_TAIL);
        WorkerSummary {
            id: self.id,
            phase: self.phase(),
            job: self.job().cloned(),
            pid: self.pid,
            jobs_run: self.jobs_run,
            log_tail: self.log.iter().skip(skip).cloned().collect(),
        }
    }
}

async fn kill<P: WorkerProcess>(id: WorkerId, process: &mut P) {
    if let Err(e) = process.kill().await {
        tracing::error!(worker_id = %id, error = %e, "kill failed");
    }
}

/// Feed one job to `process` and wait for it to end
async fn settle<P: WorkerProcess>(
    mut process: P,
    payload: &str,
    rules: &SettleRules,
    cancel: CancellationToken,
) -> (P, Outcome, Vec<OutputLine>) {
    let mut lines: VecDeque<OutputLine> = VecDeque::new();

    if let Err(e) = process.send(payload).await {
        let outcome = Outcome::fatal(format!("write failed: {}", e));
        return (process, outcome, Vec::new());
    }

    let deadline = tokio::time::sleep(rules.timeout);
    tokio::pin!(deadline);

    let outcome = loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break Outcome::fatal("cancelled"),
            _ = &mut deadline => {
                break Outcome::fatal(format!("timed out after {:?}", rules.timeout));
            }
            line = process.next_line() => {
                let Some(line) = line else {
                    let reason = match process.try_exit() {
                        Ok(Some(exit)) => format!("process exited ({})", exit),
                        _ => "process closed its output".to_string(),
                    };
                    break Outcome::fatal(reason);
                };
                let verdict = rules.classify(&line.text);
                if lines.len() >= rules.max_lines.max(1) {
                    lines.pop_front();
                }
                lines.push_back(line);
                if let Some(outcome) = verdict {
                    break outcome;
                }
            }
        }
    };

    (process, outcome, lines.into())
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;

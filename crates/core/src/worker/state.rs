// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker state machine
//!
//! ```text
//! Idle -> Dispatching -> Settling -> Settled -> Idle
//!   \          \            \          \
//!    +----------+------------+----------+--> Retired
//! ```
//!
//! A worker is idle only in `Idle`, and `Idle` is the only state without an
//! attached job. A settled job stays attached until the scheduler releases
//! it, so a worker can never be handed a second job before the first one is
//! reconciled.

use crate::id::{JobId, WorkerId};
use crate::job::JobStatus;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How a dispatched job ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    /// The worker printed the completion marker
    Succeeded,
    /// The job failed; `retire` is set when the process can no longer be trusted
    Failed { reason: String, retire: bool },
}

impl Outcome {
    pub fn failed(reason: impl Into<String>) -> Self {
        Outcome::Failed {
            reason: reason.into(),
            retire: false,
        }
    }

    /// A failure that also takes the worker out of the pool
    pub fn fatal(reason: impl Into<String>) -> Self {
        Outcome::Failed {
            reason: reason.into(),
            retire: true,
        }
    }

    /// Terminal status the job gets on reconciliation
    pub fn job_status(&self) -> JobStatus {
        match self {
            Outcome::Succeeded => JobStatus::Complete,
            Outcome::Failed { .. } => JobStatus::Error,
        }
    }

    pub fn retires_worker(&self) -> bool {
        matches!(self, Outcome::Failed { retire: true, .. })
    }
}

/// Coarse worker status for reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkerPhase {
    Idle,
    Dispatching,
    Settling,
    Settled,
    Retired,
}

impl std::fmt::Display for WorkerPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            WorkerPhase::Idle => "idle",
            WorkerPhase::Dispatching => "dispatching",
            WorkerPhase::Settling => "settling",
            WorkerPhase::Settled => "settled",
            WorkerPhase::Retired => "retired",
        };
        f.write_str(s)
    }
}

/// Rejected state change
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("cannot {action} while {phase}")]
    Illegal {
        action: &'static str,
        phase: WorkerPhase,
    },
}

/// Where a worker is in the dispatch cycle
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum WorkerState {
    #[default]
    Idle,
    Dispatching {
        job: JobId,
    },
    Settling {
        job: JobId,
    },
    Settled {
        job: JobId,
        outcome: Outcome,
    },
    Retired,
}

impl WorkerState {
    pub fn phase(&self) -> WorkerPhase {
        match self {
            WorkerState::Idle => WorkerPhase::Idle,
            WorkerState::Dispatching { .. } => WorkerPhase::Dispatching,
            WorkerState::Settling { .. } => WorkerPhase::Settling,
            WorkerState::Settled { .. } => WorkerPhase::Settled,
            WorkerState::Retired => WorkerPhase::Retired,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, WorkerState::Idle)
    }

    pub fn is_retired(&self) -> bool {
        matches!(self, WorkerState::Retired)
    }

    /// The attached job, if any
    pub fn job(&self) -> Option<&JobId> {
        match self {
            WorkerState::Dispatching { job }
            | WorkerState::Settling { job }
            | WorkerState::Settled { job, .. } => Some(job),
            WorkerState::Idle | WorkerState::Retired => None,
        }
    }

    fn illegal(&self, action: &'static str) -> StateError {
        StateError::Illegal {
            action,
            phase: self.phase(),
        }
    }

    /// Idle -> Dispatching
    pub fn begin_dispatch(&mut self, job: JobId) -> Result<(), StateError> {
        if !self.is_idle() {
            return Err(self.illegal("dispatch"));
        }
        *self = WorkerState::Dispatching { job };
        Ok(())
    }

    /// Dispatching -> Settling
    pub fn begin_settle(&mut self) -> Result<(), StateError> {
        match std::mem::take(self) {
            WorkerState::Dispatching { job } => {
                *self = WorkerState::Settling { job };
                Ok(())
            }
            other => {
                *self = other;
                Err(self.illegal("settle"))
            }
        }
    }

    /// Settling -> Settled
    pub fn settle(&mut self, outcome: Outcome) -> Result<(), StateError> {
        match std::mem::take(self) {
            WorkerState::Settling { job } => {
                *self = WorkerState::Settled { job, outcome };
                Ok(())
            }
            other => {
                *self = other;
                Err(self.illegal("record outcome"))
            }
        }
    }

    /// Settled -> Idle, or Retired when the outcome says the process is unusable
    pub fn release(&mut self) -> Result<(JobId, Outcome), StateError> {
        match std::mem::take(self) {
            WorkerState::Settled { job, outcome } => {
                if outcome.retires_worker() {
                    *self = WorkerState::Retired;
                }
                Ok((job, outcome))
            }
            other => {
                *self = other;
                Err(self.illegal("release"))
            }
        }
    }

    /// Any -> Retired, handing back the attached job
    pub fn retire(&mut self) -> Option<JobId> {
        match std::mem::replace(self, WorkerState::Retired) {
            WorkerState::Dispatching { job }
            | WorkerState::Settling { job }
            | WorkerState::Settled { job, .. } => Some(job),
            WorkerState::Idle | WorkerState::Retired => None,
        }
    }
}

/// Worker status line reported to callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerSummary {
    pub id: WorkerId,
    pub phase: WorkerPhase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job: Option<JobId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    pub jobs_run: u64,
    /// Most recent output lines, oldest first
    #[serde(default)]
    pub log_tail: Vec<String>,
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;

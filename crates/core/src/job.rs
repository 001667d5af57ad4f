// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job state machine
//!
//! A job is a unit of document-processing work handed to one worker process.
//! Its status only ever moves forward:
//!
//! ```text
//! Waiting -> Running -> Verifying -> Complete
//!    \          \           \
//!     +----------+-----------+----> Error
//! ```
//!
//! `Complete` is reachable only through `Verifying`. `Error` is terminal and
//! reachable from any non-terminal status.

use crate::id::{JobId, WorkerId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle status of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobStatus {
    /// Submitted, not yet assigned to a worker
    Waiting,
    /// Payload handed to a worker process
    Running,
    /// Worker reported completion, awaiting reconciliation
    Verifying,
    /// Reconciled successfully
    Complete,
    /// Failed at some point in its lifecycle
    Error,
}

impl JobStatus {
    /// Position in the lifecycle; terminal statuses share the last rank
    fn rank(self) -> u8 {
        match self {
            JobStatus::Waiting => 0,
            JobStatus::Running => 1,
            JobStatus::Verifying => 2,
            JobStatus::Complete | JobStatus::Error => 3,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Complete | JobStatus::Error)
    }

    /// Whether `self -> next` is a legal lifecycle step
    pub fn can_advance_to(self, next: JobStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            JobStatus::Error => true,
            JobStatus::Complete => self == JobStatus::Verifying,
            _ => next.rank() == self.rank() + 1,
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobStatus::Waiting => "waiting",
            JobStatus::Running => "running",
            JobStatus::Verifying => "verifying",
            JobStatus::Complete => "complete",
            JobStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// Errors raised by job status changes
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobError {
    #[error("job {id}: invalid transition {from} -> {to}")]
    InvalidTransition {
        id: JobId,
        from: JobStatus,
        to: JobStatus,
    },
}

/// What a caller submits: a display name and the opaque text fed to a worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSpec {
    pub name: String,
    pub payload: String,
}

impl JobSpec {
    pub fn new(name: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            payload: payload.into(),
        }
    }
}

/// A job and its lifecycle bookkeeping
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub name: String,
    pub payload: String,
    pub status: JobStatus,
    pub worker: Option<WorkerId>,
    pub submitted_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Create a new job in the Waiting state
    pub fn new(id: impl Into<JobId>, spec: JobSpec) -> Self {
        Self {
            id: id.into(),
            name: spec.name,
            payload: spec.payload,
            status: JobStatus::Waiting,
            worker: None,
            submitted_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }

    /// Move to `next`, stamping start/finish times along the way
    pub fn advance(&mut self, next: JobStatus) -> Result<(), JobError> {
        if !self.status.can_advance_to(next) {
            return Err(JobError::InvalidTransition {
                id: self.id.clone(),
                from: self.status,
                to: next,
            });
        }

        let now = Utc::now();
        if next == JobStatus::Running {
            self.started_at = Some(now);
        }
        if next.is_terminal() {
            self.finished_at = Some(now);
        }
        self.status = next;
        Ok(())
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn summary(&self) -> JobSummary {
        JobSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            status: self.status,
            worker: self.worker,
        }
    }
}

/// Status line reported to callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSummary {
    pub id: JobId,
    pub name: String,
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker: Option<WorkerId>,
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;

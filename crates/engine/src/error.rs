// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the engine

use pj_adapters::ProcessError;
use pj_core::{JobId, QueueError, StateError, WorkerId};
use thiserror::Error;

/// Errors from a single worker
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("{id} failed to launch: {source}")]
    Launch {
        id: WorkerId,
        #[source]
        source: ProcessError,
    },
    #[error("{0} has no process")]
    NoProcess(WorkerId),
    #[error("{worker} got a settlement for {job}, which it does not hold")]
    Mismatch { worker: WorkerId, job: JobId },
    #[error(transparent)]
    State(#[from] StateError),
}

/// Errors surfaced through the scheduler handle
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("scheduler is stopped")]
    Stopped,
    #[error(transparent)]
    Queue(#[from] QueueError),
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! pj-core: Core library for Pool Jobs (pj)
//!
//! This crate provides:
//! - The job lifecycle state machine
//! - The worker dispatch state machine
//! - The work queue shared by submitters and the scheduler
//! - Pool configuration

pub mod config;
pub mod id;
pub mod job;
pub mod queue;
pub mod worker;

pub use config::{Config, ConfigError, SchedulerConfig, WorkerConfig};
pub use id::{IdGen, JobId, SequentialIdGen, UuidIdGen, WorkerId};
pub use job::{Job, JobError, JobSpec, JobStatus, JobSummary};
pub use queue::{QueueError, WorkQueue};
pub use worker::{Outcome, StateError, WorkerPhase, WorkerState, WorkerSummary};

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Pool Jobs execution engine

mod error;
mod handle;
mod scheduler;
pub mod worker;

pub use error::{SchedulerError, WorkerError};
pub use handle::SchedulerHandle;
pub use scheduler::Scheduler;
pub use worker::{SettleRules, Settlement, Worker};

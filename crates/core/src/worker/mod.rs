// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker state machine

mod state;

pub use state::{Outcome, StateError, WorkerPhase, WorkerState, WorkerSummary};

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker process adapters
//!
//! A worker process is a long-lived console program that reads commands on
//! stdin and reports on stdout/stderr. Output from both streams is merged
//! into one ordered line feed per process.

mod console;

pub use console::{ConsoleAdapter, ConsoleProcess};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeProcess, FakeProcessAdapter, FakeProcessInfo, FakeReply, ProcessCall};

use async_trait::async_trait;
use thiserror::Error;

/// Errors from process operations
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("launch failed: {0}")]
    LaunchFailed(String),
    #[error("write failed: {0}")]
    WriteFailed(String),
    #[error("process has exited")]
    Exited,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Which stream a line came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

/// One line of worker output, without its line terminator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLine {
    pub stream: Stream,
    pub text: String,
}

impl OutputLine {
    pub fn stdout(text: impl Into<String>) -> Self {
        Self {
            stream: Stream::Stdout,
            text: text.into(),
        }
    }

    pub fn stderr(text: impl Into<String>) -> Self {
        Self {
            stream: Stream::Stderr,
            text: text.into(),
        }
    }
}

/// How a worker process ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitInfo {
    /// `None` when the process was terminated by a signal
    pub code: Option<i32>,
}

impl std::fmt::Display for ExitInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.code {
            Some(code) => write!(f, "exit code {}", code),
            None => f.write_str("terminated by signal"),
        }
    }
}

/// Starts worker processes
#[async_trait]
pub trait ProcessAdapter: Clone + Send + Sync + 'static {
    type Process: WorkerProcess;

    /// Launch a worker process; `name` only labels it in logs
    async fn launch(&self, name: &str) -> Result<Self::Process, ProcessError>;
}

/// A running worker process
#[async_trait]
pub trait WorkerProcess: Send + 'static {
    fn pid(&self) -> Option<u32>;

    /// Write `text` to stdin, newline-terminated, and flush
    async fn send(&mut self, text: &str) -> Result<(), ProcessError>;

    /// Next output line; `None` once every output stream has closed
    async fn next_line(&mut self) -> Option<OutputLine>;

    /// Next buffered output line without waiting
    fn try_next_line(&mut self) -> Option<OutputLine>;

    /// Exit info if the process has already exited
    fn try_exit(&mut self) -> Result<Option<ExitInfo>, ProcessError>;

    /// Wait for the process to exit
    async fn wait_exit(&mut self) -> Result<ExitInfo, ProcessError>;

    /// Kill the process and reap it
    async fn kill(&mut self) -> Result<(), ProcessError>;
}

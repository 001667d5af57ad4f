// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake process adapter for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{ExitInfo, OutputLine, ProcessAdapter, ProcessError, WorkerProcess};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch};

const FAKE_LINE_BUFFER: usize = 1024;

/// Recorded process call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessCall {
    Launch { name: String },
    Send { pid: u32, text: String },
    Kill { pid: u32 },
}

/// What a fake process does in response to a job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeReply {
    /// Print these stdout lines right away
    Lines(Vec<String>),
    /// Print these stdout lines after a delay
    Delayed { after: Duration, lines: Vec<String> },
    /// Print nothing
    Silent,
    /// Exit with the given code
    Exit(i32),
}

impl FakeReply {
    pub fn lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FakeReply::Lines(lines.into_iter().map(Into::into).collect())
    }

    pub fn delayed<I, S>(after: Duration, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FakeReply::Delayed {
            after,
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }
}

/// Fake process state
#[derive(Debug, Clone)]
pub struct FakeProcessInfo {
    pub name: String,
    pub sent: Vec<String>,
    pub alive: bool,
    pub exit: Option<ExitInfo>,
    pub killed: bool,
}

struct FakeProc {
    info: FakeProcessInfo,
    lines: Option<mpsc::Sender<OutputLine>>,
    exit: watch::Sender<Option<ExitInfo>>,
}

impl FakeProc {
    fn mark_exited(&mut self, exit: ExitInfo) {
        if self.info.alive {
            self.info.alive = false;
            self.info.exit = Some(exit);
            self.lines = None;
            self.exit.send_replace(Some(exit));
        }
    }
}

struct FakeState {
    processes: HashMap<u32, FakeProc>,
    calls: Vec<ProcessCall>,
    replies: VecDeque<FakeReply>,
    default_reply: FakeReply,
    exit_command: String,
    honor_exit: bool,
    launch_failures: u32,
    next_pid: u32,
}

impl Default for FakeState {
    fn default() -> Self {
        Self {
            processes: HashMap::new(),
            calls: Vec::new(),
            replies: VecDeque::new(),
            default_reply: FakeReply::lines(["PJ:DONE"]),
            exit_command: "exit".to_string(),
            honor_exit: true,
            launch_failures: 0,
            next_pid: 1000,
        }
    }
}

/// Fake process adapter for testing
///
/// Every non-exit `send` consumes one scripted reply, or the default reply
/// when the script is empty. Sending the exit command ends the process.
#[derive(Clone, Default)]
pub struct FakeProcessAdapter {
    state: Arc<Mutex<FakeState>>,
}

impl FakeProcessAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Get all recorded calls
    pub fn calls(&self) -> Vec<ProcessCall> {
        self.lock().calls.clone()
    }

    /// Queue replies for upcoming jobs, in order
    pub fn script(&self, replies: impl IntoIterator<Item = FakeReply>) {
        self.lock().replies.extend(replies);
    }

    /// Reply used once the script is exhausted
    pub fn set_default_reply(&self, reply: FakeReply) {
        self.lock().default_reply = reply;
    }

    /// Whether processes exit when sent the exit command
    pub fn set_honor_exit(&self, honor: bool) {
        self.lock().honor_exit = honor;
    }

    /// Make the next `count` launches fail
    pub fn fail_launches(&self, count: u32) {
        self.lock().launch_failures = count;
    }

    /// Pids of every launched process, in launch order
    pub fn pids(&self) -> Vec<u32> {
        let mut pids: Vec<u32> = self.lock().processes.keys().copied().collect();
        pids.sort_unstable();
        pids
    }

    pub fn launched(&self) -> usize {
        self.lock().processes.len()
    }

    /// Get a process by pid
    pub fn get_process(&self, pid: u32) -> Option<FakeProcessInfo> {
        self.lock().processes.get(&pid).map(|p| p.info.clone())
    }

    /// Print a stdout line from a process outside of any job
    pub fn emit(&self, pid: u32, text: &str) {
        if let Some(tx) = self.lock().processes.get(&pid).and_then(|p| p.lines.clone()) {
            let _ = tx.try_send(OutputLine::stdout(text));
        }
    }

    /// Mark a process as exited
    pub fn set_exited(&self, pid: u32, code: i32) {
        if let Some(process) = self.lock().processes.get_mut(&pid) {
            process.mark_exited(ExitInfo { code: Some(code) });
        }
    }
}

#[async_trait]
impl ProcessAdapter for FakeProcessAdapter {
    type Process = FakeProcess;

    async fn launch(&self, name: &str) -> Result<FakeProcess, ProcessError> {
        let mut state = self.lock();
        state.calls.push(ProcessCall::Launch {
            name: name.to_string(),
        });
        if state.launch_failures > 0 {
            state.launch_failures -= 1;
            return Err(ProcessError::LaunchFailed(format!(
                "{}: fake launch failure",
                name
            )));
        }

        let pid = state.next_pid;
        state.next_pid += 1;
        let (tx, lines) = mpsc::channel(FAKE_LINE_BUFFER);
        let (exit_tx, exit) = watch::channel(None);
        state.processes.insert(
            pid,
            FakeProc {
                info: FakeProcessInfo {
                    name: name.to_string(),
                    sent: Vec::new(),
                    alive: true,
                    exit: None,
                    killed: false,
                },
                lines: Some(tx),
                exit: exit_tx,
            },
        );

        Ok(FakeProcess {
            pid,
            state: Arc::clone(&self.state),
            lines,
            exit,
        })
    }
}

/// A process started by [`FakeProcessAdapter`]
pub struct FakeProcess {
    pid: u32,
    state: Arc<Mutex<FakeState>>,
    lines: mpsc::Receiver<OutputLine>,
    exit: watch::Receiver<Option<ExitInfo>>,
}

impl FakeProcess {
    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl WorkerProcess for FakeProcess {
    fn pid(&self) -> Option<u32> {
        Some(self.pid)
    }

    async fn send(&mut self, text: &str) -> Result<(), ProcessError> {
        let pid = self.pid;
        let mut state = self.lock();
        state.calls.push(ProcessCall::Send {
            pid,
            text: text.to_string(),
        });

        let is_exit = text.trim() == state.exit_command;
        let reply = if is_exit {
            None
        } else {
            Some(
                state
                    .replies
                    .pop_front()
                    .unwrap_or_else(|| state.default_reply.clone()),
            )
        };
        let honor_exit = state.honor_exit;

        let Some(process) = state.processes.get_mut(&pid) else {
            return Err(ProcessError::Exited);
        };
        if !process.info.alive {
            return Err(ProcessError::Exited);
        }
        process.info.sent.push(text.to_string());

        match reply {
            None if honor_exit => process.mark_exited(ExitInfo { code: Some(0) }),
            None => {}
            Some(FakeReply::Lines(lines)) => {
                if let Some(tx) = &process.lines {
                    for line in lines {
                        let _ = tx.try_send(OutputLine::stdout(line));
                    }
                }
            }
            Some(FakeReply::Delayed { after, lines }) => {
                if let Some(tx) = process.lines.clone() {
                    tokio::spawn(async move {
                        tokio::time::sleep(after).await;
                        for line in lines {
                            if tx.send(OutputLine::stdout(line)).await.is_err() {
                                break;
                            }
                        }
                    });
                }
            }
            Some(FakeReply::Silent) => {}
            Some(FakeReply::Exit(code)) => process.mark_exited(ExitInfo { code: Some(code) }),
        }
        Ok(())
    }

    async fn next_line(&mut self) -> Option<OutputLine> {
        self.lines.recv().await
    }

    fn try_next_line(&mut self) -> Option<OutputLine> {
        self.lines.try_recv().ok()
    }

    fn try_exit(&mut self) -> Result<Option<ExitInfo>, ProcessError> {
        Ok(*self.exit.borrow())
    }

    async fn wait_exit(&mut self) -> Result<ExitInfo, ProcessError> {
        let exit = self
            .exit
            .wait_for(Option::is_some)
            .await
            .map_err(|_| ProcessError::Exited)?;
        (*exit).ok_or(ProcessError::Exited)
    }

    async fn kill(&mut self) -> Result<(), ProcessError> {
        let pid = self.pid;
        let mut state = self.lock();
        state.calls.push(ProcessCall::Kill { pid });
        if let Some(process) = state.processes.get_mut(&pid) {
            process.info.killed = true;
            process.mark_exited(ExitInfo { code: None });
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;

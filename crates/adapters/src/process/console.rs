// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Console process adapter

use super::{ExitInfo, OutputLine, ProcessAdapter, ProcessError, Stream, WorkerProcess};
use async_trait::async_trait;
use pj_core::WorkerConfig;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::mpsc;

/// Launches the configured program with piped stdio
#[derive(Clone, Debug)]
pub struct ConsoleAdapter {
    config: Arc<WorkerConfig>,
}

impl ConsoleAdapter {
    pub fn new(config: WorkerConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}

#[async_trait]
impl ProcessAdapter for ConsoleAdapter {
    type Process = ConsoleProcess;

    async fn launch(&self, name: &str) -> Result<ConsoleProcess, ProcessError> {
        let config = &self.config;
        let mut cmd = Command::new(&config.program);
        cmd.args(&config.args)
            .envs(&config.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &config.cwd {
            cmd.current_dir(cwd);
        }

        let mut child = cmd.spawn().map_err(|e| {
            ProcessError::LaunchFailed(format!("{}: {}", config.program.display(), e))
        })?;

        let stdin = child.stdin.take();
        let (tx, lines) = mpsc::channel(config.line_buffer.max(1));
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(read_lines(stdout, Stream::Stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(read_lines(stderr, Stream::Stderr, tx));
        }

        tracing::debug!(name, pid = ?child.id(), "console process started");
        Ok(ConsoleProcess {
            child,
            stdin,
            lines,
        })
    }
}

/// Forward one stream into the shared line channel until EOF
async fn read_lines<R>(reader: R, stream: Stream, tx: mpsc::Sender<OutputLine>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let text = clean_line(&buf);
                if tx.send(OutputLine { stream, text }).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                tracing::warn!(?stream, error = %e, "output read failed");
                break;
            }
        }
    }
}

/// Decode a raw line, tolerating invalid UTF-8 and UTF-16LE console output
fn clean_line(raw: &[u8]) -> String {
    let text = String::from_utf8_lossy(raw);
    text.chars()
        .filter(|c| *c != '\0')
        .collect::<String>()
        .trim_end_matches(['\r', '\n'])
        .to_string()
}

/// A child process started by [`ConsoleAdapter`]
pub struct ConsoleProcess {
    child: Child,
    stdin: Option<ChildStdin>,
    lines: mpsc::Receiver<OutputLine>,
}

#[async_trait]
impl WorkerProcess for ConsoleProcess {
    fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    async fn send(&mut self, text: &str) -> Result<(), ProcessError> {
        let stdin = self.stdin.as_mut().ok_or(ProcessError::Exited)?;
        let mut data = text.to_string();
        if !data.ends_with('\n') {
            data.push('\n');
        }
        let result = async {
            stdin.write_all(data.as_bytes()).await?;
            stdin.flush().await
        }
        .await;
        result.map_err(|e| ProcessError::WriteFailed(e.to_string()))
    }

    async fn next_line(&mut self) -> Option<OutputLine> {
        self.lines.recv().await
    }

    fn try_next_line(&mut self) -> Option<OutputLine> {
        self.lines.try_recv().ok()
    }

    fn try_exit(&mut self) -> Result<Option<ExitInfo>, ProcessError> {
        let status = self.child.try_wait()?;
        Ok(status.map(|s| ExitInfo { code: s.code() }))
    }

    async fn wait_exit(&mut self) -> Result<ExitInfo, ProcessError> {
        // close stdin so programs waiting on input can finish
        self.stdin = None;
        let status = self.child.wait().await?;
        Ok(ExitInfo {
            code: status.code(),
        })
    }

    async fn kill(&mut self) -> Result<(), ProcessError> {
        self.stdin = None;
        match self.child.kill().await {
            Ok(()) => Ok(()),
            // already reaped
            Err(e) if e.kind() == std::io::ErrorKind::InvalidInput => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
#[path = "console_tests.rs"]
mod tests;

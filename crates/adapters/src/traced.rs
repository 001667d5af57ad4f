// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Traced adapter wrappers for consistent observability

use crate::process::{ExitInfo, OutputLine, ProcessAdapter, ProcessError, WorkerProcess};
use async_trait::async_trait;
use tracing::Instrument;

/// Wrapper that adds tracing to any ProcessAdapter
#[derive(Clone)]
pub struct TracedProcessAdapter<A> {
    inner: A,
}

impl<A> TracedProcessAdapter<A> {
    pub fn new(inner: A) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<A: ProcessAdapter> ProcessAdapter for TracedProcessAdapter<A> {
    type Process = TracedProcess<A::Process>;

    async fn launch(&self, name: &str) -> Result<Self::Process, ProcessError> {
        let span = tracing::info_span!("process.launch", name);
        async move {
            tracing::info!("starting");
            let start = std::time::Instant::now();
            let result = self.inner.launch(name).await;
            let elapsed_ms = start.elapsed().as_millis() as u64;

            match result {
                Ok(inner) => {
                    let pid = inner.pid();
                    tracing::info!(?pid, elapsed_ms, "process started");
                    Ok(TracedProcess {
                        inner,
                        name: name.to_string(),
                    })
                }
                Err(e) => {
                    tracing::error!(elapsed_ms, error = %e, "launch failed");
                    Err(e)
                }
            }
        }
        .instrument(span)
        .await
    }
}

/// Worker process wrapper that traces writes, exits and kills
pub struct TracedProcess<P> {
    inner: P,
    name: String,
}

#[async_trait]
impl<P: WorkerProcess> WorkerProcess for TracedProcess<P> {
    fn pid(&self) -> Option<u32> {
        self.inner.pid()
    }

    async fn send(&mut self, text: &str) -> Result<(), ProcessError> {
        let span = tracing::info_span!("process.send", name = %self.name, pid = ?self.inner.pid());
        async move {
            tracing::debug!(input_len = text.len(), "sending");
            let result = self.inner.send(text).await;
            match &result {
                Ok(()) => tracing::debug!("sent"),
                Err(e) => tracing::error!(error = %e, "send failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn next_line(&mut self) -> Option<OutputLine> {
        let line = self.inner.next_line().await;
        if let Some(line) = &line {
            tracing::trace!(name = %self.name, stream = ?line.stream, text = %line.text, "output");
        }
        line
    }

    fn try_next_line(&mut self) -> Option<OutputLine> {
        let line = self.inner.try_next_line();
        if let Some(line) = &line {
            tracing::trace!(name = %self.name, stream = ?line.stream, text = %line.text, "output");
        }
        line
    }

    fn try_exit(&mut self) -> Result<Option<ExitInfo>, ProcessError> {
        let result = self.inner.try_exit();
        if let Ok(Some(exit)) = &result {
            tracing::debug!(name = %self.name, %exit, "process has exited");
        }
        result
    }

    async fn wait_exit(&mut self) -> Result<ExitInfo, ProcessError> {
        let span = tracing::info_span!("process.wait", name = %self.name, pid = ?self.inner.pid());
        async move {
            let result = self.inner.wait_exit().await;
            match &result {
                Ok(exit) => tracing::info!(%exit, "process exited"),
                Err(e) => tracing::warn!(error = %e, "wait failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn kill(&mut self) -> Result<(), ProcessError> {
        let span = tracing::info_span!("process.kill", name = %self.name, pid = ?self.inner.pid());
        async move {
            tracing::info!("killing");
            let result = self.inner.kill().await;
            if let Err(e) = &result {
                tracing::error!(error = %e, "kill failed");
            }
            result
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
#[path = "traced_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pool configuration
//!
//! Loaded from a `pj.toml` file. Every field has a default, so an empty file
//! (or no file at all) yields a working pool of one `sh` worker that treats
//! each payload as shell input.
//!
//! ```toml
//! [worker]
//! program = "accoreconsole"
//! args = ["/s", "batch.scr"]
//! trailer = "(princ \"PJ:DONE\")"
//! stop_timeout = "10s"
//!
//! [scheduler]
//! cycle_interval = "5s"
//! job_timeout = "15m"
//! max_workers = 2
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub worker: WorkerConfig,
    pub scheduler: SchedulerConfig,
}

/// How worker processes are launched, fed and stopped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorkerConfig {
    /// Executable to launch for each worker
    pub program: PathBuf,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub cwd: Option<PathBuf>,
    /// Output line marking a job as finished
    pub done_marker: String,
    /// Output lines marking a job as failed
    pub error_markers: Vec<String>,
    /// Text written after every payload, typically a command that prints `done_marker`
    pub trailer: Option<String>,
    /// Line written to stdin to request a graceful exit
    pub exit_command: String,
    /// Capacity of the per-process output line channel
    pub line_buffer: usize,
    /// Lines kept in each worker's log
    pub log_capacity: usize,
    /// How long to wait for a graceful exit before killing
    #[serde(with = "humantime_serde")]
    pub stop_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("sh"),
            args: Vec::new(),
            env: BTreeMap::new(),
            cwd: None,
            done_marker: "PJ:DONE".to_string(),
            error_markers: vec!["PJ:ERROR".to_string()],
            trailer: Some("echo PJ:DONE".to_string()),
            exit_command: "exit".to_string(),
            line_buffer: 256,
            log_capacity: 500,
            stop_timeout: Duration::from_secs(5),
        }
    }
}

/// Scheduling policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchedulerConfig {
    /// Upper bound on the wait between cycles
    #[serde(with = "humantime_serde")]
    pub cycle_interval: Duration,
    /// A job still running after this long fails and its worker is retired
    #[serde(with = "humantime_serde")]
    pub job_timeout: Duration,
    /// Pool size limit; workers are launched on demand up to this
    pub max_workers: usize,
    /// Jobs handed out per cycle
    pub max_dispatches_per_cycle: usize,
    /// Finished jobs retained for status queries
    pub completed_capacity: usize,
    /// Consecutive launch failures with an empty pool before the head job is failed
    pub launch_retry_limit: u32,
    /// How long in-flight jobs may keep running after a stop request
    #[serde(with = "humantime_serde")]
    pub shutdown_grace: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            cycle_interval: Duration::from_secs(5),
            job_timeout: Duration::from_secs(600),
            max_workers: 1,
            max_dispatches_per_cycle: 1,
            completed_capacity: crate::queue::DEFAULT_COMPLETED_CAPACITY,
            launch_retry_limit: 3,
            shutdown_grace: Duration::from_secs(30),
        }
    }
}

impl Config {
    /// Parse and validate TOML text
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Load from a file if it exists, defaults otherwise
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));

        if self.worker.program.as_os_str().is_empty() {
            return invalid("worker.program must not be empty");
        }
        if self.worker.done_marker.is_empty() {
            return invalid("worker.done_marker must not be empty");
        }
        if self.worker.error_markers.iter().any(String::is_empty) {
            return invalid("worker.error_markers must not contain empty markers");
        }
        if self.worker.line_buffer == 0 {
            return invalid("worker.line_buffer must be at least 1");
        }
        if self.scheduler.max_workers == 0 {
            return invalid("scheduler.max_workers must be at least 1");
        }
        if self.scheduler.max_dispatches_per_cycle == 0 {
            return invalid("scheduler.max_dispatches_per_cycle must be at least 1");
        }
        if self.scheduler.completed_capacity == 0 {
            return invalid("scheduler.completed_capacity must be at least 1");
        }
        if self.scheduler.cycle_interval.is_zero() {
            return invalid("scheduler.cycle_interval must be positive");
        }
        if self.scheduler.job_timeout.is_zero() {
            return invalid("scheduler.job_timeout must be positive");
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;

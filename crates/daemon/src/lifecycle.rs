// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: startup and shutdown.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::time::Instant;

use fs2::FileExt;
use pj_adapters::{ConsoleAdapter, TracedProcessAdapter};
use pj_core::{Config as PoolConfig, ConfigError, UuidIdGen};
use pj_daemon::{DaemonPaths, PathError};
use pj_engine::{Scheduler, SchedulerHandle};
use thiserror::Error;
use tokio::net::UnixListener;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Handle type used by the running daemon
pub type PoolHandle = SchedulerHandle<UuidIdGen>;

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub paths: DaemonPaths,
    /// Pool configuration file given on the command line, if any
    pub pool_config: Option<PathBuf>,
}

impl Config {
    /// Resolve paths from the environment; `pool_config` overrides `<state_dir>/pj.toml`
    pub fn from_env(pool_config: Option<PathBuf>) -> Result<Self, LifecycleError> {
        Ok(Self {
            paths: DaemonPaths::from_env()?,
            pool_config,
        })
    }

    /// Load the pool configuration; a missing default file means defaults
    pub fn load_pool_config(&self) -> Result<PoolConfig, LifecycleError> {
        let config = match &self.pool_config {
            Some(path) => PoolConfig::load(path)?,
            None => PoolConfig::load_or_default(&self.paths.config_path)?,
        };
        Ok(config)
    }
}

/// Daemon state during operation
pub struct DaemonState {
    pub config: Config,
    // NOTE(lifetime): Held to maintain exclusive file lock; released on drop
    #[allow(dead_code)]
    lock_file: File,
    pub listener: UnixListener,
    pub pool: PoolHandle,
    scheduler: Option<JoinHandle<()>>,
    pub start_time: Instant,
}

impl DaemonState {
    /// Whether a client asked the daemon to stop
    pub fn shutdown_requested(&self) -> bool {
        self.pool.is_stopped()
    }

    /// Stop the scheduler, wait for it to drain, then remove daemon files
    pub async fn shutdown(&mut self) -> Result<(), LifecycleError> {
        info!("Shutting down daemon...");

        self.pool.stop();
        if let Some(scheduler) = self.scheduler.take() {
            if let Err(e) = scheduler.await {
                warn!("Scheduler task failed: {}", e);
            }
        }

        let paths = &self.config.paths;
        for path in [&paths.socket_path, &paths.lock_path, &paths.version_path] {
            if path.exists() {
                if let Err(e) = std::fs::remove_file(path) {
                    warn!("Failed to remove {}: {}", path.display(), e);
                }
            }
        }

        // Lock is released when self.lock_file is dropped
        info!("Daemon shutdown complete");
        Ok(())
    }
}

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Paths(#[from] PathError),

    #[error("Failed to acquire lock: daemon already running?")]
    LockFailed(#[source] std::io::Error),

    #[error("Failed to bind socket at {0}: {1}")]
    BindFailed(PathBuf, std::io::Error),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Start the daemon
pub async fn startup(config: &Config) -> Result<DaemonState, LifecycleError> {
    match startup_inner(config).await {
        Ok(state) => Ok(state),
        Err(e) => {
            // Clean up any resources created before failure
            cleanup_on_failure(config, &e);
            Err(e)
        }
    }
}

/// Inner startup logic - cleanup_on_failure called if this fails
async fn startup_inner(config: &Config) -> Result<DaemonState, LifecycleError> {
    let paths = &config.paths;

    // 1. Create directories
    std::fs::create_dir_all(&paths.state_dir)?;
    if let Some(parent) = paths.socket_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // 2. Acquire lock file FIRST - prevents races
    // Truncating before the lock is held would wipe a live daemon's pid
    let mut lock_file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&paths.lock_path)?;
    lock_file
        .try_lock_exclusive()
        .map_err(LifecycleError::LockFailed)?;
    lock_file.set_len(0)?;
    writeln!(lock_file, "{}", std::process::id())?;

    std::fs::write(&paths.version_path, env!("CARGO_PKG_VERSION"))?;

    // 3. Load pool config BEFORE binding socket (fail fast)
    let pool_config = config.load_pool_config()?;
    info!(
        program = %pool_config.worker.program.display(),
        max_workers = pool_config.scheduler.max_workers,
        "Loaded pool config"
    );

    // 4. Remove stale socket and bind (LAST - only after all validation passes)
    if paths.socket_path.exists() {
        std::fs::remove_file(&paths.socket_path)?;
    }
    let listener = UnixListener::bind(&paths.socket_path)
        .map_err(|e| LifecycleError::BindFailed(paths.socket_path.clone(), e))?;

    // 5. Start the scheduler
    let adapter = TracedProcessAdapter::new(ConsoleAdapter::new(pool_config.worker.clone()));
    let (scheduler, pool) = Scheduler::new(adapter, pool_config, UuidIdGen);
    let scheduler = tokio::spawn(scheduler.run());

    info!("Daemon started in {}", paths.state_dir.display());

    Ok(DaemonState {
        config: config.clone(),
        lock_file,
        listener,
        pool,
        scheduler: Some(scheduler),
        start_time: Instant::now(),
    })
}

/// Clean up resources on startup failure
fn cleanup_on_failure(config: &Config, error: &LifecycleError) {
    // Another daemon owns every file when the lock was taken
    if matches!(error, LifecycleError::LockFailed(_)) {
        return;
    }
    let paths = &config.paths;
    if paths.socket_path.exists() {
        let _ = std::fs::remove_file(&paths.socket_path);
    }
    if paths.version_path.exists() {
        let _ = std::fs::remove_file(&paths.version_path);
    }
    if paths.lock_path.exists() {
        let _ = std::fs::remove_file(&paths.lock_path);
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Where the daemon keeps its files
//!
//! One daemon runs per state directory. Sockets live under a short shared
//! directory (macOS SUN_LEN = 104), named by a hash of the state directory.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use thiserror::Error;

/// Startup marker prefix written to the log before anything else.
/// Full format: "--- pjd: starting (pid: 12345) ---"
pub const STARTUP_MARKER_PREFIX: &str = "--- pjd: starting (pid: ";

/// Pool configuration file name inside the state directory
pub const CONFIG_FILE: &str = "pj.toml";

#[derive(Debug, Error)]
pub enum PathError {
    #[error("could not determine state directory (set PJ_STATE_DIR or HOME)")]
    NoStateDir,
}

/// Resolved daemon file locations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonPaths {
    pub state_dir: PathBuf,
    pub socket_path: PathBuf,
    /// Lock file, also holding the daemon pid
    pub lock_path: PathBuf,
    pub version_path: PathBuf,
    pub log_path: PathBuf,
    /// Default pool configuration file
    pub config_path: PathBuf,
}

impl DaemonPaths {
    /// Resolve paths from the environment
    pub fn from_env() -> Result<Self, PathError> {
        Ok(Self::new(state_dir()?, socket_dir()))
    }

    pub fn new(state_dir: PathBuf, socket_dir: PathBuf) -> Self {
        let socket_path = socket_dir.join(format!("{}.sock", dir_hash(&state_dir)));
        Self {
            socket_path,
            lock_path: state_dir.join("daemon.pid"),
            version_path: state_dir.join("daemon.version"),
            log_path: state_dir.join("daemon.log"),
            config_path: state_dir.join(CONFIG_FILE),
            state_dir,
        }
    }
}

/// State directory: `PJ_STATE_DIR`, else `$XDG_STATE_HOME/pj`, else `~/.local/state/pj`
pub fn state_dir() -> Result<PathBuf, PathError> {
    if let Ok(dir) = std::env::var("PJ_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("pj"));
    }
    let home = std::env::var("HOME").map_err(|_| PathError::NoStateDir)?;
    Ok(PathBuf::from(home).join(".local/state/pj"))
}

/// Socket directory: `PJ_SOCKET_DIR`, else `/tmp/pj`
pub fn socket_dir() -> PathBuf {
    std::env::var("PJ_SOCKET_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp/pj"))
}

/// First 16 hex chars of the SHA-256 of the path
fn dir_hash(path: &Path) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.to_string_lossy().as_bytes());
    let result = hasher.finalize();
    result[..8].iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
#[path = "paths_tests.rs"]
mod tests;

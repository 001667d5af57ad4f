//! Shared helpers for CLI specs
//!
//! Every `Project` gets its own state and socket directories, so specs run
//! in parallel without seeing each other's daemon.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use assert_cmd::assert::Assert;
use assert_cmd::Command;
use predicates::prelude::PredicateBooleanExt;
use predicates::str::contains;
use tempfile::TempDir;

/// Upper bound for polling waits in specs
pub const SPEC_WAIT_MAX_MS: u64 = 5000;

/// Pool config with a fast cycle so specs do not wait on the default interval
pub const FAST_POOL: &str = r#"
[scheduler]
cycle_interval = "100ms"
shutdown_grace = "2s"

[worker]
stop_timeout = "1s"
"#;

/// Poll `check` until it returns true or `max_ms` elapses
pub fn wait_for(max_ms: u64, mut check: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_millis(max_ms);
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    check()
}

/// An isolated pj installation in a temp directory
pub struct Project {
    dir: TempDir,
}

impl Project {
    pub fn empty() -> Self {
        let dir = tempfile::Builder::new()
            .prefix("pj")
            .tempdir()
            .unwrap();
        std::fs::create_dir_all(dir.path().join("state")).unwrap();
        Self { dir }
    }

    /// A project whose daemon cycles fast
    pub fn fast() -> Self {
        let project = Self::empty();
        project.file("state/pj.toml", FAST_POOL);
        project
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn state_path(&self) -> PathBuf {
        self.dir.path().join("state")
    }

    pub fn socket_dir(&self) -> PathBuf {
        self.dir.path().join("sock")
    }

    /// Write a file relative to the project root
    pub fn file(&self, rel: &str, content: &str) {
        let path = self.dir.path().join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
    }

    pub fn pj(&self) -> CliBuilder {
        let mut cmd = Command::cargo_bin("pj").unwrap();
        cmd.current_dir(self.path())
            .env("PJ_STATE_DIR", self.state_path())
            .env("PJ_SOCKET_DIR", self.socket_dir())
            .env("PJ_DAEMON_BINARY", assert_cmd::cargo::cargo_bin("pjd"))
            .env("PJ_TIMEOUT_EXIT_MS", "5000")
            .env_remove("PJ_CONFIG")
            .env_remove("RUST_LOG");
        CliBuilder { cmd }
    }

    /// Text of `pj status` once `check` accepts it
    pub fn wait_for_status(&self, check: impl Fn(&str) -> bool) -> String {
        let mut last = String::new();
        wait_for(SPEC_WAIT_MAX_MS, || {
            last = self.pj().args(&["status"]).passes().stdout();
            check(&last)
        });
        last
    }
}

impl Drop for Project {
    fn drop(&mut self) {
        let _ = self.pj().args(&["daemon", "stop"]).cmd.output();
    }
}

pub struct CliBuilder {
    cmd: Command,
}

impl CliBuilder {
    pub fn args(mut self, args: &[&str]) -> Self {
        self.cmd.args(args);
        self
    }

    pub fn env(mut self, key: &str, value: impl AsRef<std::ffi::OsStr>) -> Self {
        self.cmd.env(key, value);
        self
    }

    pub fn stdin(mut self, input: &str) -> Self {
        self.cmd.write_stdin(input.to_string());
        self
    }

    pub fn passes(mut self) -> RunAssert {
        RunAssert(self.cmd.assert().success())
    }

    pub fn fails(mut self) -> RunAssert {
        RunAssert(self.cmd.assert().failure())
    }
}

pub struct RunAssert(Assert);

impl RunAssert {
    pub fn stdout_has(self, expected: &str) -> Self {
        Self(self.0.stdout(contains(expected)))
    }

    pub fn stdout_lacks(self, unexpected: &str) -> Self {
        Self(self.0.stdout(contains(unexpected).not()))
    }

    pub fn stderr_has(self, expected: &str) -> Self {
        Self(self.0.stderr(contains(expected)))
    }

    pub fn stderr_lacks(self, unexpected: &str) -> Self {
        Self(self.0.stderr(contains(unexpected).not()))
    }

    pub fn stdout(&self) -> String {
        String::from_utf8_lossy(&self.0.get_output().stdout).to_string()
    }
}

//! Daemon lifecycle specs
//!
//! Verify daemon start/stop/status lifecycle.

use crate::prelude::*;

#[test]
fn daemon_status_when_not_running() {
    let temp = Project::empty();

    temp.pj()
        .args(&["daemon", "status"])
        .passes()
        .stdout_has("Daemon not running");
}

#[test]
fn daemon_start_reports_success() {
    let temp = Project::fast();

    temp.pj()
        .args(&["daemon", "start"])
        .passes()
        .stdout_has("Daemon started");
}

#[test]
fn daemon_start_twice_reports_already_running() {
    let temp = Project::fast();
    temp.pj().args(&["daemon", "start"]).passes();

    temp.pj()
        .args(&["daemon", "start"])
        .passes()
        .stdout_has("Daemon already running");
}

#[test]
fn daemon_status_shows_running_after_start() {
    let temp = Project::fast();
    temp.pj().args(&["daemon", "start"]).passes();

    temp.pj()
        .args(&["daemon", "status"])
        .passes()
        .stdout_has("Status: running")
        .stdout_has("Version:")
        .stdout_has("PID:")
        .stdout_has("Jobs: 0 waiting")
        .stdout_has("Workers: 0");
}

#[test]
fn daemon_stop_reports_success() {
    let temp = Project::fast();
    temp.pj().args(&["daemon", "start"]).passes();

    temp.pj()
        .args(&["daemon", "stop"])
        .passes()
        .stdout_has("Daemon stopped");
}

#[test]
fn daemon_status_after_stop() {
    let temp = Project::fast();
    temp.pj().args(&["daemon", "start"]).passes();
    temp.pj().args(&["daemon", "stop"]).passes();

    temp.pj()
        .args(&["daemon", "status"])
        .passes()
        .stdout_has("Daemon not running");
}

#[test]
fn daemon_stop_when_not_running() {
    let temp = Project::empty();

    temp.pj()
        .args(&["daemon", "stop"])
        .passes()
        .stdout_has("Daemon not running");
}

#[test]
fn daemon_creates_and_removes_its_files() {
    let temp = Project::fast();
    temp.pj().args(&["daemon", "start"]).passes();

    let state = temp.state_path();
    assert!(state.join("daemon.pid").exists(), "daemon.pid should exist");
    assert!(state.join("daemon.version").exists(), "daemon.version should exist");
    let has_socket = std::fs::read_dir(temp.socket_dir())
        .unwrap()
        .filter_map(|e| e.ok())
        .any(|e| e.path().extension().is_some_and(|ext| ext == "sock"));
    assert!(has_socket, "daemon socket file should exist");

    temp.pj().args(&["daemon", "stop"]).passes();

    assert!(
        wait_for(SPEC_WAIT_MAX_MS, || !state.join("daemon.pid").exists()),
        "daemon.pid should be removed"
    );
    assert!(!state.join("daemon.version").exists());
}

#[test]
fn daemon_start_error_shows_in_cli() {
    let temp = Project::empty();
    temp.file("state/pj.toml", "[worker]\nprogram = \"sh\"\nno_such_field = true\n");

    temp.pj()
        .args(&["daemon", "start"])
        .fails()
        .stderr_has("no_such_field")
        .stderr_lacks("Connection timeout");
}

#[test]
fn explicit_config_overrides_state_dir_config() {
    let temp = Project::empty();
    temp.file("state/pj.toml", "[scheduler]\nmax_workers = 0\n");
    temp.file("pool.toml", FAST_POOL);

    temp.pj()
        .env("PJ_CONFIG", temp.path().join("pool.toml"))
        .args(&["daemon", "start"])
        .passes()
        .stdout_has("Daemon started");
}

//! Daemon logs specs

use crate::prelude::*;

#[test]
fn daemon_logs_without_log() {
    let temp = Project::empty();

    temp.pj()
        .args(&["daemon", "logs"])
        .passes()
        .stdout_has("No daemon log");
}

#[test]
fn daemon_logs_shows_startup_marker() {
    let temp = Project::fast();
    temp.pj().args(&["daemon", "start"]).passes();

    temp.pj()
        .args(&["daemon", "logs", "--lines", "10"])
        .passes()
        .stdout_has("pjd: starting");
}

#[test]
fn daemon_logs_shows_ready_line() {
    let temp = Project::fast();
    temp.pj().args(&["daemon", "start"]).passes();

    let ready = wait_for(SPEC_WAIT_MAX_MS, || {
        temp.pj()
            .args(&["daemon", "logs"])
            .passes()
            .stdout()
            .contains("Daemon ready")
    });
    assert!(ready, "log should contain the ready line");
}

//! CLI error specs

use crate::prelude::*;

#[test]
fn unknown_command_fails() {
    let temp = Project::empty();
    temp.pj()
        .args(&["frobnicate"])
        .fails()
        .stderr_has("unrecognized subcommand");
}

#[test]
fn submit_requires_a_payload() {
    let temp = Project::empty();
    temp.pj()
        .args(&["submit", "plot"])
        .fails()
        .stderr_has("--payload");
}

#[test]
fn submit_rejects_payload_and_file_together() {
    let temp = Project::empty();
    temp.pj()
        .args(&["submit", "plot", "--payload", "x", "--file", "a.txt"])
        .fails()
        .stderr_has("cannot be used with");
}

#[test]
fn submit_reports_missing_payload_file() {
    let temp = Project::fast();
    temp.pj()
        .args(&["submit", "plot", "--file", "missing.txt"])
        .fails()
        .stderr_has("missing.txt");
}

#[test]
fn invalid_pool_config_is_reported() {
    let temp = Project::empty();
    temp.file("state/pj.toml", "[scheduler]\nmax_workers = 0\n");

    temp.pj()
        .args(&["daemon", "start"])
        .fails()
        .stderr_has("max_workers");
}

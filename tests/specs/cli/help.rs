//! CLI help specs

use crate::prelude::*;

#[test]
fn help_lists_commands() {
    let temp = Project::empty();
    temp.pj()
        .args(&["--help"])
        .passes()
        .stdout_has("submit")
        .stdout_has("status")
        .stdout_has("workers")
        .stdout_has("daemon");
}

#[test]
fn version_flag_prints_version() {
    let temp = Project::empty();
    temp.pj()
        .args(&["--version"])
        .passes()
        .stdout_has(env!("CARGO_PKG_VERSION"));
}

#[test]
fn submit_help_shows_payload_options() {
    let temp = Project::empty();
    temp.pj()
        .args(&["submit", "--help"])
        .passes()
        .stdout_has("--payload")
        .stdout_has("--file");
}

#[test]
fn daemon_help_lists_subcommands() {
    let temp = Project::empty();
    temp.pj()
        .args(&["daemon", "--help"])
        .passes()
        .stdout_has("start")
        .stdout_has("stop")
        .stdout_has("status")
        .stdout_has("logs");
}

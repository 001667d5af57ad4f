//! Job submission specs
//!
//! Jobs run on `sh` workers; the default trailer echoes the done marker.

use crate::prelude::*;

#[test]
fn submit_starts_daemon_and_prints_id() {
    let temp = Project::fast();

    temp.pj()
        .args(&["submit", "hello", "--payload", "echo hello"])
        .passes()
        .stdout_has("Submitted: ");

    temp.pj()
        .args(&["daemon", "status"])
        .passes()
        .stdout_has("Status: running");
}

#[test]
fn submitted_job_completes() {
    let temp = Project::fast();
    temp.pj()
        .args(&["submit", "hello", "--payload", "echo hello"])
        .passes();

    let status = temp.wait_for_status(|s| s.contains("complete"));
    assert!(status.contains("hello"), "status:\n{}", status);
    assert!(status.contains("complete"), "status:\n{}", status);
}

#[test]
fn error_marker_fails_job() {
    let temp = Project::fast();
    temp.pj()
        .args(&["submit", "broken", "--payload", "echo PJ:ERROR no drawing"])
        .passes();

    let status = temp.wait_for_status(|s| s.contains("error"));
    assert!(status.contains("broken"), "status:\n{}", status);
    assert!(status.contains("error"), "status:\n{}", status);
}

#[test]
fn payload_from_file() {
    let temp = Project::fast();
    temp.file("job.sh", "echo from-file\n");

    temp.pj()
        .args(&["submit", "scripted", "--file", "job.sh"])
        .passes();

    temp.wait_for_status(|s| s.contains("complete"));
    temp.pj()
        .args(&["workers"])
        .passes()
        .stdout_has("from-file");
}

#[test]
fn payload_from_stdin() {
    let temp = Project::fast();

    temp.pj()
        .args(&["submit", "piped", "--file", "-"])
        .stdin("echo piped\n")
        .passes()
        .stdout_has("Submitted: ");

    temp.wait_for_status(|s| s.contains("complete"));
}

#[test]
fn jobs_complete_in_submission_order() {
    let temp = Project::fast();
    for name in ["first", "second", "third"] {
        temp.pj()
            .args(&["submit", name, "--payload", "true"])
            .passes();
    }

    let status = temp.wait_for_status(|s| s.matches("complete").count() == 3);
    let first = status.find("first").unwrap();
    let second = status.find("second").unwrap();
    let third = status.find("third").unwrap();
    assert!(first < second && second < third, "status:\n{}", status);
}

#[test]
fn status_json_lists_jobs() {
    let temp = Project::fast();
    temp.pj()
        .args(&["submit", "hello", "--payload", "echo hello"])
        .passes();
    temp.wait_for_status(|s| s.contains("complete"));

    temp.pj()
        .args(&["status", "--json"])
        .passes()
        .stdout_has("\"name\": \"hello\"")
        .stdout_has("\"status\": \"Complete\"");
}

#[test]
fn status_with_no_jobs() {
    let temp = Project::fast();

    temp.pj()
        .args(&["status"])
        .passes()
        .stdout_has("No jobs")
        .stdout_lacks("complete");
}

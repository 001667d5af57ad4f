//! Worker listing specs

use crate::prelude::*;

#[test]
fn workers_empty_before_any_job() {
    let temp = Project::fast();

    temp.pj()
        .args(&["workers"])
        .passes()
        .stdout_has("No workers");
}

#[test]
fn worker_is_launched_on_demand_and_reused() {
    let temp = Project::fast();
    temp.pj()
        .args(&["submit", "one", "--payload", "echo one"])
        .passes();
    temp.pj()
        .args(&["submit", "two", "--payload", "echo two"])
        .passes();
    temp.wait_for_status(|s| s.matches("complete").count() == 2);

    temp.pj()
        .args(&["workers"])
        .passes()
        .stdout_has("worker-1")
        .stdout_has("idle")
        .stdout_lacks("worker-2");
}

#[test]
fn workers_json() {
    let temp = Project::fast();
    temp.pj()
        .args(&["submit", "one", "--payload", "echo one"])
        .passes();
    temp.wait_for_status(|s| s.contains("complete"));

    temp.pj()
        .args(&["workers", "--json"])
        .passes()
        .stdout_has("\"jobs_run\": 1");
}

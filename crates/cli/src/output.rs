// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Output formatting for CLI commands

use pj_core::{JobSummary, WorkerSummary};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_json_flag(json: bool) -> Self {
        if json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

/// Print a list as a text table or pretty JSON
pub fn print_list<T: Serialize>(
    items: &[T],
    format: OutputFormat,
    table: fn(&[T]) -> String,
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Text => print!("{}", table(items)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(items)?),
    }
    Ok(())
}

pub fn job_table(jobs: &[JobSummary]) -> String {
    if jobs.is_empty() {
        return "No jobs\n".to_string();
    }
    let mut out = format!("{:<38} {:<20} {:<10} WORKER\n", "ID", "NAME", "STATUS");
    for job in jobs {
        let worker = job
            .worker
            .map(|w| w.to_string())
            .unwrap_or_else(|| "-".to_string());
        out.push_str(&format!(
            "{:<38} {:<20} {:<10} {}\n",
            job.id.as_str(),
            truncate(&job.name, 20),
            job.status.to_string(),
            worker
        ));
    }
    out
}

pub fn worker_table(workers: &[WorkerSummary]) -> String {
    if workers.is_empty() {
        return "No workers\n".to_string();
    }
    let mut out = format!("{:<10} {:<12} {:<8} {:<6} JOB\n", "WORKER", "PHASE", "PID", "RUN");
    for worker in workers {
        let pid = worker
            .pid
            .map(|p| p.to_string())
            .unwrap_or_else(|| "-".to_string());
        let job = worker.job.as_ref().map(|j| j.as_str()).unwrap_or("-");
        out.push_str(&format!(
            "{:<10} {:<12} {:<8} {:<6} {}\n",
            worker.id.to_string(),
            worker.phase.to_string(),
            pid,
            worker.jobs_run,
            job
        ));
        for line in &worker.log_tail {
            out.push_str(&format!("  | {}\n", line));
        }
    }
    out
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut cut: String = s.chars().take(max.saturating_sub(1)).collect();
    cut.push('~');
    cut
}

#[cfg(test)]
#[path = "output_tests.rs"]
mod tests;

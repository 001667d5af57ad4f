// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon management: start, stop, status and logs

use anyhow::Result;
use clap::{Args, Subcommand};
use pj_core::JobStatus;
use pj_daemon::DaemonPaths;

use crate::client::{self, DaemonClient};

#[derive(Args)]
pub struct DaemonArgs {
    #[command(subcommand)]
    pub command: DaemonCommand,
}

#[derive(Subcommand)]
pub enum DaemonCommand {
    /// Start the daemon in the background
    Start {
        /// Run in the foreground instead
        #[arg(long)]
        foreground: bool,
    },
    /// Stop the daemon, letting running jobs finish within the grace period
    Stop,
    /// Show whether the daemon is running
    Status,
    /// Show the daemon log
    Logs {
        /// Number of lines to show
        #[arg(long, short = 'n', default_value = "50")]
        lines: usize,
    },
}

pub async fn daemon(args: DaemonArgs, paths: &DaemonPaths) -> Result<()> {
    match args.command {
        DaemonCommand::Start { foreground } => start(paths, foreground).await,
        DaemonCommand::Stop => stop(paths).await,
        DaemonCommand::Status => status(paths).await,
        DaemonCommand::Logs { lines } => logs(paths, lines),
    }
}

async fn start(paths: &DaemonPaths, foreground: bool) -> Result<()> {
    if let Ok(client) = DaemonClient::connect(paths) {
        if client.hello().await.is_ok() {
            println!("Daemon already running");
            return Ok(());
        }
    }

    if foreground {
        let status = std::process::Command::new(client::find_pjd_binary())
            .env("PJ_STATE_DIR", &paths.state_dir)
            .status()?;
        if !status.success() {
            anyhow::bail!("pjd exited with {}", status);
        }
        return Ok(());
    }

    DaemonClient::connect_or_start(paths).await?;
    println!("Daemon started");
    Ok(())
}

async fn stop(paths: &DaemonPaths) -> Result<()> {
    if client::daemon_stop(paths).await? {
        println!("Daemon stopped");
    } else {
        println!("Daemon not running");
    }
    Ok(())
}

async fn status(paths: &DaemonPaths) -> Result<()> {
    let client = match DaemonClient::connect(paths) {
        Ok(client) => client,
        Err(client::ClientError::DaemonNotRunning) => {
            println!("Daemon not running");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    let Ok(version) = client.hello().await else {
        println!("Daemon not running");
        return Ok(());
    };
    let jobs = client.status().await?;
    let workers = client.workers().await?;

    let count = |status: JobStatus| jobs.iter().filter(|j| j.status == status).count();

    println!("Status: running");
    println!("Version: {}", version);
    if let Some(pid) = client::read_daemon_pid(paths) {
        println!("PID: {}", pid);
    }
    println!(
        "Jobs: {} waiting, {} running, {} complete, {} failed",
        count(JobStatus::Waiting),
        count(JobStatus::Running) + count(JobStatus::Verifying),
        count(JobStatus::Complete),
        count(JobStatus::Error),
    );
    println!("Workers: {}", workers.len());
    Ok(())
}

fn logs(paths: &DaemonPaths, lines: usize) -> Result<()> {
    if !paths.log_path.exists() {
        println!("No daemon log at {}", paths.log_path.display());
        return Ok(());
    }
    for line in client::read_log_tail(&paths.log_path, lines)? {
        println!("{}", line);
    }
    Ok(())
}

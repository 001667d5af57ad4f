// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! pj - Pool Jobs CLI

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod client;
mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{daemon, status, submit, workers};
use pj_daemon::DaemonPaths;

#[derive(Parser)]
#[command(
    name = "pj",
    version,
    about = "Pool Jobs - run queued jobs on a pool of long-lived worker processes"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Queue a job
    Submit(submit::SubmitArgs),
    /// List jobs: completed, then in flight, then pending
    Status(status::StatusArgs),
    /// List pool workers with their recent output
    Workers(workers::WorkersArgs),
    /// Daemon management
    Daemon(daemon::DaemonArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let paths = DaemonPaths::from_env()?;

    // Commands other than `daemon` start the daemon on demand
    match cli.command {
        Commands::Submit(args) => submit::handle(args, &paths).await,
        Commands::Status(args) => status::handle(args, &paths).await,
        Commands::Workers(args) => workers::handle(args, &paths).await,
        Commands::Daemon(args) => daemon::daemon(args, &paths).await,
    }
}

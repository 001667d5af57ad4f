// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use anyhow::Result;
use clap::Args;
use pj_daemon::DaemonPaths;

use crate::client::DaemonClient;
use crate::output::{self, OutputFormat};

#[derive(Args)]
pub struct StatusArgs {
    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

/// Every known job: completed, then in flight, then pending
pub async fn handle(args: StatusArgs, paths: &DaemonPaths) -> Result<()> {
    let client = DaemonClient::connect_or_start(paths).await?;
    let jobs = client.status().await?;
    output::print_list(&jobs, OutputFormat::from_json_flag(args.json), output::job_table)
}

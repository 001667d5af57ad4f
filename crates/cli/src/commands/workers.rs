// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use anyhow::Result;
use clap::Args;
use pj_daemon::DaemonPaths;

use crate::client::DaemonClient;
use crate::output::{self, OutputFormat};

#[derive(Args)]
pub struct WorkersArgs {
    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

pub async fn handle(args: WorkersArgs, paths: &DaemonPaths) -> Result<()> {
    let client = DaemonClient::connect_or_start(paths).await?;
    let workers = client.workers().await?;
    output::print_list(&workers, OutputFormat::from_json_flag(args.json), output::worker_table)
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use pj_daemon::DaemonPaths;

use crate::client::DaemonClient;

#[derive(Args)]
pub struct SubmitArgs {
    /// Job name shown in status listings
    pub name: String,

    /// Text written to the worker's stdin
    #[arg(long, conflicts_with = "file", required_unless_present = "file")]
    pub payload: Option<String>,

    /// Read the payload from a file ("-" for stdin)
    #[arg(long)]
    pub file: Option<PathBuf>,
}

impl SubmitArgs {
    fn read_payload(&self) -> Result<String> {
        if let Some(payload) = &self.payload {
            return Ok(payload.clone());
        }
        match &self.file {
            Some(path) if path.as_os_str() == "-" => {
                std::io::read_to_string(std::io::stdin()).context("reading payload from stdin")
            }
            Some(path) => std::fs::read_to_string(path)
                .with_context(|| format!("reading payload from {}", path.display())),
            None => anyhow::bail!("either --payload or --file is required"),
        }
    }
}

pub async fn handle(args: SubmitArgs, paths: &DaemonPaths) -> Result<()> {
    let payload = args.read_payload()?;
    let client = DaemonClient::connect_or_start(paths).await?;
    let id = client.submit(&args.name, &payload).await?;
    println!("Submitted: {}", id);
    Ok(())
}

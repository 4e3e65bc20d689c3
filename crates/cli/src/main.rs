// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `ksi`: thin daemon-process wrapper (spec.md §1, "daemon start/stop CLI
//! wrapper"). Starts/stops `ksid` and pings `system:health`; no
//! orchestration logic lives here -- that's what the daemon's own
//! `{event, data}` protocol is for.

mod client;

use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use client::DaemonClient;
use ksi_storage::config::Paths;

#[derive(Parser)]
#[command(name = "ksi", about = "Control the KSI orchestration daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start ksid if it isn't already running
    Start {
        /// Run ksid in the foreground instead of detaching it
        #[arg(long)]
        foreground: bool,
    },
    /// Ask a running ksid to shut down
    Stop,
    /// Report whether ksid is up, and its uptime
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let paths = Paths::from_env();

    match cli.command {
        Command::Start { foreground } => start(&paths, foreground).await,
        Command::Stop => stop(&paths).await,
        Command::Status => status(&paths).await,
    }
}

async fn start(paths: &Paths, foreground: bool) -> Result<()> {
    paths.ensure_dirs()?;

    if foreground {
        let ksid_path = find_ksid_binary()?;
        let status = std::process::Command::new(&ksid_path).status()?;
        if !status.success() {
            return Err(anyhow!("ksid exited with status: {status}"));
        }
        return Ok(());
    }

    if DaemonClient::connect(paths).await.is_ok() {
        println!("ksid already running");
        return Ok(());
    }

    let ksid_path = find_ksid_binary()?;
    DaemonClient::connect_or_start(paths, &ksid_path).await.map_err(|err| anyhow!("failed to start ksid: {err}"))?;
    println!("ksid started");
    Ok(())
}

async fn stop(paths: &Paths) -> Result<()> {
    let client = match DaemonClient::connect(paths).await {
        Ok(client) => client,
        Err(_) => {
            println!("ksid not running");
            return Ok(());
        }
    };
    client.shutdown().await.map_err(|err| anyhow!("failed to signal shutdown: {err}"))?;
    println!("ksid stopping");
    Ok(())
}

async fn status(paths: &Paths) -> Result<()> {
    let client = match DaemonClient::connect(paths).await {
        Ok(client) => client,
        Err(_) => {
            println!("status: not_running");
            return Ok(());
        }
    };
    let health = client.health().await.map_err(|err| anyhow!("{err}"))?;
    println!("status: running");
    println!("{}", serde_json::to_string_pretty(&health)?);
    Ok(())
}

/// Looks next to the current executable first (the common install
/// layout: `ksi` and `ksid` in the same `bin/`), then falls back to
/// `PATH`.
fn find_ksid_binary() -> Result<PathBuf> {
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            let sibling = dir.join("ksid");
            if sibling.exists() {
                return Ok(sibling);
            }
        }
    }
    Ok(PathBuf::from("ksid"))
}

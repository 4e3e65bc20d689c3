// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Thin Unix-socket client for the `ksi` CLI: connect, send one request,
//! read one reply. Carries a single open `{event, data}` frame rather
//! than a closed per-command request enum, since the daemon's protocol
//! is itself open-ended.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use ksi_storage::config::Paths;
use ksi_wire::{read_frame, write_frame, Request, Response};
use serde_json::Value;
use tokio::io::BufReader;
use tokio::net::UnixStream;

pub struct DaemonClient {
    socket_path: PathBuf,
}

impl DaemonClient {
    /// Fails immediately if the daemon isn't listening -- callers that
    /// want to start it first should use [`Self::connect_or_start`].
    pub async fn connect(paths: &Paths) -> io::Result<Self> {
        // Probe once so callers get a prompt "not running" error instead
        // of discovering it on the first real request.
        UnixStream::connect(&paths.socket_path).await?;
        Ok(Self { socket_path: paths.socket_path.clone() })
    }

    /// Spawns `ksid` in the background and polls the socket until it
    /// accepts a connection or `attempts` is exhausted.
    pub async fn connect_or_start(paths: &Paths, ksid_path: &std::path::Path) -> io::Result<Self> {
        if let Ok(client) = Self::connect(paths).await {
            return Ok(client);
        }
        std::process::Command::new(ksid_path).spawn()?;
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            if let Ok(client) = Self::connect(paths).await {
                return Ok(client);
            }
        }
        Err(io::Error::new(io::ErrorKind::TimedOut, "daemon did not come up in time"))
    }

    pub async fn request(&self, event: &str, data: Value) -> io::Result<Response> {
        let stream = UnixStream::connect(&self.socket_path).await?;
        let (reader, mut writer) = stream.into_split();
        let mut reader = BufReader::new(reader);

        let request = Request::new(event.to_string(), data);
        let request_value = serde_json::to_value(&request)?;
        write_frame(&mut writer, &request_value).await.map_err(io::Error::other)?;

        match read_frame(&mut reader).await.map_err(io::Error::other)? {
            Some(frame) => serde_json::from_value(frame).map_err(io::Error::other),
            None => Err(io::Error::new(io::ErrorKind::UnexpectedEof, "daemon closed connection without replying")),
        }
    }

    pub async fn health(&self) -> io::Result<Value> {
        match self.request("system:health", Value::Null).await? {
            Response::Result(value) => Ok(value),
            Response::Error { error } => Err(io::Error::other(error)),
        }
    }

    pub async fn shutdown(&self) -> io::Result<()> {
        self.request("system:shutdown", Value::Null).await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;

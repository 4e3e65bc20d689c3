// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon-owned configuration: transport/logging/scheduling knobs from
//! `KSI_*` (spec.md §6.5), wrapping the storage-facing [`Paths`] and
//! [`StorageSettings`] the daemon doesn't own itself.
//!
//! Each setting resolves `env var -> optional static file -> built-in
//! default`, in that order, into an immutable [`Config`] at startup --
//! this is a single long-lived process config, not a set of
//! per-connection knobs read on every request.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use ksi_storage::config::{Paths, StorageSettings};
use serde::Deserialize;
use tracing::warn;

fn env_u64(key: &str) -> Option<u64> {
    env::var(key).ok().and_then(|s| s.parse().ok())
}

fn resolve_u64(key: &str, file_value: Option<u64>, default: u64) -> u64 {
    env_u64(key).or(file_value).unwrap_or(default)
}

/// `KSI_LOG_FORMAT`: human-readable spans vs. one JSON object per line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl LogFormat {
    fn resolve(env_value: Option<String>, file_value: Option<String>) -> Self {
        match env_value.or(file_value).as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }
}

/// Shape of the optional static config file (spec.md §6.5, SPEC_FULL.md
/// §0's "static config file layered under env vars"). Every field is
/// optional: a file that sets only `log_level` is valid, and a missing or
/// unparseable file is equivalent to an empty one.
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    socket_timeout_s: Option<u64>,
    log_level: Option<String>,
    log_format: Option<String>,
    completion_max_concurrent: Option<u64>,
}

impl FileConfig {
    fn load(path: &Path) -> Self {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(_) => return Self::default(),
        };
        match toml::from_str(&raw) {
            Ok(file) => file,
            Err(err) => {
                warn!(path = %path.display(), %err, "invalid config file, ignoring");
                Self::default()
            }
        }
    }
}

/// `KSI_CONFIG_FILE`, defaulting to `<base_dir>/config.toml`.
fn config_file_path(paths: &Paths) -> PathBuf {
    env::var("KSI_CONFIG_FILE").map(PathBuf::from).unwrap_or_else(|_| paths.base_dir.join("config.toml"))
}

/// Resolved daemon configuration. Built once in `main` and shared as
/// `Arc<Config>` across every handler (spec.md §6.5).
#[derive(Debug, Clone)]
pub struct Config {
    pub paths: Paths,
    pub storage: StorageSettings,
    pub socket_timeout: Duration,
    pub log_level: String,
    pub log_format: LogFormat,
    pub completion_max_concurrent: u64,
}

impl Config {
    pub fn from_env() -> Self {
        let paths = Paths::from_env();
        let file = FileConfig::load(&config_file_path(&paths));
        Self {
            storage: StorageSettings::from_env(),
            socket_timeout: Duration::from_secs(resolve_u64("KSI_SOCKET_TIMEOUT_S", file.socket_timeout_s, 30)),
            log_level: env::var("KSI_LOG_LEVEL").ok().or(file.log_level).unwrap_or_else(|| "info".to_string()),
            log_format: LogFormat::resolve(env::var("KSI_LOG_FORMAT").ok(), file.log_format),
            completion_max_concurrent: resolve_u64(
                "KSI_COMPLETION_MAX_CONCURRENT",
                file.completion_max_concurrent,
                8,
            ),
            paths,
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;

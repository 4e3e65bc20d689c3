// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `var/` layout resolution and the storage-facing subset of `KSI_*`
//! settings (spec.md §6.3, §6.5). The daemon's own `Config` wraps
//! [`Paths`] and [`StorageSettings`] together with transport/logging
//! settings it alone owns.

use std::env;
use std::path::{Path, PathBuf};

fn env_path(key: &str) -> Option<PathBuf> {
    env::var(key).ok().filter(|s| !s.is_empty()).map(PathBuf::from)
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key).ok().and_then(|s| s.parse().ok()).unwrap_or(default)
}

/// Resolved on-disk layout under `KSI_BASE_DIR` (spec.md §6.3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    pub base_dir: PathBuf,
    pub socket_path: PathBuf,
    pub pid_path: PathBuf,
    pub log_dir: PathBuf,
    pub db_dir: PathBuf,
    pub events_dir: PathBuf,
    pub responses_dir: PathBuf,
    pub sandbox_root: PathBuf,
    pub compositions_dir: PathBuf,
    pub capabilities_dir: PathBuf,
}

impl Paths {
    /// Resolve from env, falling back to `~/.ksi` when `KSI_BASE_DIR` is
    /// unset.
    pub fn from_env() -> Self {
        let base_dir = env_path("KSI_BASE_DIR").unwrap_or_else(|| {
            dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".ksi")
        });
        Self::rooted_at(base_dir)
    }

    /// Build a layout rooted at an arbitrary directory, honoring
    /// individual-path overrides the same way `from_env` does. Used
    /// directly by tests with a `tempfile::TempDir` root.
    pub fn rooted_at(base_dir: PathBuf) -> Self {
        let var = base_dir.join("var");
        Self {
            socket_path: env_path("KSI_SOCKET_PATH").unwrap_or_else(|| var.join("run/daemon.sock")),
            pid_path: var.join("run/daemon.pid"),
            log_dir: var.join("logs/daemon"),
            db_dir: var.join("db"),
            events_dir: var.join("logs/events"),
            responses_dir: var.join("logs/responses"),
            sandbox_root: env_path("KSI_SANDBOX_ROOT").unwrap_or_else(|| var.join("sandbox")),
            compositions_dir: var.join("lib/compositions"),
            capabilities_dir: var.join("lib/capabilities"),
            base_dir,
        }
    }

    pub fn events_db(&self) -> PathBuf {
        self.db_dir.join("events.db")
    }

    pub fn state_db(&self) -> PathBuf {
        self.db_dir.join("state.db")
    }

    pub fn composition_index_db(&self) -> PathBuf {
        self.db_dir.join("composition_index.db")
    }

    pub fn discovery_cache_db(&self) -> PathBuf {
        self.db_dir.join("discovery_cache.db")
    }

    /// Create every directory this layout references. Idempotent.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        for dir in [
            &self.db_dir,
            &self.log_dir,
            &self.events_dir,
            &self.responses_dir,
            &self.sandbox_root,
            &self.compositions_dir,
            &self.capabilities_dir,
        ] {
            std::fs::create_dir_all(dir)?;
        }
        if let Some(parent) = self.socket_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    /// Daily JSONL directory for a given UTC date (`YYYY-MM-DD`),
    /// spec.md §4.2/§6.3.
    pub fn events_day_dir(&self, date: &str) -> PathBuf {
        self.events_dir.join(date)
    }

    pub fn response_log(&self, session_id: &str) -> PathBuf {
        self.responses_dir.join(format!("{session_id}.jsonl"))
    }

    pub fn sandbox_for(&self, agent_id: &str) -> PathBuf {
        self.sandbox_root.join(agent_id)
    }

    /// On-disk capability-definitions file (spec.md §6.3).
    pub fn capabilities_file(&self) -> PathBuf {
        self.capabilities_dir.join("ksi_capabilities.yaml")
    }
}

/// Event-log/state-store tuning knobs from `KSI_*` (spec.md §6.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageSettings {
    pub event_reference_threshold: u64,
    pub event_batch_size: u64,
    pub event_flush_interval_ms: u64,
    pub correlation_max_age_hours: u64,
    pub ring_capacity: usize,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            event_reference_threshold: 4096,
            event_batch_size: 50,
            event_flush_interval_ms: 250,
            correlation_max_age_hours: 24,
            ring_capacity: 10_000,
        }
    }
}

impl StorageSettings {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            event_reference_threshold: env_u64(
                "KSI_EVENT_REFERENCE_THRESHOLD",
                defaults.event_reference_threshold,
            ),
            event_batch_size: env_u64("KSI_EVENT_BATCH_SIZE", defaults.event_batch_size),
            event_flush_interval_ms: env_u64(
                "KSI_EVENT_FLUSH_INTERVAL_MS",
                defaults.event_flush_interval_ms,
            ),
            correlation_max_age_hours: env_u64(
                "KSI_CORRELATION_MAX_AGE_HOURS",
                defaults.correlation_max_age_hours,
            ),
            ring_capacity: env_u64("KSI_RING_CAPACITY", defaults.ring_capacity as u64) as usize,
        }
    }
}

/// Current UTC date as `YYYY-MM-DD`, used to bucket JSONL files.
pub fn utc_date_string(now_seconds: f64) -> String {
    let secs = now_seconds as i64;
    let dt = chrono::DateTime::from_timestamp(secs, 0).unwrap_or_default();
    dt.format("%Y-%m-%d").to_string()
}

pub fn path_is_within(root: &Path, candidate: &Path) -> bool {
    candidate.starts_with(root)
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;

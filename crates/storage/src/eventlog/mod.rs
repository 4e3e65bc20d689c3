// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The event log: hot ring + daily JSONL files + SQLite metadata index
//! (spec.md §4.2).
//!
//! `EventLog::append` never blocks the caller: the ring write is a
//! `parking_lot::Mutex`-guarded `VecDeque` push (wait-free enough -- no
//! I/O, the critical section is a handful of instructions), and the JSONL
//! + SQLite write is handed to a single background writer task over an
//! unbounded channel. The router's log-then-ack guarantee only requires
//! that the ring write (which backs `monitor:get_events`) complete before
//! the handler response is observed; durable persistence can lag.

mod jsonl;
mod payload;
mod ring;
mod sqlite;

pub use payload::{externalize, is_referenceable, REFERENCEABLE_FIELDS};

use crate::config::{utc_date_string, Paths, StorageSettings};
use ksi_core::Event;
use ring::Ring;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, warn};

#[derive(Debug, thiserror::Error)]
pub enum EventLogError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// `(timestamp, event_name, event_type, ...)` persisted row, spec.md §3.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLogEntry {
    pub timestamp: f64,
    pub event_name: String,
    pub event_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub originator_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub construct_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    pub event_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
    pub data: Value,
    #[serde(default, skip_serializing_if = "std::collections::BTreeMap::is_empty")]
    pub payload_refs: std::collections::BTreeMap<String, String>,
}

impl EventLogEntry {
    /// Build the persisted entry from a dispatched [`Event`], applying
    /// payload externalization above `threshold` bytes (spec.md §4.2).
    pub fn from_event(event: &Event, threshold: u64, responses_dir: &std::path::Path) -> Self {
        let (data, payload_refs) = externalize(&event.data, threshold, event, responses_dir);
        Self {
            timestamp: event.timestamp,
            event_name: event.name.clone(),
            event_type: event.namespace().to_string(),
            originator_id: event.originator_id.clone(),
            construct_id: event.construct_id.clone(),
            correlation_id: event.correlation_id.as_ref().map(|c| c.to_string()),
            event_id: event.event_id.to_string(),
            request_id: event.request_id.as_ref().map(|r| r.to_string()),
            session_id: event.session_id.as_ref().map(|s| s.to_string()),
            status: event.status.clone(),
            model: event.data.get("model").and_then(Value::as_str).map(str::to_owned),
            purpose: event.data.get("purpose").and_then(Value::as_str).map(str::to_owned),
            data,
            payload_refs,
        }
    }

    /// Read the referenced file back for a `<ref:path>` field, returning
    /// the last line for per-session response logs (spec.md §4.2 query
    /// hydration) or the whole contents otherwise.
    pub fn hydrate_field(&self, field: &str) -> Option<String> {
        let reference = self.payload_refs.get(field)?;
        let contents = std::fs::read_to_string(reference).ok()?;
        if reference.ends_with(".jsonl") {
            contents.lines().next_back().map(str::to_owned)
        } else {
            Some(contents)
        }
    }
}

/// Query parameters for `monitor:get_events` / `query_metadata`.
#[derive(Debug, Clone, Default)]
pub struct EventQuery {
    pub event_patterns: Vec<String>,
    pub originator_id: Option<String>,
    pub start_time: Option<f64>,
    pub end_time: Option<f64>,
    pub limit: Option<u64>,
}

struct WriterMsg {
    entry: EventLogEntry,
}

pub struct EventLog {
    ring: Arc<parking_lot::Mutex<Ring>>,
    dropped: Arc<AtomicU64>,
    sender: mpsc::UnboundedSender<WriterMsg>,
    index_db: PathBuf,
    responses_dir: PathBuf,
    threshold: u64,
}

impl EventLog {
    /// Open (creating if absent) the event log's on-disk state and spawn
    /// its batching writer task.
    pub fn open(paths: &Paths, settings: StorageSettings) -> Result<Self, EventLogError> {
        std::fs::create_dir_all(&paths.events_dir)?;
        std::fs::create_dir_all(&paths.responses_dir)?;
        sqlite::init_schema(&paths.events_db())?;

        let ring = Arc::new(parking_lot::Mutex::new(Ring::new(settings.ring_capacity)));
        let dropped = Arc::new(AtomicU64::new(0));
        let (sender, receiver) = mpsc::unbounded_channel();

        tokio::spawn(run_writer(
            receiver,
            paths.events_db(),
            paths.events_dir.clone(),
            settings.event_batch_size,
            settings.event_flush_interval_ms,
        ));

        Ok(Self {
            ring,
            dropped,
            sender,
            index_db: paths.events_db(),
            responses_dir: paths.responses_dir.clone(),
            threshold: settings.event_reference_threshold,
        })
    }

    /// Record `event`. Never blocks: the ring write is synchronous and
    /// cheap, the JSONL/SQLite write is deferred to the writer task.
    pub fn append(&self, event: &Event) -> EventLogEntry {
        let entry = EventLogEntry::from_event(event, self.threshold, &self.responses_dir);
        {
            let mut ring = self.ring.lock();
            if ring.push(entry.clone()) {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
        if self.sender.send(WriterMsg { entry: entry.clone() }).is_err() {
            warn!("event log writer task gone, dropping durable write for {}", entry.event_name);
        }
        entry
    }

    /// Snapshot of the last K entries held in memory, newest-first.
    pub fn ring_snapshot(&self, limit: Option<usize>) -> Vec<EventLogEntry> {
        self.ring.lock().snapshot(limit)
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Translate `event_patterns` (trailing `*` globs) to SQL and query
    /// the durable index, newest-first (spec.md §4.2).
    pub fn query_metadata(&self, query: &EventQuery) -> Result<Vec<EventLogEntry>, EventLogError> {
        sqlite::query(&self.index_db, query)
    }
}

async fn run_writer(
    mut receiver: mpsc::UnboundedReceiver<WriterMsg>,
    db_path: PathBuf,
    events_dir: PathBuf,
    batch_size: u64,
    flush_interval_ms: u64,
) {
    let mut batch: Vec<EventLogEntry> = Vec::new();
    let mut interval = tokio::time::interval(std::time::Duration::from_millis(
        flush_interval_ms.max(1),
    ));
    loop {
        tokio::select! {
            msg = receiver.recv() => {
                match msg {
                    Some(WriterMsg { entry }) => {
                        batch.push(entry);
                        if batch.len() as u64 >= batch_size {
                            flush(&mut batch, &db_path, &events_dir).await;
                        }
                    }
                    None => {
                        flush(&mut batch, &db_path, &events_dir).await;
                        return;
                    }
                }
            }
            _ = interval.tick() => {
                if !batch.is_empty() {
                    flush(&mut batch, &db_path, &events_dir).await;
                }
            }
        }
    }
}

async fn flush(batch: &mut Vec<EventLogEntry>, db_path: &PathBuf, events_dir: &PathBuf) {
    if batch.is_empty() {
        return;
    }
    let entries = std::mem::take(batch);
    let db_path_owned = db_path.clone();
    let events_dir_owned = events_dir.clone();
    let entries_for_retry = entries.clone();
    let result = tokio::task::spawn_blocking(move || {
        jsonl::append_batch(&events_dir_owned, &db_path_owned, &entries)
    })
    .await;
    match result {
        Ok(Ok(())) => {}
        Ok(Err(err)) => {
            error!("event log flush failed, retrying next batch: {err}");
            *batch = entries_for_retry;
        }
        Err(join_err) => {
            error!("event log flush task panicked: {join_err}");
            *batch = entries_for_retry;
        }
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;

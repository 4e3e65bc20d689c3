// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::config::{Paths, StorageSettings};
use ksi_core::Event;
use tempfile::tempdir;

fn open_log(dir: &std::path::Path) -> EventLog {
    let paths = Paths::rooted_at(dir.to_path_buf());
    EventLog::open(&paths, StorageSettings::default()).unwrap()
}

#[tokio::test]
async fn append_is_immediately_visible_in_ring() {
    let dir = tempdir().unwrap();
    let log = open_log(dir.path());
    let ev = Event::new("system:health", serde_json::json!({}), 1.0);
    log.append(&ev);
    let snapshot = log.ring_snapshot(None);
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].event_name, "system:health");
}

#[tokio::test]
async fn append_eventually_lands_in_durable_index() {
    let dir = tempdir().unwrap();
    let log = open_log(dir.path());
    for i in 0..5 {
        let ev = Event::new("state:get", serde_json::json!({"i": i}), 1.0 + i as f64);
        log.append(&ev);
    }
    // Let the writer task's timer tick flush the batch.
    tokio::time::sleep(std::time::Duration::from_millis(350)).await;
    let rows = log
        .query_metadata(&EventQuery {
            event_patterns: vec!["state:*".to_string()],
            ..Default::default()
        })
        .unwrap();
    assert_eq!(rows.len(), 5);
}

#[tokio::test]
async fn ring_overflow_increments_dropped_counter() {
    let dir = tempdir().unwrap();
    let paths = Paths::rooted_at(dir.path().to_path_buf());
    let mut settings = StorageSettings::default();
    settings.ring_capacity = 2;
    let log = EventLog::open(&paths, settings).unwrap();
    for i in 0..5 {
        log.append(&Event::new("system:health", serde_json::json!({"i": i}), 1.0));
    }
    assert_eq!(log.dropped_count(), 3);
    assert_eq!(log.ring_snapshot(None).len(), 2);
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::tempdir;

fn entry(name: &str, ts: f64) -> EventLogEntry {
    EventLogEntry {
        timestamp: ts,
        event_name: name.to_string(),
        event_type: "system".to_string(),
        originator_id: None,
        construct_id: None,
        correlation_id: None,
        event_id: format!("evt-{name}"),
        request_id: None,
        session_id: None,
        status: None,
        model: None,
        purpose: None,
        data: serde_json::json!({"n": name}),
        payload_refs: Default::default(),
    }
}

#[test]
fn append_batch_writes_lines_and_index_rows() {
    let dir = tempdir().unwrap();
    let events_dir = dir.path().join("events");
    let db_path = dir.path().join("events.db");
    sqlite::init_schema(&db_path).unwrap();

    let batch = vec![entry("a", 1_785_024_000.0), entry("b", 1_785_024_001.0)];
    append_batch(&events_dir, &db_path, &batch).unwrap();

    let file_path = events_dir.join("2026-07-26").join("events.jsonl");
    let contents = std::fs::read_to_string(&file_path).unwrap();
    assert_eq!(contents.lines().count(), 2);

    let rows = query(
        &db_path,
        &EventQuery { event_patterns: vec!["*".to_string()], ..Default::default() },
    )
    .unwrap();
    assert_eq!(rows.len(), 2);
}

#[test]
fn append_batch_buckets_by_utc_date() {
    let dir = tempdir().unwrap();
    let events_dir = dir.path().join("events");
    let db_path = dir.path().join("events.db");
    sqlite::init_schema(&db_path).unwrap();

    // One day apart.
    let batch = vec![entry("a", 1_785_024_000.0), entry("b", 1_785_024_000.0 + 86_400.0)];
    append_batch(&events_dir, &db_path, &batch).unwrap();

    assert!(events_dir.join("2026-07-26").join("events.jsonl").exists());
    assert!(events_dir.join("2026-07-27").join("events.jsonl").exists());
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::tempdir;

fn entry(name: &str, originator: Option<&str>) -> EventLogEntry {
    EventLogEntry {
        timestamp: 1.0,
        event_name: name.to_string(),
        event_type: "system".to_string(),
        originator_id: originator.map(str::to_string),
        construct_id: None,
        correlation_id: None,
        event_id: "evt-1".to_string(),
        request_id: None,
        session_id: None,
        status: None,
        model: None,
        purpose: None,
        data: serde_json::json!({"k": "v"}),
        payload_refs: Default::default(),
    }
}

#[test]
fn query_filters_by_glob_and_originator() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("events.db");
    init_schema(&db_path).unwrap();
    let conn = open(&db_path).unwrap();
    insert(&conn, &entry("completion:async", Some("agt-1")), "f1", 0).unwrap();
    insert(&conn, &entry("state:get", Some("agt-2")), "f1", 10).unwrap();

    let rows = query(
        &db_path,
        &EventQuery { event_patterns: vec!["completion:*".to_string()], ..Default::default() },
    )
    .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].event_name, "completion:async");

    let rows = query(
        &db_path,
        &EventQuery { originator_id: Some("agt-2".to_string()), ..Default::default() },
    )
    .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].event_name, "state:get");
}

#[test]
fn query_orders_newest_first_and_respects_limit() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("events.db");
    init_schema(&db_path).unwrap();
    let conn = open(&db_path).unwrap();
    for (i, name) in ["a", "b", "c"].iter().enumerate() {
        let mut e = entry(name, None);
        e.timestamp = i as f64;
        insert(&conn, &e, "f1", i as u64).unwrap();
    }
    let rows =
        query(&db_path, &EventQuery { limit: Some(2), ..Default::default() }).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].event_name, "c");
    assert_eq!(rows[1].event_name, "b");
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn entry(name: &str) -> EventLogEntry {
    EventLogEntry {
        timestamp: 1.0,
        event_name: name.to_string(),
        event_type: "system".to_string(),
        originator_id: None,
        construct_id: None,
        correlation_id: None,
        event_id: "evt-1".to_string(),
        request_id: None,
        session_id: None,
        status: None,
        model: None,
        purpose: None,
        data: serde_json::json!({}),
        payload_refs: Default::default(),
    }
}

#[test]
fn push_does_not_drop_below_capacity() {
    let mut ring = Ring::new(3);
    assert!(!ring.push(entry("a")));
    assert!(!ring.push(entry("b")));
    assert_eq!(ring.len(), 2);
}

#[test]
fn push_drops_oldest_when_full() {
    let mut ring = Ring::new(2);
    ring.push(entry("a"));
    ring.push(entry("b"));
    assert!(ring.push(entry("c")));
    let names: Vec<_> = ring.snapshot(None).into_iter().map(|e| e.event_name).collect();
    assert_eq!(names, vec!["c", "b"]);
}

#[test]
fn snapshot_is_newest_first_and_respects_limit() {
    let mut ring = Ring::new(10);
    for name in ["a", "b", "c"] {
        ring.push(entry(name));
    }
    let names: Vec<_> = ring.snapshot(Some(2)).into_iter().map(|e| e.event_name).collect();
    assert_eq!(names, vec!["c", "b"]);
}

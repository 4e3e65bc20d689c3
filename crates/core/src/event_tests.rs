// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn split_name_separates_namespace_and_verb() {
    assert_eq!(split_name("completion:async"), ("completion", "async"));
    assert_eq!(split_name("system:health"), ("system", "health"));
}

#[test]
fn split_name_handles_missing_colon() {
    assert_eq!(split_name("noNamespace"), ("", "noNamespace"));
}

#[test]
fn new_event_exposes_namespace_and_verb() {
    let ev = Event::new("agent:spawn", serde_json::json!({"agent_id": "a"}), 100.0);
    assert_eq!(ev.namespace(), "agent");
    assert_eq!(ev.verb(), "spawn");
    assert!(ev.correlation_id.is_none());
}

#[test]
fn event_round_trips_through_json() {
    let ev = Event::new("state:get", serde_json::json!({"key": "k"}), 42.5);
    let encoded = serde_json::to_string(&ev).unwrap();
    let decoded: Event = serde_json::from_str(&encoded).unwrap();
    assert_eq!(decoded.name, "state:get");
    assert_eq!(decoded.timestamp, 42.5);
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn serializes_all_fields_when_correlation_present() {
    let frame = PushFrame::new("agent:status", serde_json::json!({"id": "a1"}), 123.0)
        .with_correlation("corr-1");
    let json = serde_json::to_value(&frame).unwrap();
    assert_eq!(json["event"], "agent:status");
    assert_eq!(json["timestamp"], 123.0);
    assert_eq!(json["correlation_id"], "corr-1");
}

#[test]
fn omits_correlation_id_when_absent() {
    let frame = PushFrame::new("agent:status", serde_json::json!({}), 1.0);
    let json = serde_json::to_value(&frame).unwrap();
    assert!(json.get("correlation_id").is_none());
}

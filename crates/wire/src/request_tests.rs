// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn deserializes_minimal_request_without_correlation_id() {
    let request: Request = serde_json::from_str(r#"{"event": "state:get", "data": {"key": "k"}}"#).unwrap();
    assert_eq!(request.event, "state:get");
    assert_eq!(request.data, serde_json::json!({"key": "k"}));
    assert!(request.correlation_id.is_none());
}

#[test]
fn serializes_without_correlation_id_when_absent() {
    let request = Request::new("ping", serde_json::json!({}));
    let json = serde_json::to_value(&request).unwrap();
    assert!(json.get("correlation_id").is_none());
}

#[test]
fn with_correlation_roundtrips() {
    let request = Request::new("ping", serde_json::json!({})).with_correlation("corr-1");
    let json = serde_json::to_string(&request).unwrap();
    let back: Request = serde_json::from_str(&json).unwrap();
    assert_eq!(back.correlation_id.as_deref(), Some("corr-1"));
}

#[test]
fn missing_data_field_defaults_to_null() {
    let request: Request = serde_json::from_str(r#"{"event": "ping"}"#).unwrap();
    assert_eq!(request.data, serde_json::Value::Null);
}

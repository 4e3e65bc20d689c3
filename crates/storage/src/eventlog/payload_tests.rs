// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use ksi_core::Event;
use std::path::PathBuf;

fn event_with(data: Value, session_id: Option<&str>) -> Event {
    let mut ev = Event::new("completion:result", data, 1.0);
    ev.session_id = session_id.map(ksi_core::SessionId::from);
    ev
}

#[test]
fn small_payload_stays_inline() {
    let data = serde_json::json!({"prompt": "hi"});
    let ev = event_with(data.clone(), None);
    let (out, refs) = externalize(&data, 4096, &ev, Path::new("/tmp/responses"));
    assert_eq!(out, data);
    assert!(refs.is_empty());
}

#[test]
fn large_unmaterialized_field_is_stripped() {
    let big = "x".repeat(5000);
    let data = serde_json::json!({"prompt": big});
    let ev = event_with(data.clone(), None);
    let (out, refs) = externalize(&data, 4096, &ev, Path::new("/tmp/responses"));
    assert_eq!(out["prompt"], serde_json::json!("<stripped:5000 chars>"));
    assert!(refs.is_empty());
}

#[test]
fn large_response_field_with_session_becomes_ref() {
    let big = "y".repeat(5000);
    let data = serde_json::json!({"response": big});
    let ev = event_with(data.clone(), Some("ses-abc"));
    let (out, refs) = externalize(&data, 4096, &ev, Path::new("/tmp/responses"));
    let expected_path = PathBuf::from("/tmp/responses/ses-abc.jsonl");
    assert_eq!(out["response"], serde_json::json!(format!("<ref:{}>", expected_path.display())));
    assert_eq!(refs.get("response"), Some(&expected_path.display().to_string()));
}

#[test]
fn boundary_exactly_at_threshold_stays_inline() {
    let data = serde_json::json!({"prompt": "x".repeat(10)});
    let ev = event_with(data.clone(), None);
    let (out, refs) = externalize(&data, 10, &ev, Path::new("/tmp/responses"));
    assert_eq!(out, data);
    assert!(refs.is_empty());
}

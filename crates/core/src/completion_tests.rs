// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn priority_orders_critical_before_background() {
    assert!(Priority::Critical < Priority::High);
    assert!(Priority::High < Priority::Normal);
    assert!(Priority::Normal < Priority::Low);
    assert!(Priority::Low < Priority::Background);
}

#[test]
fn prompt_only_request_is_valid_input() {
    let req = CompletionRequest {
        request_id: RequestId::new(),
        session_id: None,
        prompt: Some("hello".into()),
        messages: None,
        model: "claude-test".into(),
        priority: Priority::Normal,
        max_tokens: None,
        injection_config: None,
        circuit_breaker_config: CircuitBreakerConfig::default(),
        correlation_id: None,
    };
    assert!(req.has_valid_input());
    let json = serde_json::to_value(&req).unwrap();
    assert_eq!(json["prompt"], "hello");
    assert!(json.get("messages").is_none());
}

#[test]
fn request_with_both_or_neither_input_is_invalid() {
    let mut req = CompletionRequest {
        request_id: RequestId::new(),
        session_id: None,
        prompt: None,
        messages: None,
        model: "claude-test".into(),
        priority: Priority::Normal,
        max_tokens: None,
        injection_config: None,
        circuit_breaker_config: CircuitBreakerConfig::default(),
        correlation_id: None,
    };
    assert!(!req.has_valid_input());
    req.prompt = Some("hi".into());
    req.messages = Some(vec![serde_json::json!({"role": "user", "content": "hi"})]);
    assert!(!req.has_valid_input());
}

#[test]
fn default_priority_is_normal() {
    let json = serde_json::json!({
        "request_id": "req-abc",
        "prompt": "hi",
        "model": "claude-test",
    });
    let req: CompletionRequest = serde_json::from_value(json).unwrap();
    assert_eq!(req.priority, Priority::Normal);
}

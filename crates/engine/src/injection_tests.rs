// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use async_trait::async_trait;
use ksi_core::CircuitBreakerConfig;
use ksi_storage::StateStore;
use serde_json::json;

struct RecordingSink {
    events: Mutex<Vec<Event>>,
}

impl RecordingSink {
    fn new() -> Arc<Self> {
        Arc::new(Self { events: Mutex::new(Vec::new()) })
    }

    fn names(&self) -> Vec<String> {
        self.events.lock().iter().map(|e| e.name.clone()).collect()
    }
}

#[async_trait]
impl EventSink for RecordingSink {
    async fn emit(&self, event: Event) {
        self.events.lock().push(event);
    }
}

fn router() -> Arc<InjectionRouter<RecordingSink>> {
    let state = Arc::new(StateStore::open_in_memory().expect("in-memory state store"));
    let breaker = Arc::new(CircuitBreaker::new());
    InjectionRouter::new(state, breaker, RecordingSink::new())
}

fn request_with_config(session_id: SessionId, config: Value) -> CompletionRequest {
    CompletionRequest {
        request_id: RequestId::new(),
        session_id: Some(session_id),
        prompt: Some("do the thing".to_string()),
        messages: None,
        model: "test-model".to_string(),
        priority: Priority::Normal,
        max_tokens: None,
        injection_config: Some(config),
        circuit_breaker_config: CircuitBreakerConfig::default(),
        correlation_id: None,
    }
}

#[tokio::test]
async fn next_mode_stores_content_in_the_state_queue() {
    let router = router();
    let session_id = SessionId::new();
    let request = request_with_config(
        session_id.clone(),
        json!({ "enabled": true, "mode": "next", "position": "prepend" }),
    );
    let request_id = request.request_id;
    router.note_request(&request);

    let outcome = router.handle_completion_result(request_id, "success", Some("the answer")).await;
    assert!(matches!(outcome, InjectionOutcome::Next { stored_count: 1 }));

    let pending = router.list_pending(&session_id, now_seconds());
    assert_eq!(pending.len(), 1);
    assert!(pending[0]["content"].as_str().unwrap().contains("the answer"));
}

#[tokio::test]
async fn direct_mode_returns_synthetic_high_priority_requests() {
    let router = router();
    let session_id = SessionId::new();
    let request = request_with_config(
        session_id.clone(),
        json!({ "enabled": true, "mode": "direct", "position": "prepend" }),
    );
    let request_id = request.request_id;
    router.note_request(&request);

    let outcome = router.handle_completion_result(request_id, "success", Some("the answer")).await;
    match outcome {
        InjectionOutcome::Direct { requests } => {
            assert_eq!(requests.len(), 1);
            assert_eq!(requests[0].session_id, Some(session_id));
            assert_eq!(requests[0].priority, Priority::Critical);
            assert!(requests[0].prompt.as_ref().unwrap().contains("the answer"));
        }
        other => panic!("expected Direct, got {other:?}"),
    }
}

#[tokio::test]
async fn is_injection_flag_blocks_recursive_routing() {
    let router = router();
    let session_id = SessionId::new();
    let request = request_with_config(
        session_id,
        json!({ "enabled": true, "mode": "next", "is_injection": true }),
    );
    let request_id = request.request_id;
    router.note_request(&request);

    let outcome = router.handle_completion_result(request_id, "success", Some("x")).await;
    assert!(matches!(outcome, InjectionOutcome::NotApplicable));
}

#[tokio::test]
async fn disabled_config_is_not_applicable() {
    let router = router();
    let session_id = SessionId::new();
    let request = request_with_config(session_id, json!({ "enabled": false }));
    let request_id = request.request_id;
    router.note_request(&request);

    let outcome = router.handle_completion_result(request_id, "success", Some("x")).await;
    assert!(matches!(outcome, InjectionOutcome::NotApplicable));
}

#[tokio::test]
async fn error_status_never_triggers_injection() {
    let router = router();
    let session_id = SessionId::new();
    let request = request_with_config(session_id, json!({ "enabled": true, "mode": "next" }));
    let request_id = request.request_id;
    router.note_request(&request);

    let outcome = router.handle_completion_result(request_id, "error", None).await;
    assert!(matches!(outcome, InjectionOutcome::NotApplicable));
}

#[tokio::test]
async fn unknown_request_id_is_not_applicable() {
    let router = router();
    let outcome = router.handle_completion_result(RequestId::new(), "success", Some("x")).await;
    assert!(matches!(outcome, InjectionOutcome::NotApplicable));
}

#[tokio::test]
async fn deep_chains_are_blocked_by_the_circuit_breaker() {
    let state = Arc::new(StateStore::open_in_memory().expect("in-memory state store"));
    let breaker = Arc::new(CircuitBreaker::new());
    let mut parent: Option<RequestId> = None;
    let mut last_id = RequestId::new();
    for i in 0..DEFAULT_MAX_DEPTH {
        last_id = RequestId::new();
        breaker.record(last_id, parent, &format!("content {i}"), i as f64);
        parent = Some(last_id);
    }
    let router = InjectionRouter::new(state, breaker, RecordingSink::new());

    let request = request_with_config(SessionId::new(), json!({ "enabled": true, "mode": "next" }));
    let mut request = request;
    request.request_id = last_id;
    router.note_request(&request);

    let outcome = router.handle_completion_result(last_id, "success", Some("x")).await;
    assert!(matches!(
        outcome,
        InjectionOutcome::Blocked(BlockCheck::Depth { depth, max_depth }) if depth == DEFAULT_MAX_DEPTH && max_depth == DEFAULT_MAX_DEPTH
    ));
}

#[tokio::test]
async fn clear_empties_the_pending_queue() {
    let router = router();
    let session_id = SessionId::new();
    let request = request_with_config(session_id.clone(), json!({ "enabled": true, "mode": "next" }));
    let request_id = request.request_id;
    router.note_request(&request);
    router.handle_completion_result(request_id, "success", Some("x")).await;

    assert_eq!(router.list_pending(&session_id, now_seconds()).len(), 1);
    let cleared = router.clear(&session_id).await;
    assert_eq!(cleared, 1);
    assert!(router.list_pending(&session_id, now_seconds()).is_empty());
}

#[tokio::test]
async fn drain_for_session_pops_items_oldest_first() {
    let router = router();
    let session_id = SessionId::new();

    let first = request_with_config(session_id.clone(), json!({ "enabled": true, "mode": "next" }));
    let first_id = first.request_id;
    router.note_request(&first);
    router.handle_completion_result(first_id, "success", Some("first")).await;

    let second = request_with_config(session_id.clone(), json!({ "enabled": true, "mode": "next" }));
    let second_id = second.request_id;
    router.note_request(&second);
    router.handle_completion_result(second_id, "success", Some("second")).await;

    let drained = router.drain_for_session(&session_id, now_seconds()).await;
    assert_eq!(drained.len(), 2);
    assert!(drained[0]["content"].as_str().unwrap().contains("first"));
    assert!(drained[1]["content"].as_str().unwrap().contains("second"));
    assert!(router.drain_for_session(&session_id, now_seconds()).await.is_empty());
}

#[tokio::test]
async fn inject_batch_queues_one_entry_per_target() {
    let router = router();
    let sessions = vec![SessionId::new(), SessionId::new(), SessionId::new()];

    let stored = router
        .inject_batch("heads up", InjectionPosition::Prepend, "general", 60.0, &sessions)
        .await;
    assert_eq!(stored, sessions.len());

    for session_id in &sessions {
        let drained = router.drain_for_session(session_id, now_seconds()).await;
        assert_eq!(drained.len(), 1);
        assert!(drained[0]["content"].as_str().unwrap().contains("heads up"));
    }
}

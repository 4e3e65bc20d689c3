// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use ksi_core::{CircuitBreakerConfig, CompletionRequest, Priority, RequestId, SessionId};
use ksi_storage::config::Paths;
use std::time::Duration;

struct MockProvider {
    output: Result<ProviderOutput, KsiError>,
    delay: Duration,
}

impl MockProvider {
    fn success(text: &str) -> Self {
        Self {
            output: Ok(ProviderOutput {
                result: Some(text.to_string()),
                content: None,
                session_id: None,
                duration_ms: None,
                total_cost_usd: None,
                is_error: false,
                error_message: None,
            }),
            delay: Duration::ZERO,
        }
    }

    fn forked(text: &str, new_session: &str) -> Self {
        Self {
            output: Ok(ProviderOutput {
                result: Some(text.to_string()),
                content: None,
                session_id: Some(new_session.to_string()),
                duration_ms: None,
                total_cost_usd: None,
                is_error: false,
                error_message: None,
            }),
            delay: Duration::ZERO,
        }
    }

    fn failing() -> Self {
        Self { output: Err(KsiError::Provider("boom".to_string())), delay: Duration::ZERO }
    }

    fn slow(text: &str, delay: Duration) -> Self {
        let mut provider = Self::success(text);
        provider.delay = delay;
        provider
    }
}

#[async_trait]
impl ProviderAdapter for MockProvider {
    async fn run(&self, _invocation: ProviderInvocation) -> Result<ProviderOutput, KsiError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.output.clone()
    }
}

struct RecordingSink {
    events: parking_lot::Mutex<Vec<Event>>,
}

impl RecordingSink {
    fn new() -> Arc<Self> {
        Arc::new(Self { events: parking_lot::Mutex::new(Vec::new()) })
    }

    async fn wait_for(&self, name: &str, timeout: Duration) -> Event {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some(event) = self.events.lock().iter().find(|e| e.name == name).cloned() {
                return event;
            }
            if tokio::time::Instant::now() >= deadline {
                panic!("timed out waiting for {name}");
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    fn count(&self, name: &str) -> usize {
        self.events.lock().iter().filter(|e| e.name == name).count()
    }
}

#[async_trait]
impl EventSink for RecordingSink {
    async fn emit(&self, event: Event) {
        self.events.lock().push(event);
    }
}

fn test_paths() -> (tempfile::TempDir, Arc<Paths>) {
    let dir = tempfile::tempdir().expect("tempdir");
    let paths = Arc::new(Paths::rooted_at(dir.path().to_path_buf()));
    paths.ensure_dirs().expect("ensure dirs");
    (dir, paths)
}

fn sample_request(priority: Priority, session_id: SessionId) -> CompletionRequest {
    CompletionRequest {
        request_id: RequestId::new(),
        session_id: Some(session_id),
        prompt: Some("hello there".to_string()),
        messages: None,
        model: "test-model".to_string(),
        priority,
        max_tokens: None,
        injection_config: None,
        circuit_breaker_config: CircuitBreakerConfig::default(),
        correlation_id: None,
    }
}

fn build_scheduler(
    provider: MockProvider,
    timeout: Duration,
) -> (tempfile::TempDir, Arc<Scheduler<MockProvider, RecordingSink>>, Arc<RecordingSink>) {
    let (dir, paths) = test_paths();
    let breaker = Arc::new(CircuitBreaker::new());
    let sink = RecordingSink::new();
    let scheduler = Scheduler::with_timeout(paths, breaker, Arc::new(provider), Arc::clone(&sink), timeout);
    (dir, scheduler, sink)
}

#[tokio::test]
async fn enqueue_starts_a_worker_and_emits_completion_result() {
    let (_dir, scheduler, sink) = build_scheduler(MockProvider::success("hi"), Duration::from_secs(5));
    let request = sample_request(Priority::Normal, SessionId::new());
    let outcome = scheduler.clone().enqueue(request);
    assert!(matches!(outcome, EnqueueOutcome::Ready { .. }));

    let event = sink.wait_for("completion:result", Duration::from_secs(2)).await;
    assert_eq!(event.data["status"], "success");
    assert_eq!(event.data["result"], "hi");
}

#[tokio::test]
async fn enqueue_blocks_when_circuit_breaker_trips_on_depth() {
    let (_dir, scheduler, _sink) = build_scheduler(MockProvider::success("hi"), Duration::from_secs(5));
    let mut request = sample_request(Priority::Normal, SessionId::new());
    request.circuit_breaker_config.max_depth = Some(0);
    let outcome = scheduler.clone().enqueue(request);
    assert!(matches!(outcome, EnqueueOutcome::Blocked(BlockCheck::Depth { depth: 0, max_depth: 0 })));
}

#[tokio::test]
async fn second_enqueue_for_a_busy_session_is_queued() {
    let (_dir, scheduler, _sink) = build_scheduler(MockProvider::slow("hi", Duration::from_millis(50)), Duration::from_secs(5));
    let session_id = SessionId::new();
    let first = scheduler.clone().enqueue(sample_request(Priority::Normal, session_id.clone()));
    let second = scheduler.clone().enqueue(sample_request(Priority::Normal, session_id));
    assert!(matches!(first, EnqueueOutcome::Ready { .. }));
    assert!(matches!(second, EnqueueOutcome::Queued { queue_depth: 2, .. }));
}

#[tokio::test]
async fn cancel_removes_a_queued_item_before_it_runs() {
    let (_dir, scheduler, sink) =
        build_scheduler(MockProvider::slow("hi", Duration::from_millis(80)), Duration::from_secs(5));
    let session_id = SessionId::new();
    let first = sample_request(Priority::Normal, session_id.clone());
    let second = sample_request(Priority::Normal, session_id);
    let second_id = second.request_id;

    scheduler.clone().enqueue(first);
    scheduler.clone().enqueue(second);

    assert_eq!(scheduler.cancel(&second_id), CancelOutcome::Cancelled);

    sink.wait_for("completion:result", Duration::from_secs(2)).await;
    tokio::time::sleep(Duration::from_millis(120)).await;
    assert_eq!(sink.count("completion:result"), 1);
}

#[tokio::test]
async fn cancel_returns_not_found_for_unknown_request() {
    let (_dir, scheduler, _sink) = build_scheduler(MockProvider::success("hi"), Duration::from_secs(5));
    assert_eq!(scheduler.cancel(&RequestId::new()), CancelOutcome::NotFound);
}

#[tokio::test]
async fn worker_times_out_a_slow_provider() {
    let (_dir, scheduler, sink) =
        build_scheduler(MockProvider::slow("hi", Duration::from_millis(300)), Duration::from_millis(20));
    scheduler.clone().enqueue(sample_request(Priority::Normal, SessionId::new()));
    let event = sink.wait_for("completion:result", Duration::from_secs(2)).await;
    assert_eq!(event.data["status"], "timeout");
}

#[tokio::test]
async fn failing_provider_produces_an_error_status() {
    let (_dir, scheduler, sink) = build_scheduler(MockProvider::failing(), Duration::from_secs(5));
    scheduler.clone().enqueue(sample_request(Priority::Normal, SessionId::new()));
    let event = sink.wait_for("completion:result", Duration::from_secs(2)).await;
    assert_eq!(event.data["status"], "error");
    assert!(event.data["error"].is_string());
}

#[tokio::test]
async fn provider_returning_a_different_session_id_emits_a_fork_event() {
    let (_dir, scheduler, sink) =
        build_scheduler(MockProvider::forked("hi", "ses-newsessionnewsession"), Duration::from_secs(5));
    let original = SessionId::new();
    scheduler.clone().enqueue(sample_request(Priority::Normal, original.clone()));
    let event = sink.wait_for("completion:forked", Duration::from_secs(2)).await;
    assert_eq!(event.data["original_session_id"], original.as_str());
    assert_eq!(event.data["forked_session_id"], "ses-newsessionnewsession");
}

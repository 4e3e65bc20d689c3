// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Completion scheduler: per-session priority queues, one worker per
//! session, conversation locks, fork detection, cancellation, and
//! timeouts (spec.md §4.8).
//!
//! One worker task per live session, spawned on its first queued item and
//! reaped once its queue drains; each session's pending work sits in its
//! own `BinaryHeap` ordered by priority.

use crate::circuit_breaker::{BlockCheck, CircuitBreaker, Limits};
use async_trait::async_trait;
use ksi_core::{
    now_seconds, CompletionRequest, ConversationLock, Event, KsiError, LockState, Priority,
    RequestId, SessionId,
};
use ksi_adapters::{ProviderAdapter, ProviderInvocation, ProviderOutput};
use ksi_storage::Paths;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::json;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{info, warn};

const DEFAULT_COMPLETION_TIMEOUT: Duration = Duration::from_secs(300);

/// Where the scheduler sends `completion:result` (and `completion:forked`)
/// once a worker finishes an item. The daemon implements this over its
/// own `Router`/context pair so the scheduler never needs to know the
/// router's context type.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn emit(&self, event: Event);
}

/// Outcome of `Scheduler::enqueue` (spec.md §4.8).
#[derive(Debug, Clone, PartialEq)]
pub enum EnqueueOutcome {
    Blocked(BlockCheck),
    /// A worker was already running for this session; the item waits
    /// behind `queue_depth - 1` others.
    Queued { priority: Priority, queue_depth: usize },
    /// No worker was active; one was just started for this item.
    Ready { priority: Priority, queue_depth: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    Cancelled,
    NotFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CompletionStatus {
    Success,
    Timeout,
    Cancelled,
    Error,
}

struct QueuedItem {
    priority: Priority,
    seq: u64,
    request: CompletionRequest,
}

impl PartialEq for QueuedItem {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for QueuedItem {}

impl PartialOrd for QueuedItem {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedItem {
    /// `Priority`'s derived `Ord` already ranks `Critical` lowest; paired
    /// with `Reverse` in the heap this gives priority-ASC, then
    /// enqueue-order-ASC, matching spec.md §4.8's `(priority_int ASC,
    /// enqueue_timestamp ASC)` ordering.
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.priority.cmp(&other.priority).then_with(|| self.seq.cmp(&other.seq))
    }
}

fn remove_from_heap(heap: &mut BinaryHeap<Reverse<QueuedItem>>, request_id: &RequestId) -> bool {
    let items: Vec<Reverse<QueuedItem>> = heap.drain().collect();
    let before = items.len();
    let kept: Vec<Reverse<QueuedItem>> =
        items.into_iter().filter(|Reverse(item)| item.request.request_id != *request_id).collect();
    let removed = kept.len() < before;
    *heap = kept.into_iter().collect();
    removed
}

fn request_content(request: &CompletionRequest) -> String {
    if let Some(prompt) = &request.prompt {
        return prompt.clone();
    }
    request
        .messages
        .as_ref()
        .and_then(|messages| serde_json::to_string(messages).ok())
        .unwrap_or_default()
}

struct SchedulerState {
    queues: HashMap<SessionId, BinaryHeap<Reverse<QueuedItem>>>,
    active: HashSet<SessionId>,
    locks: HashMap<SessionId, ConversationLock>,
}

#[derive(Serialize)]
struct ResponseLogEntry {
    request_id: RequestId,
    session_id: SessionId,
    status: CompletionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<String>,
    timestamp: f64,
}

pub struct Scheduler<P, S> {
    state: Mutex<SchedulerState>,
    cancel_signals: Mutex<HashMap<RequestId, oneshot::Sender<()>>>,
    next_seq: AtomicU64,
    paths: Arc<Paths>,
    circuit_breaker: Arc<CircuitBreaker>,
    provider: Arc<P>,
    sink: Arc<S>,
    request_timeout: Duration,
}

impl<P, S> Scheduler<P, S>
where
    P: ProviderAdapter + 'static,
    S: EventSink + 'static,
{
    pub fn new(
        paths: Arc<Paths>,
        circuit_breaker: Arc<CircuitBreaker>,
        provider: Arc<P>,
        sink: Arc<S>,
    ) -> Arc<Self> {
        Self::with_timeout(paths, circuit_breaker, provider, sink, DEFAULT_COMPLETION_TIMEOUT)
    }

    pub fn with_timeout(
        paths: Arc<Paths>,
        circuit_breaker: Arc<CircuitBreaker>,
        provider: Arc<P>,
        sink: Arc<S>,
        request_timeout: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(SchedulerState {
                queues: HashMap::new(),
                active: HashSet::new(),
                locks: HashMap::new(),
            }),
            cancel_signals: Mutex::new(HashMap::new()),
            next_seq: AtomicU64::new(0),
            paths,
            circuit_breaker,
            provider,
            sink,
            request_timeout,
        })
    }

    /// `completion:async` / `completion:inject`'s shared enqueue path
    /// (spec.md §4.8). Runs the circuit breaker first; a blocked request
    /// never touches the queue or the chain tracker.
    pub fn enqueue(self: Arc<Self>, request: CompletionRequest) -> EnqueueOutcome {
        let now = now_seconds();
        let content = request_content(&request);
        let limits = Limits {
            max_depth: request.circuit_breaker_config.max_depth.unwrap_or(crate::circuit_breaker::DEFAULT_MAX_DEPTH),
            token_budget: request
                .circuit_breaker_config
                .token_budget
                .unwrap_or(crate::circuit_breaker::DEFAULT_TOKEN_BUDGET),
            time_window_s: request
                .circuit_breaker_config
                .time_window_s
                .unwrap_or(crate::circuit_breaker::DEFAULT_TIME_WINDOW_S),
        };
        let parent_id = request.circuit_breaker_config.parent_request_id.as_ref();

        if let Some(check) = self.circuit_breaker.evaluate(parent_id, &content, now, limits) {
            return EnqueueOutcome::Blocked(check);
        }
        self.circuit_breaker.record(
            request.request_id,
            request.circuit_breaker_config.parent_request_id,
            &content,
            now,
        );

        let session_id = request.session_id.clone().unwrap_or_else(SessionId::new);
        let priority = request.priority;
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let item = QueuedItem { priority, seq, request };

        let mut state = self.state.lock();
        let queue_depth = {
            let heap = state.queues.entry(session_id.clone()).or_default();
            heap.push(Reverse(item));
            heap.len()
        };
        let started = state.active.insert(session_id.clone());
        drop(state);

        if started {
            tokio::spawn(async move { self.run_worker(session_id).await });
            EnqueueOutcome::Ready { priority, queue_depth }
        } else {
            EnqueueOutcome::Queued { priority, queue_depth }
        }
    }

    /// `completion:cancel`: remove a queued item outright, or signal an
    /// in-flight one to stop (spec.md §4.8).
    pub fn cancel(&self, request_id: &RequestId) -> CancelOutcome {
        {
            let mut state = self.state.lock();
            for heap in state.queues.values_mut() {
                if remove_from_heap(heap, request_id) {
                    return CancelOutcome::Cancelled;
                }
            }
        }
        if let Some(tx) = self.cancel_signals.lock().remove(request_id) {
            let _ = tx.send(());
            return CancelOutcome::Cancelled;
        }
        CancelOutcome::NotFound
    }

    fn dequeue(&self, session_id: &SessionId) -> Option<CompletionRequest> {
        let mut state = self.state.lock();
        let Some(heap) = state.queues.get_mut(session_id) else {
            state.active.remove(session_id);
            return None;
        };
        match heap.pop() {
            Some(Reverse(item)) => Some(item.request),
            None => {
                state.queues.remove(session_id);
                state.active.remove(session_id);
                None
            }
        }
    }

    fn acquire_lock(&self, session_id: &SessionId, request_id: RequestId, now: f64) {
        let mut state = self.state.lock();
        let lock = state
            .locks
            .entry(session_id.clone())
            .or_insert_with(|| ConversationLock::unlocked(session_id.clone()));
        lock.state = LockState::Locked;
        lock.holder_request_id = Some(request_id);
        lock.acquired_at = Some(now);
    }

    fn release_lock(&self, session_id: &SessionId) {
        let mut state = self.state.lock();
        if let Some(lock) = state.locks.get_mut(session_id) {
            if lock.state != LockState::Forked {
                lock.state = LockState::Unlocked;
            }
            lock.holder_request_id = None;
            lock.acquired_at = None;
        }
    }

    fn mark_forked(&self, original: &SessionId, new_session: &SessionId, holder: RequestId, now: f64) {
        let mut state = self.state.lock();
        if let Some(lock) = state.locks.get_mut(original) {
            lock.state = LockState::Forked;
            lock.child_session_ids.push(new_session.clone());
        }
        let mut new_lock = ConversationLock::unlocked(new_session.clone());
        new_lock.state = LockState::Locked;
        new_lock.holder_request_id = Some(holder);
        new_lock.acquired_at = Some(now);
        new_lock.parent_session_id = Some(original.clone());
        state.locks.insert(new_session.clone(), new_lock);
    }

    fn append_response_log(&self, entry: &ResponseLogEntry) {
        let path = self.paths.response_log(entry.session_id.as_str());
        let Ok(line) = serde_json::to_string(entry) else { return };
        let Some(parent) = path.parent() else { return };
        if std::fs::create_dir_all(parent).is_err() {
            return;
        }
        match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(mut file) => {
                let _ = writeln!(file, "{line}");
            }
            Err(err) => warn!(%err, path = %path.display(), "failed to append response log"),
        }
    }

    /// Drain `session_id`'s queue one item at a time until empty, then
    /// exit (spec.md §4.8 step 7: "GC empty queues periodically" is
    /// satisfied here by simply not persisting an idle worker).
    async fn run_worker(self: Arc<Self>, session_id: SessionId) {
        while let Some(request) = self.dequeue(&session_id) {
            self.process_one(&session_id, request).await;
        }
    }

    async fn process_one(&self, session_id: &SessionId, request: CompletionRequest) {
        let request_id = request.request_id;
        let now = now_seconds();
        self.acquire_lock(session_id, request_id, now);

        let (cancel_tx, mut cancel_rx) = oneshot::channel();
        self.cancel_signals.lock().insert(request_id, cancel_tx);

        let invocation = ProviderInvocation {
            model: request.model.clone(),
            prompt: request_content(&request),
            session_id: request.session_id.clone(),
            working_dir: None,
            timeout: self.request_timeout,
        };

        let outcome = tokio::select! {
            result = tokio::time::timeout(self.request_timeout, self.provider.run(invocation)) => {
                match result {
                    Ok(inner) => Outcome::Finished(inner),
                    Err(_) => Outcome::TimedOut,
                }
            }
            _ = &mut cancel_rx => Outcome::Cancelled,
        };
        self.cancel_signals.lock().remove(&request_id);

        let (status, result_text, error) = match &outcome {
            Outcome::Finished(Ok(output)) => (CompletionStatus::Success, output.text().map(str::to_owned), None),
            Outcome::Finished(Err(err)) => (CompletionStatus::Error, None, Some(err.to_string())),
            Outcome::TimedOut => (CompletionStatus::Timeout, None, None),
            Outcome::Cancelled => (CompletionStatus::Cancelled, None, None),
        };

        let effective_session = request.session_id.clone().unwrap_or_else(|| session_id.clone());
        self.append_response_log(&ResponseLogEntry {
            request_id,
            session_id: effective_session.clone(),
            status,
            result: result_text.clone(),
            timestamp: now_seconds(),
        });

        if let Outcome::Finished(Ok(output)) = &outcome {
            if let (Some(requested), Some(returned)) = (&request.session_id, output.session_id.as_ref()) {
                if requested.as_str() != returned {
                    let forked_into = SessionId::from_string(returned.as_str());
                    self.mark_forked(requested, &forked_into, request_id, now_seconds());
                    warn!(request_id = %request_id, original = %requested, forked = %forked_into, "provider forked session");
                    self.sink
                        .emit(Event::new(
                            "completion:forked",
                            json!({
                                "request_id": request_id,
                                "original_session_id": requested,
                                "forked_session_id": forked_into,
                            }),
                            now_seconds(),
                        ))
                        .await;
                }
            }
        }

        info!(request_id = %request_id, session_id = %effective_session, status = ?status, "completion finished");
        self.sink
            .emit(Event::new(
                "completion:result",
                json!({
                    "request_id": request_id,
                    "session_id": effective_session,
                    "result": result_text,
                    "status": status,
                    "error": error,
                }),
                now_seconds(),
            ))
            .await;

        self.release_lock(session_id);
    }
}

enum Outcome {
    Finished(Result<ProviderOutput, KsiError>),
    TimedOut,
    Cancelled,
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;

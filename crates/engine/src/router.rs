// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event router: pattern dispatch, log-then-ack durability, correlation
//! linking, and the `monitor:subscribe` broadcast fan-out (spec.md §4.1).

use async_trait::async_trait;
use ksi_core::{CorrelationId, Event, KsiError};
use ksi_storage::{CorrelationStore, EventLog};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, warn};

/// One event handler. `C` is the caller-supplied context type threaded to
/// every handler (daemon wires this up with its shared state and, for
/// handlers that need to emit further events, a back-reference to the
/// router itself).
#[async_trait]
pub trait Handler<C>: Send + Sync {
    async fn handle(&self, ctx: &C, event: &Event) -> Result<Value, KsiError>;
}

/// A subscriber registered via `monitor:subscribe`. Patterns use the same
/// exact/`ns:*`-suffix matching as handler registration.
struct Subscription {
    id: u64,
    patterns: Vec<String>,
    sender: mpsc::Sender<Event>,
}

fn pattern_matches(pattern: &str, name: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => name.starts_with(prefix),
        None => pattern == name,
    }
}

/// Buffered pushes a subscriber may have outstanding before the router
/// drops it as too slow to keep up (spec.md §4.1).
const SUBSCRIBER_BUFFER: usize = 256;

pub struct Router<C> {
    exact: HashMap<String, Vec<Arc<dyn Handler<C>>>>,
    globs: Vec<(String, Arc<dyn Handler<C>>)>,
    event_log: Arc<EventLog>,
    correlation: Arc<CorrelationStore>,
    subscriptions: parking_lot::Mutex<Vec<Subscription>>,
    next_subscription_id: AtomicU64,
    default_timeout: Duration,
}

impl<C: Send + Sync> Router<C> {
    pub fn new(event_log: Arc<EventLog>, correlation: Arc<CorrelationStore>) -> Self {
        Self::with_timeout(event_log, correlation, Duration::from_secs(30))
    }

    pub fn with_timeout(
        event_log: Arc<EventLog>,
        correlation: Arc<CorrelationStore>,
        default_timeout: Duration,
    ) -> Self {
        Self {
            exact: HashMap::new(),
            globs: Vec::new(),
            event_log,
            correlation,
            subscriptions: parking_lot::Mutex::new(Vec::new()),
            next_subscription_id: AtomicU64::new(1),
            default_timeout,
        }
    }

    /// Register a handler for an exact event name or a `ns:*` glob.
    /// Duplicate exact registrations form an ordered list; every handler
    /// in it runs and contributes to the aggregated response.
    pub fn register(&mut self, pattern: impl Into<String>, handler: Arc<dyn Handler<C>>) {
        let pattern = pattern.into();
        if pattern.ends_with('*') {
            self.globs.push((pattern, handler));
        } else {
            self.exact.entry(pattern).or_default().push(handler);
        }
    }

    fn resolve(&self, name: &str) -> Vec<Arc<dyn Handler<C>>> {
        let mut out = Vec::new();
        if let Some(handlers) = self.exact.get(name) {
            out.extend(handlers.iter().cloned());
        }
        for (pattern, handler) in &self.globs {
            if pattern_matches(pattern, name) {
                out.push(Arc::clone(handler));
            }
        }
        out
    }

    /// Register a streaming subscriber for `monitor:subscribe`. Returns
    /// the channel the transport layer reads pushes from.
    pub fn subscribe(&self, patterns: Vec<String>) -> (u64, mpsc::Receiver<Event>) {
        let id = self.next_subscription_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::channel(SUBSCRIBER_BUFFER);
        self.subscriptions.lock().push(Subscription { id, patterns, sender });
        (id, receiver)
    }

    pub fn unsubscribe(&self, id: u64) {
        self.subscriptions.lock().retain(|s| s.id != id);
    }

    fn broadcast(&self, event: &Event) {
        let mut subs = self.subscriptions.lock();
        subs.retain(|sub| {
            if !sub.patterns.iter().any(|p| pattern_matches(p, &event.name)) {
                return true;
            }
            match sub.sender.try_send(event.clone()) {
                Ok(()) => true,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(subscriber_id = sub.id, "dropping slow monitor:subscribe writer");
                    false
                }
                Err(mpsc::error::TrySendError::Closed(_)) => false,
            }
        });
    }

    /// Ensure `event` carries a correlation id, begin its trace (linked
    /// to `parent` if given), and record it in the event log before any
    /// handler observes it -- the log-then-ack guarantee (spec.md §4.1).
    fn prepare(&self, mut event: Event, parent: Option<CorrelationId>) -> (Event, CorrelationId) {
        let id = event.correlation_id.unwrap_or_else(CorrelationId::new);
        event.correlation_id = Some(id);
        self.correlation.begin(id, event.name.clone(), event.data.clone(), parent, event.timestamp);
        self.event_log.append(&event);
        self.broadcast(&event);
        (event, id)
    }

    fn finish(&self, id: CorrelationId, responses: &[Value], now: f64) {
        let error = responses.iter().find_map(|r| r.get("error").and_then(Value::as_str)).map(str::to_owned);
        let result = serde_json::Value::Array(responses.to_vec());
        self.correlation.end(&id, Some(result), error, now);
    }

    /// Run every registered handler for `event.name`, awaiting each with
    /// the router's default timeout, and return the non-null responses
    /// in registration order.
    pub async fn emit(&self, ctx: &C, event: Event, parent: Option<CorrelationId>) -> Vec<Value> {
        let now = event.timestamp;
        let (event, id) = self.prepare(event, parent);
        let handlers = self.resolve(&event.name);
        let mut responses = Vec::new();
        for handler in &handlers {
            match tokio::time::timeout(self.default_timeout, handler.handle(ctx, &event)).await {
                Ok(Ok(Value::Null)) => {}
                Ok(Ok(value)) => responses.push(value),
                Ok(Err(err)) => {
                    error!(event = %event.name, error = %err, "handler error");
                    responses.push(err.to_response());
                }
                Err(_) => {
                    let timeout_err = KsiError::Timeout(event.name.clone());
                    error!(event = %event.name, "handler timed out");
                    responses.push(timeout_err.to_response());
                }
            }
        }
        self.finish(id, &responses, now);
        responses
    }

    /// Like [`Router::emit`], but returns the first non-null response
    /// and stops invoking further handlers.
    pub async fn emit_first(
        &self,
        ctx: &C,
        event: Event,
        parent: Option<CorrelationId>,
    ) -> Option<Value> {
        let now = event.timestamp;
        let (event, id) = self.prepare(event, parent);
        let handlers = self.resolve(&event.name);
        for handler in &handlers {
            let response = match tokio::time::timeout(self.default_timeout, handler.handle(ctx, &event)).await
            {
                Ok(Ok(Value::Null)) => continue,
                Ok(Ok(value)) => value,
                Ok(Err(err)) => {
                    error!(event = %event.name, error = %err, "handler error");
                    err.to_response()
                }
                Err(_) => {
                    let timeout_err = KsiError::Timeout(event.name.clone());
                    error!(event = %event.name, "handler timed out");
                    timeout_err.to_response()
                }
            };
            self.finish(id, std::slice::from_ref(&response), now);
            return Some(response);
        }
        self.finish(id, &[], now);
        None
    }
}

#[cfg(test)]
#[path = "router_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Injection router: routes async completion results back into a
//! session's next prompt, or directly into a brand-new completion
//! (spec.md §4.10).
//!
//! Grounded on `original_source/injection_router.py`'s
//! `InjectionCircuitBreaker` and mode dispatch; the `asyncio.Queue`
//! consumer loop becomes ordinary async methods here since the daemon's
//! completion handler already runs on a `tokio` task per connection.

use crate::circuit_breaker::{BlockCheck, CircuitBreaker, DEFAULT_MAX_DEPTH};
use crate::scheduler::EventSink;
use ksi_core::{now_seconds, CompletionRequest, Event, Priority, RequestId, SessionId};
use ksi_storage::StateStore;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

pub const INJECTION_NAMESPACE: &str = "injection";
pub const DEFAULT_TTL_SECONDS: f64 = 3_600.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InjectionMode {
    Direct,
    Next,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InjectionPosition {
    Prepend,
    Postscript,
    SystemReminder,
    BeforePrompt,
    AfterPrompt,
}

impl InjectionPosition {
    /// Wraps `content` in `<system-reminder>` tags for the `system_reminder`
    /// position, matching the original's idempotent wrap (doesn't
    /// double-wrap already-tagged content).
    pub fn wrap(self, content: &str) -> String {
        if matches!(self, InjectionPosition::SystemReminder) && !content.trim_start().starts_with("<system-reminder>")
        {
            format!("<system-reminder>\n{content}\n</system-reminder>")
        } else {
            content.to_string()
        }
    }
}

fn default_mode() -> InjectionMode {
    InjectionMode::Next
}

fn default_position() -> InjectionPosition {
    InjectionPosition::Prepend
}

fn default_trigger_type() -> String {
    "general".to_string()
}

fn default_ttl() -> f64 {
    DEFAULT_TTL_SECONDS
}

/// Parsed from `CompletionRequest::injection_config`'s free-form `Value`.
#[derive(Debug, Clone, Deserialize)]
pub struct InjectionConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Set on the synthetic follow-up requests this router itself
    /// creates, so a completion it injected never triggers another
    /// round (spec.md §4.10's recursion guard).
    #[serde(default)]
    pub is_injection: bool,
    #[serde(default = "default_mode")]
    pub mode: InjectionMode,
    #[serde(default = "default_position")]
    pub position: InjectionPosition,
    #[serde(default = "default_trigger_type")]
    pub trigger_type: String,
    #[serde(default)]
    pub follow_up_guidance: Option<String>,
    #[serde(default)]
    pub target_sessions: Vec<SessionId>,
    #[serde(default = "default_ttl")]
    pub ttl_seconds: f64,
}

impl InjectionConfig {
    pub fn from_value(value: &Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }
}

struct RequestMetadata {
    injection_config: InjectionConfig,
    session_id: Option<SessionId>,
}

/// Outcome of routing a single `completion:result` (spec.md §4.10).
#[derive(Debug)]
pub enum InjectionOutcome {
    /// No injection metadata, injection disabled, or this was itself an
    /// injected completion (recursion guard).
    NotApplicable,
    Blocked(BlockCheck),
    Direct { requests: Vec<CompletionRequest> },
    Next { stored_count: usize },
}

pub struct InjectionRouter<S> {
    state: Arc<StateStore>,
    circuit_breaker: Arc<CircuitBreaker>,
    sink: Arc<S>,
    metadata: Mutex<HashMap<RequestId, RequestMetadata>>,
}

impl<S> InjectionRouter<S>
where
    S: EventSink + 'static,
{
    pub fn new(state: Arc<StateStore>, circuit_breaker: Arc<CircuitBreaker>, sink: Arc<S>) -> Arc<Self> {
        Arc::new(Self { state, circuit_breaker, sink, metadata: Mutex::new(HashMap::new()) })
    }

    /// Recorded by the completion handler before a request is enqueued,
    /// so `handle_completion_result` has something to look up once the
    /// provider replies. Requests without `injection_config` (or with an
    /// unparseable one) are simply never tracked.
    pub fn note_request(&self, request: &CompletionRequest) {
        let Some(config_value) = &request.injection_config else { return };
        let Some(config) = InjectionConfig::from_value(config_value) else {
            warn!(request_id = %request.request_id, "unparseable injection_config, ignoring");
            return;
        };
        self.metadata.lock().insert(
            request.request_id,
            RequestMetadata { injection_config: config, session_id: request.session_id.clone() },
        );
    }

    /// Called on every `completion:result`. `status` is the wire-visible
    /// status string the scheduler emitted (`"success"`, `"error"`, ...);
    /// injection only runs for a successful result.
    pub async fn handle_completion_result(
        &self,
        request_id: RequestId,
        status: &str,
        result_text: Option<&str>,
    ) -> InjectionOutcome {
        if status != "success" {
            return InjectionOutcome::NotApplicable;
        }
        let Some(metadata) = self.metadata.lock().remove(&request_id) else {
            return InjectionOutcome::NotApplicable;
        };
        let config = metadata.injection_config;
        if !config.enabled || config.is_injection {
            return InjectionOutcome::NotApplicable;
        }

        let max_depth = DEFAULT_MAX_DEPTH;
        let depth = self.circuit_breaker.calculate_depth(Some(&request_id));
        if depth >= max_depth {
            warn!(%request_id, depth, max_depth, "injection blocked by circuit breaker");
            self.sink
                .emit(Event::new(
                    "injection:blocked",
                    json!({ "request_id": request_id, "reason": "circuit_breaker" }),
                    now_seconds(),
                ))
                .await;
            return InjectionOutcome::Blocked(BlockCheck::Depth { depth, max_depth });
        }

        let content = compose_injection_content(result_text.unwrap_or_default(), &config, depth, max_depth);
        let targets: Vec<SessionId> = if config.target_sessions.is_empty() {
            metadata.session_id.into_iter().collect()
        } else {
            config.target_sessions.clone()
        };

        match config.mode {
            InjectionMode::Direct => self.inject_direct(request_id, &content, &config, &targets).await,
            InjectionMode::Next => self.inject_next(request_id, &content, &config, &targets).await,
        }
    }

    async fn inject_direct(
        &self,
        request_id: RequestId,
        content: &str,
        config: &InjectionConfig,
        targets: &[SessionId],
    ) -> InjectionOutcome {
        let wrapped = config.position.wrap(content);
        let mut requests = Vec::with_capacity(targets.len());
        for target in targets {
            requests.push(CompletionRequest {
                request_id: RequestId::new(),
                session_id: Some(target.clone()),
                prompt: Some(wrapped.clone()),
                messages: None,
                model: String::new(),
                priority: Priority::Critical,
                max_tokens: None,
                injection_config: Some(json!({ "enabled": false, "is_injection": true })),
                circuit_breaker_config: ksi_core::CircuitBreakerConfig {
                    parent_request_id: Some(request_id),
                    ..Default::default()
                },
                correlation_id: None,
            });
            self.sink
                .emit(Event::new(
                    "injection:queued",
                    json!({ "request_id": request_id, "session_id": target, "mode": "direct" }),
                    now_seconds(),
                ))
                .await;
        }
        info!(%request_id, count = requests.len(), "queued direct injections");
        InjectionOutcome::Direct { requests }
    }

    async fn inject_next(
        &self,
        request_id: RequestId,
        content: &str,
        config: &InjectionConfig,
        targets: &[SessionId],
    ) -> InjectionOutcome {
        let wrapped = config.position.wrap(content);
        let now = now_seconds();
        let mut stored_count = 0;
        for target in targets {
            let data = json!({
                "content": wrapped,
                "position": config.position,
                "trigger_type": config.trigger_type,
                "parent_request_id": request_id,
            });
            let expires_at = Some(now + config.ttl_seconds);
            if self.state.queue_push(INJECTION_NAMESPACE, target.as_str(), data, expires_at, now).await.is_ok() {
                stored_count += 1;
                self.sink
                    .emit(Event::new(
                        "injection:stored",
                        json!({ "request_id": request_id, "session_id": target, "mode": "next", "position": config.position }),
                        now_seconds(),
                    ))
                    .await;
            } else {
                warn!(%request_id, session_id = %target, "failed to store next-mode injection");
            }
        }
        info!(%request_id, stored_count, "stored next-mode injections");
        InjectionOutcome::Next { stored_count }
    }

    /// Queues `content` for next-turn delivery into every session in
    /// `targets`, independent of any in-flight completion (spec.md §6.4's
    /// `injection:batch`). Each target gets its own queue entry so a
    /// `drain_for_session` miss on one session never affects the others.
    pub async fn inject_batch(
        &self,
        content: &str,
        position: InjectionPosition,
        trigger_type: &str,
        ttl_seconds: f64,
        targets: &[SessionId],
    ) -> usize {
        let wrapped = position.wrap(content);
        let now = now_seconds();
        let mut stored_count = 0;
        for target in targets {
            let data = json!({
                "content": wrapped,
                "position": position,
                "trigger_type": trigger_type,
                "parent_request_id": Value::Null,
            });
            let expires_at = Some(now + ttl_seconds);
            if self.state.queue_push(INJECTION_NAMESPACE, target.as_str(), data, expires_at, now).await.is_ok() {
                stored_count += 1;
                self.sink
                    .emit(Event::new(
                        "injection:stored",
                        json!({ "session_id": target, "mode": "batch", "position": position }),
                        now_seconds(),
                    ))
                    .await;
            } else {
                warn!(session_id = %target, "failed to store batch injection");
            }
        }
        info!(stored_count, target_count = targets.len(), "stored batch injections");
        stored_count
    }

    /// Drains every pending next-mode injection for `session_id`, oldest
    /// first, for the completion handler to fold into the next prompt.
    pub async fn drain_for_session(&self, session_id: &SessionId, now: f64) -> Vec<Value> {
        let mut out = Vec::new();
        while let Ok(Some(item)) = self.state.queue_pop(INJECTION_NAMESPACE, session_id.as_str(), now).await {
            out.push(item.value);
        }
        out
    }

    pub fn list_pending(&self, session_id: &SessionId, now: f64) -> Vec<Value> {
        self.state.queue_items(INJECTION_NAMESPACE, session_id.as_str(), now).unwrap_or_default().into_iter().map(|i| i.value).collect()
    }

    pub fn list_all_sessions(&self) -> HashMap<String, u64> {
        let now = now_seconds();
        let mut out = HashMap::new();
        let Ok(keys) = self.state.queue_keys(INJECTION_NAMESPACE) else { return out };
        for key in keys {
            if let Ok(length) = self.state.queue_length(INJECTION_NAMESPACE, &key, now) {
                if length > 0 {
                    out.insert(key, length);
                }
            }
        }
        out
    }

    pub async fn clear(&self, session_id: &SessionId) -> u64 {
        self.state.queue_delete(INJECTION_NAMESPACE, session_id.as_str()).await.unwrap_or(0)
    }
}

fn compose_injection_content(result_text: &str, config: &InjectionConfig, depth: u32, max_depth: u32) -> String {
    let guidance = config
        .follow_up_guidance
        .clone()
        .unwrap_or_else(|| "Consider if this requires any follow-up actions.".to_string());
    let boilerplate = trigger_boilerplate(&config.trigger_type);

    let cb_status = if depth > 0 {
        format!("\n## Circuit Breaker Status\n- Injection depth: {depth}/{max_depth}\n")
    } else {
        String::new()
    };

    format!(
        "## Async Completion Result\n\nAn asynchronous completion has returned with the following result:\n\n{result_text}\n\n{boilerplate}\n\n{guidance}\n{cb_status}"
    )
}

fn trigger_boilerplate(trigger_type: &str) -> &'static str {
    match trigger_type {
        "antThinking" => {
            "## Analytical Thinking Trigger\n\nConsider the implications, dependencies, follow-up actions, and risks of this result."
        }
        "coordination" => {
            "## Coordination Trigger\n\nConsider which agents need this information and whether organizational state needs to be synchronized."
        }
        "research" => {
            "## Research Continuation Trigger\n\nConsider what follow-up questions and research directions these findings suggest."
        }
        "memory" => {
            "## Memory Integration Trigger\n\nConsider whether this finding is significant enough to preserve in collective memory."
        }
        _ => "## General Consideration\n\nConsider whether this result warrants any follow-up actions.",
    }
}

#[cfg(test)]
#[path = "injection_tests.rs"]
mod tests;

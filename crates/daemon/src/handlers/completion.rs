// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `completion:*` handlers (spec.md §4.8, §4.10): enqueue, cancel, and the
//! scheduler's own result callback.

use async_trait::async_trait;
use ksi_core::{
    now_seconds, CircuitBreakerConfig, CompletionRequest, CorrelationId, Event, KsiError, Priority,
    RequestId, SessionId,
};
use ksi_engine::{CancelOutcome, Discoverable, DiscoveryRegistry, EnqueueOutcome, Handler, HandlerInfo, InjectionPosition, Router};
use serde_json::{json, Value};

use super::extract;
use crate::context::DaemonCtx;

fn priority_of(data: &Value) -> Priority {
    data.get("priority")
        .and_then(|v| serde_json::from_value(v.clone()).ok())
        .unwrap_or(Priority::Normal)
}

/// Builds a `CompletionRequest` from a `completion:async`/`completion:inject`
/// payload; the two events share every field (spec.md §4.8 treats `inject`
/// as `async` with an implicit `priority: critical`).
fn build_request(data: &Value, default_priority: Priority) -> Result<CompletionRequest, KsiError> {
    let request_id = extract::opt_str(data, "request_id").map(RequestId::from_string).unwrap_or_default();
    let session_id = extract::opt_str(data, "session_id").map(SessionId::from_string);
    let prompt = extract::opt_str(data, "prompt");
    let messages = data.get("messages").and_then(Value::as_array).cloned();
    let model = extract::require_str(data, "model")?;
    let priority = if data.get("priority").is_some() { priority_of(data) } else { default_priority };
    let max_tokens = data.get("max_tokens").and_then(Value::as_u64);
    let injection_config = data.get("injection_config").cloned();
    let circuit_breaker_config: CircuitBreakerConfig = data
        .get("circuit_breaker_config")
        .map(|v| serde_json::from_value(v.clone()))
        .transpose()
        .map_err(|err| KsiError::validation(err.to_string()))?
        .unwrap_or_default();
    let correlation_id = extract::opt_str(data, "correlation_id").map(CorrelationId::from_string);

    let request = CompletionRequest {
        request_id,
        session_id,
        prompt,
        messages,
        model,
        priority,
        max_tokens,
        injection_config,
        circuit_breaker_config,
        correlation_id,
    };
    if !request.has_valid_input() {
        return Err(KsiError::validation("exactly one of `prompt`/`messages` is required"));
    }
    Ok(request)
}

/// Drains queued next-mode injections for `request`'s session and folds
/// them into its prompt per each item's `position` (spec.md §4.10: "the
/// completion handler prepends/appends queued injections to the next real
/// prompt for that session before sending"). Messages-mode requests have
/// no single prompt string to fold into, so their session's queue is left
/// untouched until a prompt-mode request comes through.
async fn apply_pending_injections(ctx: &DaemonCtx, request: &mut CompletionRequest) {
    let (Some(session_id), true) = (request.session_id.clone(), request.prompt.is_some()) else {
        return;
    };
    let pending = ctx.injection.drain_for_session(&session_id, now_seconds()).await;
    if pending.is_empty() {
        return;
    }

    let mut prepend = Vec::new();
    let mut append = Vec::new();
    for item in pending {
        let Some(content) = item.get("content").and_then(Value::as_str) else { continue };
        let position: InjectionPosition = item
            .get("position")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or(InjectionPosition::Prepend);
        match position {
            InjectionPosition::Postscript | InjectionPosition::AfterPrompt => append.push(content.to_string()),
            _ => prepend.push(content.to_string()),
        }
    }

    let mut sections = prepend;
    sections.push(request.prompt.take().unwrap_or_default());
    sections.extend(append);
    request.prompt = Some(sections.into_iter().filter(|s| !s.is_empty()).collect::<Vec<_>>().join("\n\n"));
}

fn enqueue_outcome_response(outcome: EnqueueOutcome, request_id: RequestId) -> Value {
    match outcome {
        EnqueueOutcome::Blocked(check) => {
            KsiError::blocked(check.check_name(), check.detail()).to_response()
        }
        EnqueueOutcome::Queued { priority, queue_depth } => {
            json!({ "status": "queued", "request_id": request_id, "priority": priority, "queue_depth": queue_depth })
        }
        EnqueueOutcome::Ready { priority, queue_depth } => {
            json!({ "status": "ready", "request_id": request_id, "priority": priority, "queue_depth": queue_depth })
        }
    }
}

struct Async;

#[async_trait]
impl Handler<DaemonCtx> for Async {
    async fn handle(&self, ctx: &DaemonCtx, event: &Event) -> Result<Value, KsiError> {
        let mut request = build_request(&event.data, Priority::Normal)?;
        apply_pending_injections(ctx, &mut request).await;
        let request_id = request.request_id;
        ctx.injection.note_request(&request);
        let outcome = ctx.scheduler.clone().enqueue(request);
        Ok(enqueue_outcome_response(outcome, request_id))
    }
}

impl Discoverable for Async {
    fn describe(&self) -> HandlerInfo {
        HandlerInfo {
            event: "completion:async".to_string(),
            summary: "Enqueue a completion request for background processing.".to_string(),
            parameters: json!({
                "session_id": "string, optional",
                "prompt": "string, one of prompt/messages",
                "messages": "array, one of prompt/messages",
                "model": "string, required",
                "priority": "string, optional",
            }),
            triggers: vec!["completion:result".to_string()],
        }
    }
}

struct Inject;

#[async_trait]
impl Handler<DaemonCtx> for Inject {
    async fn handle(&self, ctx: &DaemonCtx, event: &Event) -> Result<Value, KsiError> {
        let mut request = build_request(&event.data, Priority::Critical)?;
        apply_pending_injections(ctx, &mut request).await;
        let request_id = request.request_id;
        ctx.injection.note_request(&request);
        let outcome = ctx.scheduler.clone().enqueue(request);
        Ok(enqueue_outcome_response(outcome, request_id))
    }
}

impl Discoverable for Inject {
    fn describe(&self) -> HandlerInfo {
        HandlerInfo {
            event: "completion:inject".to_string(),
            summary: "Enqueue a completion at critical priority, ahead of queued async work.".to_string(),
            parameters: json!({
                "session_id": "string, optional",
                "prompt": "string, one of prompt/messages",
                "messages": "array, one of prompt/messages",
                "model": "string, required",
            }),
            triggers: vec!["completion:result".to_string()],
        }
    }
}

struct Cancel;

#[async_trait]
impl Handler<DaemonCtx> for Cancel {
    async fn handle(&self, ctx: &DaemonCtx, event: &Event) -> Result<Value, KsiError> {
        let request_id = RequestId::from_string(extract::require_str(&event.data, "request_id")?);
        match ctx.scheduler.cancel(&request_id) {
            CancelOutcome::Cancelled => Ok(json!({ "status": "cancelled", "request_id": request_id })),
            CancelOutcome::NotFound => Err(KsiError::not_found("completion", request_id.as_str())),
        }
    }
}

impl Discoverable for Cancel {
    fn describe(&self) -> HandlerInfo {
        HandlerInfo {
            event: "completion:cancel".to_string(),
            summary: "Cancel a queued or in-flight completion request.".to_string(),
            parameters: json!({ "request_id": "string, required" }),
            triggers: vec![],
        }
    }
}

/// The scheduler's own result callback (spec.md §4.8 step 8), forwarded
/// here through `RouterSink` rather than called directly so every other
/// `completion:result` subscriber sees it too. Folds any direct-mode
/// injections straight back into the scheduler; no response is needed.
struct Result_;

#[async_trait]
impl Handler<DaemonCtx> for Result_ {
    async fn handle(&self, ctx: &DaemonCtx, event: &Event) -> Result<Value, KsiError> {
        let request_id = RequestId::from_string(extract::require_str(&event.data, "request_id")?);
        let status = extract::require_str(&event.data, "status")?;
        let result_text = extract::opt_str(&event.data, "result");

        let outcome = ctx.injection.handle_completion_result(request_id, &status, result_text.as_deref()).await;
        if let ksi_engine::InjectionOutcome::Direct { requests } = outcome {
            for request in requests {
                ctx.injection.note_request(&request);
                ctx.scheduler.clone().enqueue(request);
            }
        }
        Ok(Value::Null)
    }
}

impl Discoverable for Result_ {
    fn describe(&self) -> HandlerInfo {
        HandlerInfo {
            event: "completion:result".to_string(),
            summary: "Internal: scheduler result callback, drives injection routing.".to_string(),
            parameters: json!({}),
            triggers: vec![],
        }
    }
}

pub(crate) fn register(router: &mut Router<DaemonCtx>, discovery: &mut DiscoveryRegistry) {
    super::reg(router, discovery, "completion:async", Async);
    super::reg(router, discovery, "completion:inject", Inject);
    super::reg(router, discovery, "completion:cancel", Cancel);
    super::reg(router, discovery, "completion:result", Result_);
}

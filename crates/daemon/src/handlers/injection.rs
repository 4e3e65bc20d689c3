// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `injection:*` handlers (spec.md §4.10): inspect and manage pending
//! follow-up content queued by `InjectionMode::Next`.

use async_trait::async_trait;
use ksi_core::{now_seconds, Event, KsiError, SessionId};
use ksi_engine::{injection::DEFAULT_TTL_SECONDS, Discoverable, DiscoveryRegistry, Handler, HandlerInfo, InjectionPosition, Router};
use serde_json::{json, Value};

use super::extract;
use crate::context::DaemonCtx;

struct Batch;

#[async_trait]
impl Handler<DaemonCtx> for Batch {
    async fn handle(&self, ctx: &DaemonCtx, event: &Event) -> Result<Value, KsiError> {
        let content = extract::require_str(&event.data, "content")?;
        let targets: Vec<SessionId> = event
            .data
            .get("session_ids")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_str).map(SessionId::from_string).collect())
            .unwrap_or_default();
        if targets.is_empty() {
            return Err(KsiError::validation("`session_ids` must be a non-empty array"));
        }
        let position: InjectionPosition = event
            .data
            .get("position")
            .map(|v| serde_json::from_value(v.clone()))
            .transpose()
            .map_err(|err| KsiError::validation(err.to_string()))?
            .unwrap_or(InjectionPosition::Prepend);
        let trigger_type = event.data.get("trigger_type").and_then(Value::as_str).unwrap_or("general");
        let ttl_seconds = event.data.get("ttl_seconds").and_then(Value::as_f64).unwrap_or(DEFAULT_TTL_SECONDS);

        let stored_count = ctx.injection.inject_batch(&content, position, trigger_type, ttl_seconds, &targets).await;
        Ok(json!({ "stored_count": stored_count, "session_count": targets.len() }))
    }
}

impl Discoverable for Batch {
    fn describe(&self) -> HandlerInfo {
        HandlerInfo {
            event: "injection:batch".to_string(),
            summary: "Queue the same content for next-turn injection into multiple sessions.".to_string(),
            parameters: json!({
                "content": "string, required",
                "session_ids": "array of string, required",
                "position": "string, optional",
                "trigger_type": "string, optional",
                "ttl_seconds": "number, optional",
            }),
            triggers: vec![],
        }
    }
}

struct List;

#[async_trait]
impl Handler<DaemonCtx> for List {
    async fn handle(&self, ctx: &DaemonCtx, event: &Event) -> Result<Value, KsiError> {
        let session_id = SessionId::from_string(extract::require_str(&event.data, "session_id")?);
        let pending = ctx.injection.list_pending(&session_id, now_seconds());
        Ok(json!({ "pending": pending }))
    }
}

impl Discoverable for List {
    fn describe(&self) -> HandlerInfo {
        HandlerInfo {
            event: "injection:list".to_string(),
            summary: "List content queued for next-turn injection into a session.".to_string(),
            parameters: json!({ "session_id": "string, required" }),
            triggers: vec![],
        }
    }
}

struct Clear;

#[async_trait]
impl Handler<DaemonCtx> for Clear {
    async fn handle(&self, ctx: &DaemonCtx, event: &Event) -> Result<Value, KsiError> {
        let session_id = SessionId::from_string(extract::require_str(&event.data, "session_id")?);
        let cleared = ctx.injection.clear(&session_id).await;
        Ok(json!({ "cleared": cleared }))
    }
}

impl Discoverable for Clear {
    fn describe(&self) -> HandlerInfo {
        HandlerInfo {
            event: "injection:clear".to_string(),
            summary: "Drop every pending injection queued for a session.".to_string(),
            parameters: json!({ "session_id": "string, required" }),
            triggers: vec![],
        }
    }
}

struct Sessions;

#[async_trait]
impl Handler<DaemonCtx> for Sessions {
    async fn handle(&self, ctx: &DaemonCtx, _event: &Event) -> Result<Value, KsiError> {
        Ok(json!({ "sessions": ctx.injection.list_all_sessions() }))
    }
}

impl Discoverable for Sessions {
    fn describe(&self) -> HandlerInfo {
        HandlerInfo {
            event: "injection:sessions".to_string(),
            summary: "List every session with pending injected content, and counts.".to_string(),
            parameters: json!({}),
            triggers: vec![],
        }
    }
}

pub(crate) fn register(router: &mut Router<DaemonCtx>, discovery: &mut DiscoveryRegistry) {
    super::reg(router, discovery, "injection:batch", Batch);
    super::reg(router, discovery, "injection:list", List);
    super::reg(router, discovery, "injection:clear", Clear);
    super::reg(router, discovery, "injection:sessions", Sessions);
}

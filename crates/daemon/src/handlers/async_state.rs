// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `async_state:*` handlers (spec.md §3, §4.4): per-key FIFO queues.

use async_trait::async_trait;
use ksi_core::{now_seconds, Event, KsiError};
use ksi_engine::{Discoverable, DiscoveryRegistry, Handler, HandlerInfo, Router};
use ksi_storage::state::GLOBAL_NAMESPACE;
use serde_json::{json, Value};

use super::extract;
use crate::context::DaemonCtx;

fn namespace_of(data: &Value) -> String {
    extract::opt_str(data, "namespace").unwrap_or_else(|| GLOBAL_NAMESPACE.to_string())
}

struct Push;

#[async_trait]
impl Handler<DaemonCtx> for Push {
    async fn handle(&self, ctx: &DaemonCtx, event: &Event) -> Result<Value, KsiError> {
        let namespace = namespace_of(&event.data);
        let key = extract::require_str(&event.data, "key")?;
        let value = event.data.get("value").cloned().unwrap_or(Value::Null);
        let ttl_seconds = event.data.get("ttl_seconds").and_then(Value::as_f64);
        let now = now_seconds();
        let expires_at = ttl_seconds.map(|ttl| now + ttl);
        ctx.state
            .queue_push(&namespace, &key, value, expires_at, now)
            .await
            .map_err(|err| KsiError::Internal(err.to_string()))?;
        Ok(json!({ "status": "ok" }))
    }
}

impl Discoverable for Push {
    fn describe(&self) -> HandlerInfo {
        HandlerInfo {
            event: "async_state:push".to_string(),
            summary: "Append a value to a per-key FIFO queue.".to_string(),
            parameters: json!({ "namespace": "string, optional", "key": "string, required", "value": "any", "ttl_seconds": "number, optional" }),
            triggers: vec![],
        }
    }
}

struct Pop;

#[async_trait]
impl Handler<DaemonCtx> for Pop {
    async fn handle(&self, ctx: &DaemonCtx, event: &Event) -> Result<Value, KsiError> {
        let namespace = namespace_of(&event.data);
        let key = extract::require_str(&event.data, "key")?;
        let now = now_seconds();
        let popped = ctx.state.queue_pop(&namespace, &key, now).await.map_err(|err| KsiError::Internal(err.to_string()))?;
        Ok(match popped {
            Some(item) => json!({ "found": true, "value": item.value, "pushed_at": item.pushed_at }),
            None => json!({ "found": false, "value": Value::Null }),
        })
    }
}

impl Discoverable for Pop {
    fn describe(&self) -> HandlerInfo {
        HandlerInfo {
            event: "async_state:pop".to_string(),
            summary: "Pop the oldest non-expired item off a queue.".to_string(),
            parameters: json!({ "namespace": "string, optional", "key": "string, required" }),
            triggers: vec![],
        }
    }
}

struct GetQueue;

#[async_trait]
impl Handler<DaemonCtx> for GetQueue {
    async fn handle(&self, ctx: &DaemonCtx, event: &Event) -> Result<Value, KsiError> {
        let namespace = namespace_of(&event.data);
        let key = extract::require_str(&event.data, "key")?;
        let now = now_seconds();
        let items = ctx.state.queue_items(&namespace, &key, now).map_err(|err| KsiError::Internal(err.to_string()))?;
        Ok(json!({ "items": items }))
    }
}

impl Discoverable for GetQueue {
    fn describe(&self) -> HandlerInfo {
        HandlerInfo {
            event: "async_state:get_queue".to_string(),
            summary: "List every non-expired item in a queue, oldest first.".to_string(),
            parameters: json!({ "namespace": "string, optional", "key": "string, required" }),
            triggers: vec![],
        }
    }
}

struct QueueLength;

#[async_trait]
impl Handler<DaemonCtx> for QueueLength {
    async fn handle(&self, ctx: &DaemonCtx, event: &Event) -> Result<Value, KsiError> {
        let namespace = namespace_of(&event.data);
        let key = extract::require_str(&event.data, "key")?;
        let now = now_seconds();
        let length = ctx.state.queue_length(&namespace, &key, now).map_err(|err| KsiError::Internal(err.to_string()))?;
        Ok(json!({ "length": length }))
    }
}

impl Discoverable for QueueLength {
    fn describe(&self) -> HandlerInfo {
        HandlerInfo {
            event: "async_state:queue_length".to_string(),
            summary: "Count non-expired items in a queue.".to_string(),
            parameters: json!({ "namespace": "string, optional", "key": "string, required" }),
            triggers: vec![],
        }
    }
}

struct GetKeys;

#[async_trait]
impl Handler<DaemonCtx> for GetKeys {
    async fn handle(&self, ctx: &DaemonCtx, event: &Event) -> Result<Value, KsiError> {
        let namespace = namespace_of(&event.data);
        let keys = ctx.state.queue_keys(&namespace).map_err(|err| KsiError::Internal(err.to_string()))?;
        Ok(json!({ "keys": keys }))
    }
}

impl Discoverable for GetKeys {
    fn describe(&self) -> HandlerInfo {
        HandlerInfo {
            event: "async_state:get_keys".to_string(),
            summary: "List every queue key in a namespace.".to_string(),
            parameters: json!({ "namespace": "string, optional" }),
            triggers: vec![],
        }
    }
}

struct Delete;

#[async_trait]
impl Handler<DaemonCtx> for Delete {
    async fn handle(&self, ctx: &DaemonCtx, event: &Event) -> Result<Value, KsiError> {
        let namespace = namespace_of(&event.data);
        let key = extract::require_str(&event.data, "key")?;
        let deleted = ctx.state.queue_delete(&namespace, &key).await.map_err(|err| KsiError::Internal(err.to_string()))?;
        Ok(json!({ "deleted": deleted }))
    }
}

impl Discoverable for Delete {
    fn describe(&self) -> HandlerInfo {
        HandlerInfo {
            event: "async_state:delete".to_string(),
            summary: "Atomically delete every item of a queue.".to_string(),
            parameters: json!({ "namespace": "string, optional", "key": "string, required" }),
            triggers: vec![],
        }
    }
}

pub(crate) fn register(router: &mut Router<DaemonCtx>, discovery: &mut DiscoveryRegistry) {
    super::reg(router, discovery, "async_state:push", Push);
    super::reg(router, discovery, "async_state:pop", Pop);
    super::reg(router, discovery, "async_state:get_queue", GetQueue);
    super::reg(router, discovery, "async_state:queue_length", QueueLength);
    super::reg(router, discovery, "async_state:get_keys", GetKeys);
    super::reg(router, discovery, "async_state:delete", Delete);
}

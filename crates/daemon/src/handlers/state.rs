// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `state:*` handlers (spec.md §4.4): namespaced KV and per-session scratch.

use async_trait::async_trait;
use ksi_core::{now_seconds, Event, KsiError};
use ksi_engine::{Discoverable, DiscoveryRegistry, Handler, HandlerInfo, Router};
use serde_json::{json, Value};

use ksi_storage::state::GLOBAL_NAMESPACE;

use super::extract;
use crate::context::DaemonCtx;

fn namespace_of(data: &Value) -> String {
    extract::opt_str(data, "namespace").unwrap_or_else(|| GLOBAL_NAMESPACE.to_string())
}

struct Get;

#[async_trait]
impl Handler<DaemonCtx> for Get {
    async fn handle(&self, ctx: &DaemonCtx, event: &Event) -> Result<Value, KsiError> {
        let namespace = namespace_of(&event.data);
        let key = extract::require_str(&event.data, "key")?;
        let found = ctx.state.kv_get(&namespace, &key).await.map_err(|err| KsiError::Internal(err.to_string()))?;
        Ok(match found {
            Some(entry) => json!({ "found": true, "value": entry.value, "metadata": entry.metadata, "updated_at": entry.updated_at }),
            None => json!({ "found": false, "value": Value::Null }),
        })
    }
}

impl Discoverable for Get {
    fn describe(&self) -> HandlerInfo {
        HandlerInfo {
            event: "state:get".to_string(),
            summary: "Read a namespaced key-value entry.".to_string(),
            parameters: json!({ "namespace": "string, optional", "key": "string, required" }),
            triggers: vec![],
        }
    }
}

struct Set;

#[async_trait]
impl Handler<DaemonCtx> for Set {
    async fn handle(&self, ctx: &DaemonCtx, event: &Event) -> Result<Value, KsiError> {
        let namespace = namespace_of(&event.data);
        let key = extract::require_str(&event.data, "key")?;
        let value = event.data.get("value").cloned().unwrap_or(Value::Null);
        let metadata = event.data.get("metadata").cloned().unwrap_or_else(|| json!({}));
        let now = now_seconds();
        ctx.state
            .kv_set(&namespace, &key, value, metadata, now)
            .await
            .map_err(|err| KsiError::Internal(err.to_string()))?;
        Ok(json!({ "status": "ok", "updated_at": now }))
    }
}

impl Discoverable for Set {
    fn describe(&self) -> HandlerInfo {
        HandlerInfo {
            event: "state:set".to_string(),
            summary: "Write a namespaced key-value entry.".to_string(),
            parameters: json!({ "namespace": "string, optional", "key": "string, required", "value": "any", "metadata": "object, optional" }),
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
        let deleted = ctx.state.kv_delete(&namespace, &key).await.map_err(|err| KsiError::Internal(err.to_string()))?;
        Ok(json!({ "deleted": deleted }))
    }
}

impl Discoverable for Delete {
    fn describe(&self) -> HandlerInfo {
        HandlerInfo {
            event: "state:delete".to_string(),
            summary: "Delete a namespaced key-value entry, idempotently.".to_string(),
            parameters: json!({ "namespace": "string, optional", "key": "string, required" }),
            triggers: vec![],
        }
    }
}

struct List;

#[async_trait]
impl Handler<DaemonCtx> for List {
    async fn handle(&self, ctx: &DaemonCtx, event: &Event) -> Result<Value, KsiError> {
        let namespace = namespace_of(&event.data);
        let pattern = extract::opt_str(&event.data, "pattern");
        let keys = ctx.state.kv_list(&namespace, pattern.as_deref()).map_err(|err| KsiError::Internal(err.to_string()))?;
        Ok(json!({ "keys": keys }))
    }
}

impl Discoverable for List {
    fn describe(&self) -> HandlerInfo {
        HandlerInfo {
            event: "state:list".to_string(),
            summary: "List keys in a namespace, optionally filtered by a `*` glob.".to_string(),
            parameters: json!({ "namespace": "string, optional", "pattern": "string, optional" }),
            triggers: vec![],
        }
    }
}

struct Clear;

#[async_trait]
impl Handler<DaemonCtx> for Clear {
    async fn handle(&self, ctx: &DaemonCtx, event: &Event) -> Result<Value, KsiError> {
        let namespace = namespace_of(&event.data);
        let count = ctx.state.kv_clear(&namespace).map_err(|err| KsiError::Internal(err.to_string()))?;
        Ok(json!({ "cleared": count }))
    }
}

impl Discoverable for Clear {
    fn describe(&self) -> HandlerInfo {
        HandlerInfo {
            event: "state:clear".to_string(),
            summary: "Delete every key in a namespace.".to_string(),
            parameters: json!({ "namespace": "string, optional" }),
            triggers: vec![],
        }
    }
}

struct SessionGet;

#[async_trait]
impl Handler<DaemonCtx> for SessionGet {
    async fn handle(&self, ctx: &DaemonCtx, event: &Event) -> Result<Value, KsiError> {
        let session_id = extract::require_str(&event.data, "session_id")?;
        let found = ctx.state.session_get(&session_id).await.map_err(|err| KsiError::Internal(err.to_string()))?;
        Ok(match found {
            Some(scratch) => json!({ "found": true, "last_output": scratch.last_output, "updated_at": scratch.updated_at }),
            None => json!({ "found": false, "last_output": Value::Null }),
        })
    }
}

impl Discoverable for SessionGet {
    fn describe(&self) -> HandlerInfo {
        HandlerInfo {
            event: "state:session:get".to_string(),
            summary: "Read a session's last-output scratch entry.".to_string(),
            parameters: json!({ "session_id": "string, required" }),
            triggers: vec![],
        }
    }
}

struct SessionUpdate;

#[async_trait]
impl Handler<DaemonCtx> for SessionUpdate {
    async fn handle(&self, ctx: &DaemonCtx, event: &Event) -> Result<Value, KsiError> {
        let session_id = extract::require_str(&event.data, "session_id")?;
        let last_output = event.data.get("last_output").cloned().unwrap_or(Value::Null);
        let now = now_seconds();
        ctx.state
            .session_update(&session_id, last_output, now)
            .await
            .map_err(|err| KsiError::Internal(err.to_string()))?;
        Ok(json!({ "status": "ok", "updated_at": now }))
    }
}

impl Discoverable for SessionUpdate {
    fn describe(&self) -> HandlerInfo {
        HandlerInfo {
            event: "state:session:update".to_string(),
            summary: "Write a session's last-output scratch entry.".to_string(),
            parameters: json!({ "session_id": "string, required", "last_output": "any" }),
            triggers: vec![],
        }
    }
}

pub(crate) fn register(router: &mut Router<DaemonCtx>, discovery: &mut DiscoveryRegistry) {
    super::reg(router, discovery, "state:get", Get);
    super::reg(router, discovery, "state:set", Set);
    super::reg(router, discovery, "state:delete", Delete);
    super::reg(router, discovery, "state:list", List);
    super::reg(router, discovery, "state:clear", Clear);
    super::reg(router, discovery, "state:session:get", SessionGet);
    super::reg(router, discovery, "state:session:update", SessionUpdate);
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `monitor:*` handlers (spec.md §4.2, §4.12): query the event log.
//!
//! `monitor:subscribe` is not registered here -- it upgrades a connection
//! to a streaming push of every dispatched event rather than answering a
//! single request, so `listener.rs` special-cases it directly against
//! `Router::subscribe`, the same way `listener.rs` special-cases any
//! other connection-upgrade request instead of routing it as a normal
//! one-shot call.

use async_trait::async_trait;
use ksi_core::Event;
use ksi_core::KsiError;
use ksi_engine::{Discoverable, DiscoveryRegistry, Handler, HandlerInfo, Router};
use ksi_storage::eventlog::EventQuery;
use serde_json::{json, Value};

use super::extract;
use crate::context::DaemonCtx;

fn query_of(data: &Value) -> EventQuery {
    let event_patterns = data
        .get("event_patterns")
        .and_then(Value::as_array)
        .map(|patterns| patterns.iter().filter_map(Value::as_str).map(str::to_owned).collect())
        .unwrap_or_default();
    EventQuery {
        event_patterns,
        originator_id: extract::opt_str(data, "originator_id"),
        start_time: data.get("start_time").and_then(Value::as_f64),
        end_time: data.get("end_time").and_then(Value::as_f64),
        limit: data.get("limit").and_then(Value::as_u64),
    }
}

struct GetEvents;

#[async_trait]
impl Handler<DaemonCtx> for GetEvents {
    async fn handle(&self, ctx: &DaemonCtx, event: &Event) -> Result<Value, KsiError> {
        let query = query_of(&event.data);
        let entries = ctx.event_log.query_metadata(&query).map_err(|err| KsiError::Internal(err.to_string()))?;
        Ok(json!({ "events": entries }))
    }
}

impl Discoverable for GetEvents {
    fn describe(&self) -> HandlerInfo {
        HandlerInfo {
            event: "monitor:get_events".to_string(),
            summary: "Query the event log's metadata index by pattern, originator, and time range.".to_string(),
            parameters: json!({
                "event_patterns": "array of string, optional",
                "originator_id": "string, optional",
                "start_time": "number, optional",
                "end_time": "number, optional",
                "limit": "number, optional",
            }),
            triggers: vec![],
        }
    }
}

struct GetSessionEvents;

#[async_trait]
impl Handler<DaemonCtx> for GetSessionEvents {
    async fn handle(&self, ctx: &DaemonCtx, event: &Event) -> Result<Value, KsiError> {
        let session_id = extract::require_str(&event.data, "session_id")?;
        let mut query = query_of(&event.data);
        query.event_patterns = vec!["completion:*".to_string(), "agent:*".to_string()];
        let entries = ctx
            .event_log
            .query_metadata(&query)
            .map_err(|err| KsiError::Internal(err.to_string()))?
            .into_iter()
            .filter(|entry| entry.session_id.as_deref() == Some(session_id.as_str()))
            .collect::<Vec<_>>();
        Ok(json!({ "events": entries }))
    }
}

impl Discoverable for GetSessionEvents {
    fn describe(&self) -> HandlerInfo {
        HandlerInfo {
            event: "monitor:get_session_events".to_string(),
            summary: "Query the event log's metadata index, filtered to one session.".to_string(),
            parameters: json!({ "session_id": "string, required", "start_time": "number, optional", "end_time": "number, optional", "limit": "number, optional" }),
            triggers: vec![],
        }
    }
}

struct GetCorrelationChain;

#[async_trait]
impl Handler<DaemonCtx> for GetCorrelationChain {
    async fn handle(&self, ctx: &DaemonCtx, event: &Event) -> Result<Value, KsiError> {
        let correlation_id = extract::require_str(&event.data, "correlation_id")?;
        let query = EventQuery::default();
        let entries = ctx
            .event_log
            .query_metadata(&query)
            .map_err(|err| KsiError::Internal(err.to_string()))?
            .into_iter()
            .filter(|entry| entry.correlation_id.as_deref() == Some(correlation_id.as_str()))
            .collect::<Vec<_>>();
        Ok(json!({ "events": entries }))
    }
}

impl Discoverable for GetCorrelationChain {
    fn describe(&self) -> HandlerInfo {
        HandlerInfo {
            event: "monitor:get_correlation_chain".to_string(),
            summary: "Join the event log against one correlation id (spec.md's log-level correlation read).".to_string(),
            parameters: json!({ "correlation_id": "string, required" }),
            triggers: vec![],
        }
    }
}

struct GetStats;

#[async_trait]
impl Handler<DaemonCtx> for GetStats {
    async fn handle(&self, ctx: &DaemonCtx, _event: &Event) -> Result<Value, KsiError> {
        let total = ctx
            .event_log
            .query_metadata(&EventQuery::default())
            .map_err(|err| KsiError::Internal(err.to_string()))?
            .len();
        Ok(json!({ "total_events": total, "correlation": ctx.correlation.stats() }))
    }
}

impl Discoverable for GetStats {
    fn describe(&self) -> HandlerInfo {
        HandlerInfo {
            event: "monitor:get_stats".to_string(),
            summary: "Summary counters over the event log and correlation store.".to_string(),
            parameters: json!({}),
            triggers: vec![],
        }
    }
}

pub(crate) fn register(router: &mut Router<DaemonCtx>, discovery: &mut DiscoveryRegistry) {
    super::reg(router, discovery, "monitor:get_events", GetEvents);
    super::reg(router, discovery, "monitor:get_session_events", GetSessionEvents);
    super::reg(router, discovery, "monitor:get_correlation_chain", GetCorrelationChain);
    super::reg(router, discovery, "monitor:get_stats", GetStats);
}

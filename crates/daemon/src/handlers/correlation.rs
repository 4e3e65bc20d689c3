// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `correlation:*` handlers (spec.md §4.3): inspect the in-memory trace
//! tree the router builds as events dispatch.

use async_trait::async_trait;
use ksi_core::{now_seconds, CorrelationId, Event, KsiError};
use ksi_engine::{Discoverable, DiscoveryRegistry, Handler, HandlerInfo, Router};
use serde_json::{json, Value};

use super::extract;
use crate::context::DaemonCtx;

/// Correlations older than this with no open children are swept by
/// `correlation:cleanup` as well as the daemon's own background timer.
const DEFAULT_MAX_AGE_HOURS: u64 = 24;

struct Trace;

#[async_trait]
impl Handler<DaemonCtx> for Trace {
    async fn handle(&self, ctx: &DaemonCtx, event: &Event) -> Result<Value, KsiError> {
        let id = CorrelationId::from_string(extract::require_str(&event.data, "correlation_id")?);
        match ctx.correlation.get(&id) {
            Some(trace) => serde_json::to_value(trace).map_err(|err| KsiError::Internal(err.to_string())),
            None => Err(KsiError::not_found("correlation", id.as_str())),
        }
    }
}

impl Discoverable for Trace {
    fn describe(&self) -> HandlerInfo {
        HandlerInfo {
            event: "correlation:trace".to_string(),
            summary: "Look up a single correlation's trace entry.".to_string(),
            parameters: json!({ "correlation_id": "string, required" }),
            triggers: vec![],
        }
    }
}

struct Chain;

#[async_trait]
impl Handler<DaemonCtx> for Chain {
    async fn handle(&self, ctx: &DaemonCtx, event: &Event) -> Result<Value, KsiError> {
        let id = CorrelationId::from_string(extract::require_str(&event.data, "correlation_id")?);
        Ok(json!({ "chain": ctx.correlation.chain(&id) }))
    }
}

impl Discoverable for Chain {
    fn describe(&self) -> HandlerInfo {
        HandlerInfo {
            event: "correlation:chain".to_string(),
            summary: "Walk a correlation's parent chain, leaf to root.".to_string(),
            parameters: json!({ "correlation_id": "string, required" }),
            triggers: vec![],
        }
    }
}

struct Tree;

#[async_trait]
impl Handler<DaemonCtx> for Tree {
    async fn handle(&self, ctx: &DaemonCtx, event: &Event) -> Result<Value, KsiError> {
        let id = CorrelationId::from_string(extract::require_str(&event.data, "correlation_id")?);
        Ok(json!({ "tree": ctx.correlation.tree(&id) }))
    }
}

impl Discoverable for Tree {
    fn describe(&self) -> HandlerInfo {
        HandlerInfo {
            event: "correlation:tree".to_string(),
            summary: "Walk every trace in a correlation's subtree, rooted at its chain root.".to_string(),
            parameters: json!({ "correlation_id": "string, required" }),
            triggers: vec![],
        }
    }
}

struct Stats;

#[async_trait]
impl Handler<DaemonCtx> for Stats {
    async fn handle(&self, ctx: &DaemonCtx, _event: &Event) -> Result<Value, KsiError> {
        serde_json::to_value(ctx.correlation.stats()).map_err(|err| KsiError::Internal(err.to_string()))
    }
}

impl Discoverable for Stats {
    fn describe(&self) -> HandlerInfo {
        HandlerInfo {
            event: "correlation:stats".to_string(),
            summary: "Counts of open/closed traces and root correlations.".to_string(),
            parameters: json!({}),
            triggers: vec![],
        }
    }
}

struct Cleanup;

#[async_trait]
impl Handler<DaemonCtx> for Cleanup {
    async fn handle(&self, ctx: &DaemonCtx, event: &Event) -> Result<Value, KsiError> {
        let max_age_hours = event.data.get("max_age_hours").and_then(Value::as_u64).unwrap_or(DEFAULT_MAX_AGE_HOURS);
        let swept = ctx.correlation.sweep_expired(now_seconds(), max_age_hours);
        Ok(json!({ "swept": swept }))
    }
}

impl Discoverable for Cleanup {
    fn describe(&self) -> HandlerInfo {
        HandlerInfo {
            event: "correlation:cleanup".to_string(),
            summary: "Evict closed, childless traces older than max_age_hours.".to_string(),
            parameters: json!({ "max_age_hours": "number, optional" }),
            triggers: vec![],
        }
    }
}

pub(crate) fn register(router: &mut Router<DaemonCtx>, discovery: &mut DiscoveryRegistry) {
    super::reg(router, discovery, "correlation:trace", Trace);
    super::reg(router, discovery, "correlation:chain", Chain);
    super::reg(router, discovery, "correlation:tree", Tree);
    super::reg(router, discovery, "correlation:stats", Stats);
    super::reg(router, discovery, "correlation:cleanup", Cleanup);
}

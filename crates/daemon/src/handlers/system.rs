// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `system:*` handlers (spec.md §4.14): health, discovery, help, shutdown.

use async_trait::async_trait;
use ksi_core::{now_seconds, Event, KsiError};
use ksi_engine::{Discoverable, DiscoveryRegistry, Handler, HandlerInfo, Router};
use serde_json::{json, Value};

use super::extract;
use crate::context::DaemonCtx;

struct Health;

#[async_trait]
impl Handler<DaemonCtx> for Health {
    async fn handle(&self, ctx: &DaemonCtx, _event: &Event) -> Result<Value, KsiError> {
        Ok(json!({
            "status": "ok",
            "uptime_s": now_seconds() - ctx.started_at,
            "version": env!("CARGO_PKG_VERSION"),
        }))
    }
}

impl Discoverable for Health {
    fn describe(&self) -> HandlerInfo {
        HandlerInfo {
            event: "system:health".to_string(),
            summary: "Daemon liveness and uptime.".to_string(),
            parameters: json!({}),
            triggers: vec![],
        }
    }
}

struct Discover;

#[async_trait]
impl Handler<DaemonCtx> for Discover {
    async fn handle(&self, ctx: &DaemonCtx, event: &Event) -> Result<Value, KsiError> {
        let namespace = extract::opt_str(&event.data, "namespace");
        Ok(json!({ "handlers": ctx.discovery.discover(namespace.as_deref()) }))
    }
}

impl Discoverable for Discover {
    fn describe(&self) -> HandlerInfo {
        HandlerInfo {
            event: "system:discover".to_string(),
            summary: "List registered handlers, optionally filtered to one namespace.".to_string(),
            parameters: json!({ "namespace": "string, optional" }),
            triggers: vec![],
        }
    }
}

struct Help;

#[async_trait]
impl Handler<DaemonCtx> for Help {
    async fn handle(&self, ctx: &DaemonCtx, event: &Event) -> Result<Value, KsiError> {
        let target = extract::require_str(&event.data, "event")?;
        ctx.discovery
            .help(&target)
            .map(|info| serde_json::to_value(info).unwrap_or(Value::Null))
            .ok_or_else(|| KsiError::not_found("handler", target))
    }
}

impl Discoverable for Help {
    fn describe(&self) -> HandlerInfo {
        HandlerInfo {
            event: "system:help".to_string(),
            summary: "Full description of one registered handler.".to_string(),
            parameters: json!({ "event": "string, required" }),
            triggers: vec![],
        }
    }
}

struct Shutdown;

#[async_trait]
impl Handler<DaemonCtx> for Shutdown {
    async fn handle(&self, ctx: &DaemonCtx, _event: &Event) -> Result<Value, KsiError> {
        ctx.shutdown.notify_waiters();
        Ok(json!({ "status": "shutting_down" }))
    }
}

impl Discoverable for Shutdown {
    fn describe(&self) -> HandlerInfo {
        HandlerInfo {
            event: "system:shutdown".to_string(),
            summary: "Signal the daemon to begin graceful shutdown.".to_string(),
            parameters: json!({}),
            triggers: vec![],
        }
    }
}

pub(crate) fn register(router: &mut Router<DaemonCtx>, discovery: &mut DiscoveryRegistry) {
    super::reg(router, discovery, "system:health", Health);
    super::reg(router, discovery, "system:discover", Discover);
    super::reg(router, discovery, "system:help", Help);
    super::reg(router, discovery, "system:shutdown", Shutdown);
}

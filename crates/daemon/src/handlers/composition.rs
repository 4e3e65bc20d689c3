// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `composition:*` handlers (spec.md §4.5): load, index, resolve, validate,
//! and author compositions.

use async_trait::async_trait;
use ksi_compositions::StoreError;
use ksi_compositions::loader::LoaderError;
use ksi_core::{now_seconds, Composition, CompositionType, Event, KsiError};
use ksi_engine::{Discoverable, DiscoveryRegistry, Handler, HandlerInfo, Router};
use serde_json::{json, Map, Value};

use super::extract;
use crate::context::DaemonCtx;

fn store_error_to_ksi(err: StoreError) -> KsiError {
    match err {
        StoreError::Loader(LoaderError::NotFound { name, type_ }) => {
            KsiError::not_found(format!("composition:{type_:?}"), name)
        }
        other => KsiError::Internal(other.to_string()),
    }
}

fn composition_type(data: &Value) -> Result<CompositionType, KsiError> {
    let raw = extract::require_str(data, "type")?;
    serde_json::from_value(Value::String(raw.clone()))
        .map_err(|_| KsiError::validation(format!("unknown composition type `{raw}`")))
}

fn optional_composition_type(data: &Value) -> Result<Option<CompositionType>, KsiError> {
    match extract::opt_str(data, "type") {
        Some(raw) => serde_json::from_value(Value::String(raw.clone()))
            .map(Some)
            .map_err(|_| KsiError::validation(format!("unknown composition type `{raw}`"))),
        None => Ok(None),
    }
}

fn vars_of(data: &Value) -> Map<String, Value> {
    data.get("vars").and_then(Value::as_object).cloned().unwrap_or_default()
}

struct Get;

#[async_trait]
impl Handler<DaemonCtx> for Get {
    async fn handle(&self, ctx: &DaemonCtx, event: &Event) -> Result<Value, KsiError> {
        let name = extract::require_str(&event.data, "name")?;
        let type_ = composition_type(&event.data)?;
        let composition =
            ctx.compositions.get(&name, type_).map_err(store_error_to_ksi)?;
        serde_json::to_value(composition).map_err(|err| KsiError::Internal(err.to_string()))
    }
}

impl Discoverable for Get {
    fn describe(&self) -> HandlerInfo {
        HandlerInfo {
            event: "composition:get".to_string(),
            summary: "Load one composition by name and type.".to_string(),
            parameters: json!({ "name": "string, required", "type": "string, required" }),
            triggers: vec![],
        }
    }
}

struct List;

#[async_trait]
impl Handler<DaemonCtx> for List {
    async fn handle(&self, ctx: &DaemonCtx, event: &Event) -> Result<Value, KsiError> {
        let type_ = optional_composition_type(&event.data)?;
        let rows = ctx.compositions.list(type_).map_err(|err| KsiError::Internal(err.to_string()))?;
        Ok(json!({ "compositions": rows }))
    }
}

impl Discoverable for List {
    fn describe(&self) -> HandlerInfo {
        HandlerInfo {
            event: "composition:list".to_string(),
            summary: "List indexed compositions, optionally filtered by type.".to_string(),
            parameters: json!({ "type": "string, optional" }),
            triggers: vec![],
        }
    }
}

struct Resolve;

#[async_trait]
impl Handler<DaemonCtx> for Resolve {
    async fn handle(&self, ctx: &DaemonCtx, event: &Event) -> Result<Value, KsiError> {
        let name = extract::require_str(&event.data, "name")?;
        let type_ = composition_type(&event.data)?;
        let vars = vars_of(&event.data);
        ctx.compositions.resolve(&name, type_, &vars).map_err(store_error_to_ksi)
    }
}

impl Discoverable for Resolve {
    fn describe(&self) -> HandlerInfo {
        HandlerInfo {
            event: "composition:resolve".to_string(),
            summary: "Fully resolve a composition: inheritance, mixins, conditions, variables.".to_string(),
            parameters: json!({ "name": "string, required", "type": "string, required", "vars": "object, optional" }),
            triggers: vec![],
        }
    }
}

struct Validate;

#[async_trait]
impl Handler<DaemonCtx> for Validate {
    async fn handle(&self, ctx: &DaemonCtx, event: &Event) -> Result<Value, KsiError> {
        let name = extract::require_str(&event.data, "name")?;
        let type_ = composition_type(&event.data)?;
        let vars = vars_of(&event.data);
        match ctx.compositions.validate(&name, type_, &vars) {
            Ok(()) => Ok(json!({ "valid": true })),
            Err(err) => Ok(json!({ "valid": false, "error": store_error_to_ksi(err).to_string() })),
        }
    }
}

impl Discoverable for Validate {
    fn describe(&self) -> HandlerInfo {
        HandlerInfo {
            event: "composition:validate".to_string(),
            summary: "Dry-run resolve a composition, reporting success without side effects.".to_string(),
            parameters: json!({ "name": "string, required", "type": "string, required", "vars": "object, optional" }),
            triggers: vec![],
        }
    }
}

struct Create;

#[async_trait]
impl Handler<DaemonCtx> for Create {
    async fn handle(&self, ctx: &DaemonCtx, event: &Event) -> Result<Value, KsiError> {
        let composition_value = event
            .data
            .get("composition")
            .cloned()
            .ok_or_else(|| KsiError::validation("missing required field `composition`"))?;
        let composition: Composition =
            serde_json::from_value(composition_value).map_err(|err| KsiError::validation(err.to_string()))?;
        let now = now_seconds();
        let path = ctx.compositions.create(&composition, now).map_err(store_error_to_ksi)?;
        Ok(json!({ "status": "ok", "path": path.display().to_string() }))
    }
}

impl Discoverable for Create {
    fn describe(&self) -> HandlerInfo {
        HandlerInfo {
            event: "composition:create".to_string(),
            summary: "Author a new composition and index it immediately.".to_string(),
            parameters: json!({ "composition": "object, required" }),
            triggers: vec![],
        }
    }
}

pub(crate) fn register(router: &mut Router<DaemonCtx>, discovery: &mut DiscoveryRegistry) {
    super::reg(router, discovery, "composition:get", Get);
    super::reg(router, discovery, "composition:list", List);
    super::reg(router, discovery, "composition:resolve", Resolve);
    super::reg(router, discovery, "composition:validate", Validate);
    super::reg(router, discovery, "composition:create", Create);
}

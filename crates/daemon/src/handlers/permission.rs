// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `permission:*` handlers (spec.md §4.7): profile resolution and
//! parent/child spawn validation.

use async_trait::async_trait;
use ksi_adapters::permission::{resolve_profile, validate_spawn, ProfileInput};
use ksi_core::{Event, KsiError, PermissionLevel, PermissionOverrides, Permissions};
use ksi_engine::{Discoverable, DiscoveryRegistry, Handler, HandlerInfo, Router};
use serde_json::{json, Value};

use crate::context::DaemonCtx;

/// A request names exactly one of a tier level, an explicit profile, or a
/// base profile plus additive overrides (spec.md §4.7).
fn profile_input(data: &Value) -> Result<ProfileInput, KsiError> {
    if let Some(level) = data.get("level") {
        let level: PermissionLevel =
            serde_json::from_value(level.clone()).map_err(|err| KsiError::validation(err.to_string()))?;
        return Ok(ProfileInput::Level(level));
    }
    if let Some(permissions) = data.get("permissions") {
        let permissions: Permissions =
            serde_json::from_value(permissions.clone()).map_err(|err| KsiError::validation(err.to_string()))?;
        return Ok(ProfileInput::Explicit(permissions));
    }
    if let Some(base) = data.get("base") {
        let base: Permissions =
            serde_json::from_value(base.clone()).map_err(|err| KsiError::validation(err.to_string()))?;
        let overrides: PermissionOverrides = match data.get("overrides") {
            Some(value) => {
                serde_json::from_value(value.clone()).map_err(|err| KsiError::validation(err.to_string()))?
            }
            None => PermissionOverrides::default(),
        };
        return Ok(ProfileInput::BaseWithOverrides { base: Box::new(base), overrides: Box::new(overrides) });
    }
    Err(KsiError::validation("expected one of `level`, `permissions`, or `base`"))
}

struct GetProfile;

#[async_trait]
impl Handler<DaemonCtx> for GetProfile {
    async fn handle(&self, _ctx: &DaemonCtx, event: &Event) -> Result<Value, KsiError> {
        let input = profile_input(&event.data)?;
        let resolved = resolve_profile(input);
        serde_json::to_value(resolved).map_err(|err| KsiError::Internal(err.to_string()))
    }
}

impl Discoverable for GetProfile {
    fn describe(&self) -> HandlerInfo {
        HandlerInfo {
            event: "permission:get_profile".to_string(),
            summary: "Resolve a permission profile from a tier, explicit grant, or base+overrides.".to_string(),
            parameters: json!({ "level": "string, one of level/permissions/base", "permissions": "object", "base": "object", "overrides": "object" }),
            triggers: vec![],
        }
    }
}

struct ValidateSpawn;

#[async_trait]
impl Handler<DaemonCtx> for ValidateSpawn {
    async fn handle(&self, _ctx: &DaemonCtx, event: &Event) -> Result<Value, KsiError> {
        let parent_value = event
            .data
            .get("parent")
            .cloned()
            .ok_or_else(|| KsiError::validation("missing required field `parent`"))?;
        let child_value = event
            .data
            .get("child")
            .cloned()
            .ok_or_else(|| KsiError::validation("missing required field `child`"))?;
        let parent: Permissions =
            serde_json::from_value(parent_value).map_err(|err| KsiError::validation(err.to_string()))?;
        let child: Permissions =
            serde_json::from_value(child_value).map_err(|err| KsiError::validation(err.to_string()))?;
        Ok(json!({ "valid": validate_spawn(&parent, &child) }))
    }
}

impl Discoverable for ValidateSpawn {
    fn describe(&self) -> HandlerInfo {
        HandlerInfo {
            event: "permission:validate_spawn".to_string(),
            summary: "Check that a child's permission grant is a subset of its parent's.".to_string(),
            parameters: json!({ "parent": "object, required", "child": "object, required" }),
            triggers: vec![],
        }
    }
}

pub(crate) fn register(router: &mut Router<DaemonCtx>, discovery: &mut DiscoveryRegistry) {
    super::reg(router, discovery, "permission:get_profile", GetProfile);
    super::reg(router, discovery, "permission:validate_spawn", ValidateSpawn);
}

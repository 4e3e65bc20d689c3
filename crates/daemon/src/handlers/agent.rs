// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `agent:*` handlers (spec.md §4.9): spawn, terminate, messaging, status.

use async_trait::async_trait;
use ksi_adapters::permission::{resolve_profile, tier_defaults, ProfileInput};
use ksi_adapters::sandbox::CreateSandboxRequest;
use ksi_compositions::CapabilityError;
use ksi_core::{
    AgentId, Event, IsolationMode, KsiError, ParentShare, PermissionLevel, Permissions, ResolvedCapabilities,
    SessionId, ToolAllowance,
};
use ksi_engine::{AgentSpawnRequest, Discoverable, DiscoveryRegistry, Handler, HandlerInfo, Router};
use serde_json::{json, Value};
use tracing::warn;

use super::extract;
use crate::context::DaemonCtx;

fn permission_level_tier(level: PermissionLevel) -> &'static str {
    match level {
        PermissionLevel::Restricted => "restricted",
        PermissionLevel::Standard => "standard",
        PermissionLevel::Trusted => "trusted",
        PermissionLevel::Researcher => "researcher",
    }
}

/// Resolves `profile_name` against the capability registry, falling back
/// to the permission level's legacy tier name when the profile isn't a
/// known capability profile, and folds the result into `permissions`
/// (spec.md §4.6's `(allowed_events, allowed_tools, expanded_capabilities)`
/// feeding into §4.7's permission set).
fn apply_capabilities(ctx: &DaemonCtx, profile_name: &str, permissions: &mut Permissions) {
    let resolved = match ctx.capabilities.resolve(profile_name) {
        Ok(resolved) => Some(resolved),
        Err(CapabilityError::UnknownProfile(_)) => permissions
            .level
            .and_then(|level| ctx.capabilities.resolve(permission_level_tier(level)).ok()),
        Err(err) => {
            warn!(profile = profile_name, %err, "capability resolution failed");
            None
        }
    };
    let Some(resolved) = resolved else { return };
    fold_resolved_capabilities(permissions, resolved);
}

fn fold_resolved_capabilities(permissions: &mut Permissions, resolved: ResolvedCapabilities) {
    if !resolved.allowed_tools.is_empty() {
        let merged = match permissions.tools.allowed.take() {
            Some(ToolAllowance::All(marker)) => ToolAllowance::All(marker),
            Some(ToolAllowance::Set(existing)) => {
                ToolAllowance::Set(existing.into_iter().chain(resolved.allowed_tools.iter().cloned()).collect())
            }
            None => ToolAllowance::Set(resolved.allowed_tools.clone()),
        };
        permissions.tools.allowed = Some(merged);
    }
    permissions.capabilities.insert("allowed_events".to_string(), json!(resolved.allowed_events));
    permissions.capabilities.insert("expanded_capabilities".to_string(), json!(resolved.expanded_capabilities));
}

fn isolation_mode(data: &Value) -> Result<IsolationMode, KsiError> {
    match extract::opt_str(data, "isolation_mode") {
        Some(raw) => serde_json::from_value(Value::String(raw.clone()))
            .map_err(|_| KsiError::validation(format!("unknown isolation_mode `{raw}`"))),
        None => Ok(IsolationMode::Isolated),
    }
}

fn parent_share(data: &Value) -> Result<ParentShare, KsiError> {
    match extract::opt_str(data, "parent_share") {
        Some(raw) => serde_json::from_value(Value::String(raw.clone()))
            .map_err(|_| KsiError::validation(format!("unknown parent_share `{raw}`"))),
        None => Ok(ParentShare::None),
    }
}

struct Spawn;

#[async_trait]
impl Handler<DaemonCtx> for Spawn {
    async fn handle(&self, ctx: &DaemonCtx, event: &Event) -> Result<Value, KsiError> {
        let data = &event.data;
        let agent_id = extract::opt_str(data, "agent_id").map(AgentId::from_string).unwrap_or_default();
        let profile_name = extract::require_str(data, "profile")?;
        let model = extract::require_str(data, "model")?;
        let session_id = extract::opt_str(data, "session_id").map(SessionId::from_string);
        let parent_agent_id = extract::opt_str(data, "parent_agent_id").map(AgentId::from_string);
        let orchestration_id = extract::opt_str(data, "orchestration_id");
        let initial_prompt = extract::opt_str(data, "initial_prompt");

        let mut permissions = match data.get("permissions") {
            Some(value) => {
                let input: ProfileInput =
                    serde_json::from_value(value.clone()).map_err(|err| KsiError::validation(err.to_string()))?;
                resolve_profile(input)
            }
            None => {
                let level: PermissionLevel = match extract::opt_str(data, "permission_level") {
                    Some(raw) => serde_json::from_value(Value::String(raw.clone()))
                        .map_err(|_| KsiError::validation(format!("unknown permission_level `{raw}`")))?,
                    None => PermissionLevel::Standard,
                };
                tier_defaults(level)
            }
        };
        apply_capabilities(ctx, &profile_name, &mut permissions);

        let sandbox = CreateSandboxRequest {
            mode: isolation_mode(data)?,
            parent_agent_id: parent_agent_id.clone(),
            session_id: session_id.clone(),
            parent_share: parent_share(data)?,
            session_share: data.get("session_share").and_then(Value::as_bool).unwrap_or(false),
        };

        let request = AgentSpawnRequest {
            agent_id,
            profile_name,
            permissions,
            sandbox,
            session_id,
            parent_agent_id,
            orchestration_id,
            initial_prompt,
            model,
        };
        let agent = ctx.agents.spawn(request).await?;
        serde_json::to_value(agent).map_err(|err| KsiError::Internal(err.to_string()))
    }
}

impl Discoverable for Spawn {
    fn describe(&self) -> HandlerInfo {
        HandlerInfo {
            event: "agent:spawn".to_string(),
            summary: "Spawn a new agent: sandbox, permission profile, optional initial completion.".to_string(),
            parameters: json!({
                "profile": "string, required",
                "model": "string, required",
                "agent_id": "string, optional",
                "session_id": "string, optional",
                "parent_agent_id": "string, optional",
                "orchestration_id": "string, optional",
                "initial_prompt": "string, optional",
                "permissions": "object, optional (ProfileInput shape)",
                "permission_level": "string, optional",
                "isolation_mode": "string, optional",
                "parent_share": "string, optional",
                "session_share": "bool, optional",
            }),
            triggers: vec!["completion:async".to_string()],
        }
    }
}

struct Terminate;

#[async_trait]
impl Handler<DaemonCtx> for Terminate {
    async fn handle(&self, ctx: &DaemonCtx, event: &Event) -> Result<Value, KsiError> {
        let agent_id = AgentId::from_string(extract::require_str(&event.data, "agent_id")?);
        let force = event.data.get("force").and_then(Value::as_bool).unwrap_or(false);
        ctx.agents.terminate(&agent_id, force).await?;
        Ok(json!({ "status": "terminated", "agent_id": agent_id }))
    }
}

impl Discoverable for Terminate {
    fn describe(&self) -> HandlerInfo {
        HandlerInfo {
            event: "agent:terminate".to_string(),
            summary: "Tear down an agent: cancel outstanding work, remove its sandbox.".to_string(),
            parameters: json!({ "agent_id": "string, required", "force": "bool, optional" }),
            triggers: vec![],
        }
    }
}

struct SendMessage;

#[async_trait]
impl Handler<DaemonCtx> for SendMessage {
    async fn handle(&self, ctx: &DaemonCtx, event: &Event) -> Result<Value, KsiError> {
        let agent_id = AgentId::from_string(extract::require_str(&event.data, "agent_id")?);
        let message = event.data.get("message").cloned().unwrap_or(Value::Null);
        ctx.agents.send_message(&agent_id, message).await?;
        Ok(json!({ "status": "ok" }))
    }
}

impl Discoverable for SendMessage {
    fn describe(&self) -> HandlerInfo {
        HandlerInfo {
            event: "agent:send_message".to_string(),
            summary: "Push a message onto an agent's inbox queue.".to_string(),
            parameters: json!({ "agent_id": "string, required", "message": "any" }),
            triggers: vec![],
        }
    }
}

struct Status;

#[async_trait]
impl Handler<DaemonCtx> for Status {
    async fn handle(&self, ctx: &DaemonCtx, event: &Event) -> Result<Value, KsiError> {
        let agent_id = AgentId::from_string(extract::require_str(&event.data, "agent_id")?);
        match ctx.agents.status(&agent_id) {
            Some(agent) => serde_json::to_value(agent).map_err(|err| KsiError::Internal(err.to_string())),
            None => Err(KsiError::not_found("agent", agent_id.as_str())),
        }
    }
}

impl Discoverable for Status {
    fn describe(&self) -> HandlerInfo {
        HandlerInfo {
            event: "agent:status".to_string(),
            summary: "Look up an agent's current record.".to_string(),
            parameters: json!({ "agent_id": "string, required" }),
            triggers: vec![],
        }
    }
}

pub(crate) fn register(router: &mut Router<DaemonCtx>, discovery: &mut DiscoveryRegistry) {
    super::reg(router, discovery, "agent:spawn", Spawn);
    super::reg(router, discovery, "agent:terminate", Terminate);
    super::reg(router, discovery, "agent:send_message", SendMessage);
    super::reg(router, discovery, "agent:status", Status);
}

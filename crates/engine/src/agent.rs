// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent manager: spawn/terminate/send_message/status (spec.md §4.11).
//!
//! Agents are tracked as standalone LLM-backed records with their own
//! lifecycle, not embedded in another resource. Profile
//! composition (`ksi-compositions::resolve`) and permission-profile
//! resolution (`ksi-adapters::permission::resolve_profile`) happen in the
//! caller; this module owns the steps spec.md §4.11 assigns to the agent
//! manager itself: parent-permission validation, sandbox lifecycle, the
//! agent record, and the optional initial-prompt kickoff.

use crate::scheduler::EventSink;
use ksi_adapters::permission::validate_spawn;
use ksi_adapters::sandbox::{CreateSandboxRequest, SandboxError, SandboxManager};
use ksi_core::{now_seconds, Agent, AgentId, AgentStatus, Event, KsiError, Permissions, SessionId};
use ksi_storage::StateStore;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

pub const AGENT_INBOX_NAMESPACE: &str = "agent_inbox";

pub struct AgentSpawnRequest {
    pub agent_id: AgentId,
    pub profile_name: String,
    pub permissions: Permissions,
    pub sandbox: CreateSandboxRequest,
    pub session_id: Option<SessionId>,
    pub parent_agent_id: Option<AgentId>,
    pub orchestration_id: Option<String>,
    pub initial_prompt: Option<String>,
    pub model: String,
}

pub struct AgentManager<S> {
    agents: Mutex<HashMap<AgentId, Agent>>,
    sandboxes: SandboxManager,
    state: Arc<StateStore>,
    sink: Arc<S>,
}

impl<S> AgentManager<S>
where
    S: EventSink + 'static,
{
    pub fn new(sandbox_root: PathBuf, state: Arc<StateStore>, sink: Arc<S>) -> Arc<Self> {
        Arc::new(Self {
            agents: Mutex::new(HashMap::new()),
            sandboxes: SandboxManager::new(sandbox_root),
            state,
            sink,
        })
    }

    /// `agent:spawn`'s five steps (composition already resolved by the
    /// caller): (ii) validate permissions against the parent, (iii)
    /// create the sandbox, (iv) record the agent, (v) optionally kick off
    /// an initial completion.
    pub async fn spawn(&self, request: AgentSpawnRequest) -> Result<Agent, KsiError> {
        if self.agents.lock().contains_key(&request.agent_id) {
            return Err(KsiError::Conflict(format!("agent {} already exists", request.agent_id)));
        }

        let depth = match &request.parent_agent_id {
            Some(parent_id) => {
                let parent = self
                    .agents
                    .lock()
                    .get(parent_id)
                    .cloned()
                    .ok_or_else(|| KsiError::not_found("agent", parent_id.as_str()))?;
                if !validate_spawn(&parent.permissions, &request.permissions) {
                    return Err(KsiError::validation("child permissions exceed parent's profile"));
                }
                parent.child_depth()
            }
            None => 0,
        };

        let sandbox = self.sandboxes.create(request.agent_id.clone(), request.sandbox).map_err(sandbox_to_ksi_error)?;

        let agent = Agent {
            agent_id: request.agent_id.clone(),
            profile: request.profile_name,
            sandbox,
            permissions: request.permissions,
            status: AgentStatus::Ready,
            parent_agent_id: request.parent_agent_id,
            orchestration_id: request.orchestration_id,
            depth,
        };
        self.agents.lock().insert(agent.agent_id.clone(), agent.clone());
        info!(agent_id = %agent.agent_id, depth, "agent spawned");

        if let Some(prompt) = request.initial_prompt {
            self.sink
                .emit(Event::new(
                    "completion:async",
                    json!({
                        "prompt": prompt,
                        "session_id": request.session_id,
                        "model": request.model,
                        "agent_id": agent.agent_id,
                    }),
                    now_seconds(),
                ))
                .await;
        }

        Ok(agent)
    }

    pub fn status(&self, agent_id: &AgentId) -> Option<Agent> {
        self.agents.lock().get(agent_id).cloned()
    }

    /// Cancels outstanding completions (an event the scheduler's owner
    /// observes, since this manager has no direct scheduler handle), tears
    /// down the sandbox, and removes the agent record.
    pub async fn terminate(&self, agent_id: &AgentId, force: bool) -> Result<(), KsiError> {
        if !self.agents.lock().contains_key(agent_id) {
            return Err(KsiError::not_found("agent", agent_id.as_str()));
        }
        self.agents.lock().get_mut(agent_id).map(|agent| agent.status = AgentStatus::Terminating);

        self.sink
            .emit(Event::new(
                "agent:cancel_outstanding",
                json!({ "agent_id": agent_id }),
                now_seconds(),
            ))
            .await;

        self.sandboxes.remove(agent_id, force).map_err(sandbox_to_ksi_error)?;
        self.agents.lock().remove(agent_id);
        info!(%agent_id, "agent terminated");
        Ok(())
    }

    /// `agent:send_message`: push into the target's inbox, a state async
    /// queue keyed `(agent_inbox, agent_id)`.
    pub async fn send_message(&self, target: &AgentId, message: Value) -> Result<(), KsiError> {
        if !self.agents.lock().contains_key(target) {
            return Err(KsiError::not_found("agent", target.as_str()));
        }
        self.state
            .queue_push(AGENT_INBOX_NAMESPACE, target.as_str(), message, None, now_seconds())
            .await
            .map_err(|err| KsiError::Internal(err.to_string()))
    }

    /// Drains `target`'s inbox, oldest first.
    pub async fn drain_inbox(&self, target: &AgentId) -> Vec<Value> {
        let mut out = Vec::new();
        let now = now_seconds();
        while let Ok(Some(item)) = self.state.queue_pop(AGENT_INBOX_NAMESPACE, target.as_str(), now).await {
            out.push(item.value);
        }
        out
    }
}

fn sandbox_to_ksi_error(err: SandboxError) -> KsiError {
    match err {
        SandboxError::AlreadyExists(agent_id) => KsiError::Conflict(format!("sandbox already exists for {agent_id}")),
        SandboxError::NotFound(agent_id) => KsiError::not_found("sandbox", agent_id.as_str()),
        SandboxError::HasChildren { agent_id, child_count } => {
            KsiError::Conflict(format!("cannot remove sandbox for {agent_id}: {child_count} child sandbox(es) still exist"))
        }
        SandboxError::Io(io_err) => KsiError::Internal(io_err.to_string()),
    }
}

#[cfg(test)]
#[path = "agent_tests.rs"]
mod tests;

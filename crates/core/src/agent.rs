// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent data model (spec.md §3, §4.9).

use crate::id::AgentId;
use crate::permission::Permissions;
use crate::sandbox::Sandbox;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Spawning,
    Ready,
    Running,
    Terminating,
    Terminated,
}

impl AgentStatus {
    /// Whether the agent can still accept work (spec.md §4.9).
    pub fn is_active(self) -> bool {
        matches!(self, AgentStatus::Ready | AgentStatus::Running)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub agent_id: AgentId,
    pub profile: String,
    pub sandbox: Sandbox,
    pub permissions: Permissions,
    pub status: AgentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_agent_id: Option<AgentId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orchestration_id: Option<String>,
    #[serde(default)]
    pub depth: u32,
}

impl Agent {
    /// Whether spawning a further child from this agent would exceed the
    /// maximum orchestration nesting depth (enforced alongside the circuit
    /// breaker's own depth check, spec.md §4.4).
    pub fn child_depth(&self) -> u32 {
        self.depth + 1
    }
}

#[cfg(test)]
#[path = "agent_tests.rs"]
mod tests;

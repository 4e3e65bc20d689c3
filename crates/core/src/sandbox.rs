// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sandbox data model (spec.md §3, §4.8).

use crate::id::{AgentId, SessionId};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolationMode {
    /// Own directory tree, no access to siblings.
    Isolated,
    /// Shares a subtree with other agents in the same session.
    Shared,
    /// Read-only view onto a shared subtree.
    Readonly,
}

/// How a spawned child's sandbox relates to its parent's.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParentShare {
    None,
    ReadOnly,
    ReadWrite,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sandbox {
    pub agent_id: AgentId,
    pub path: PathBuf,
    pub mode: IsolationMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_agent_id: Option<AgentId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    #[serde(default = "default_parent_share")]
    pub parent_share: ParentShare,
    #[serde(default)]
    pub session_share: bool,
}

fn default_parent_share() -> ParentShare {
    ParentShare::None
}

impl Sandbox {
    /// Path an agent's sandbox resolves to under the configured sandbox
    /// root (`KSI_SANDBOX_ROOT`), spec.md §6.5/§6.3.
    pub fn path_under(sandbox_root: &std::path::Path, agent_id: &AgentId) -> PathBuf {
        sandbox_root.join(agent_id.as_str())
    }
}

#[cfg(test)]
#[path = "sandbox_tests.rs"]
mod tests;

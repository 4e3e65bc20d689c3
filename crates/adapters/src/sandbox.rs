// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sandbox directory lifecycle (spec.md §4.7). Each agent gets a fresh
//! subdirectory under the configured sandbox root; `shared` mode links
//! in a session-wide subtree, `readonly` denies writes at this layer.

use ksi_core::{AgentId, IsolationMode, ParentShare, Sandbox, SessionId};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    #[error("sandbox already exists for agent {0}")]
    AlreadyExists(AgentId),
    #[error("no sandbox found for agent {0}")]
    NotFound(AgentId),
    #[error("cannot remove sandbox for {agent_id}: {child_count} child sandbox(es) still exist")]
    HasChildren { agent_id: AgentId, child_count: usize },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub struct CreateSandboxRequest {
    pub mode: IsolationMode,
    pub parent_agent_id: Option<AgentId>,
    pub session_id: Option<SessionId>,
    pub parent_share: ParentShare,
    pub session_share: bool,
}

/// Tracks live sandboxes so `remove` can refuse when children still
/// reference a parent, and so repeated lookups don't hit the filesystem.
pub struct SandboxManager {
    root: PathBuf,
    sandboxes: Arc<Mutex<HashMap<AgentId, Sandbox>>>,
}

impl SandboxManager {
    pub fn new(root: PathBuf) -> Self {
        Self { root, sandboxes: Arc::new(Mutex::new(HashMap::new())) }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn create(&self, agent_id: AgentId, request: CreateSandboxRequest) -> Result<Sandbox, SandboxError> {
        {
            let sandboxes = self.sandboxes.lock();
            if sandboxes.contains_key(&agent_id) {
                return Err(SandboxError::AlreadyExists(agent_id));
            }
        }

        let path = Sandbox::path_under(&self.root, &agent_id);
        std::fs::create_dir_all(&path)?;

        if request.mode == IsolationMode::Shared || request.session_share {
            if let Some(session_id) = &request.session_id {
                let shared_dir = self.root.join("_shared").join(session_id.as_str());
                std::fs::create_dir_all(&shared_dir)?;
                let link = path.join("shared");
                link_dir(&shared_dir, &link)?;
            }
        }

        if request.parent_share != ParentShare::None {
            if let Some(parent_id) = &request.parent_agent_id {
                let parent_path = Sandbox::path_under(&self.root, parent_id);
                let link = path.join("parent");
                link_dir(&parent_path, &link)?;
            }
        }

        let sandbox = Sandbox {
            agent_id: agent_id.clone(),
            path,
            mode: request.mode,
            parent_agent_id: request.parent_agent_id,
            session_id: request.session_id,
            parent_share: request.parent_share,
            session_share: request.session_share,
        };
        self.sandboxes.lock().insert(agent_id, sandbox.clone());
        Ok(sandbox)
    }

    pub fn get(&self, agent_id: &AgentId) -> Option<Sandbox> {
        self.sandboxes.lock().get(agent_id).cloned()
    }

    /// Refuses removal if any tracked sandbox still names `agent_id` as
    /// its `parent_agent_id`, unless `force` is set.
    pub fn remove(&self, agent_id: &AgentId, force: bool) -> Result<(), SandboxError> {
        let mut sandboxes = self.sandboxes.lock();
        if !sandboxes.contains_key(agent_id) {
            return Err(SandboxError::NotFound(agent_id.clone()));
        }
        let children: Vec<AgentId> = sandboxes
            .values()
            .filter(|s| s.parent_agent_id.as_ref() == Some(agent_id))
            .map(|s| s.agent_id.clone())
            .collect();
        if !children.is_empty() && !force {
            return Err(SandboxError::HasChildren { agent_id: agent_id.clone(), child_count: children.len() });
        }
        if let Some(sandbox) = sandboxes.remove(agent_id) {
            let _ = std::fs::remove_dir_all(&sandbox.path);
        }
        Ok(())
    }

    /// Is `path` writable under this sandbox's allow-list? `readonly`
    /// mode denies every write at this layer.
    pub fn can_write(&self, agent_id: &AgentId, path: &Path) -> bool {
        let Some(sandbox) = self.get(agent_id) else { return false };
        if sandbox.mode == IsolationMode::Readonly {
            return false;
        }
        path.starts_with(&sandbox.path)
    }
}

#[cfg(unix)]
fn link_dir(target: &Path, link: &Path) -> std::io::Result<()> {
    if link.exists() {
        return Ok(());
    }
    std::os::unix::fs::symlink(target, link)
}

#[cfg(not(unix))]
fn link_dir(target: &Path, link: &Path) -> std::io::Result<()> {
    if link.exists() {
        return Ok(());
    }
    std::fs::create_dir_all(link)?;
    Ok(())
}

#[cfg(test)]
#[path = "sandbox_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn status_is_active_only_for_ready_and_running() {
    assert!(AgentStatus::Ready.is_active());
    assert!(AgentStatus::Running.is_active());
    assert!(!AgentStatus::Spawning.is_active());
    assert!(!AgentStatus::Terminating.is_active());
    assert!(!AgentStatus::Terminated.is_active());
}

#[test]
fn child_depth_increments_parent_depth() {
    let agent = Agent {
        agent_id: AgentId::new(),
        profile: "default".into(),
        sandbox: crate::sandbox::Sandbox {
            agent_id: AgentId::new(),
            path: "/tmp/sandbox".into(),
            mode: crate::sandbox::IsolationMode::Isolated,
            parent_agent_id: None,
            session_id: None,
            parent_share: crate::sandbox::ParentShare::None,
            session_share: false,
        },
        permissions: Permissions::default(),
        status: AgentStatus::Spawning,
        parent_agent_id: None,
        orchestration_id: None,
        depth: 2,
    };
    assert_eq!(agent.child_depth(), 3);
}

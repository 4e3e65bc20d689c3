// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::path::Path;

#[test]
fn path_under_joins_sandbox_root_and_agent_id() {
    let agent = AgentId::new();
    let root = Path::new("/var/lib/ksi/sandbox");
    let p = Sandbox::path_under(root, &agent);
    assert_eq!(p, root.join(agent.as_str()));
}

#[test]
fn isolation_mode_round_trips_through_json() {
    let m = IsolationMode::Readonly;
    let json = serde_json::to_string(&m).unwrap();
    assert_eq!(json, "\"readonly\"");
    let back: IsolationMode = serde_json::from_str(&json).unwrap();
    assert_eq!(back, IsolationMode::Readonly);
}

#[test]
fn sandbox_defaults_parent_share_to_none_when_absent() {
    let json = serde_json::json!({
        "agent_id": "agt-abc",
        "path": "/var/lib/ksi/sandbox/agt-abc",
        "mode": "isolated",
    });
    let sandbox: Sandbox = serde_json::from_value(json).unwrap();
    assert_eq!(sandbox.parent_share, ParentShare::None);
    assert!(!sandbox.session_share);
}

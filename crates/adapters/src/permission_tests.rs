// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use ksi_core::PermissionLevel;
use std::collections::BTreeSet;
use std::path::PathBuf;

#[test]
fn tier_defaults_widen_from_restricted_to_trusted() {
    let restricted = tier_defaults(PermissionLevel::Restricted);
    let trusted = tier_defaults(PermissionLevel::Trusted);
    assert!(matches!(trusted.tools.allowed, Some(ToolAllowance::All(_))));
    assert!(matches!(restricted.tools.allowed, Some(ToolAllowance::Set(_))));
}

#[test]
fn resolve_profile_explicit_passes_through() {
    let permissions = Permissions { level: Some(PermissionLevel::Standard), ..Default::default() };
    let resolved = resolve_profile(ProfileInput::Explicit(permissions.clone()));
    assert_eq!(resolved.level, permissions.level);
}

#[test]
fn overrides_add_and_remove_allowed_tools() {
    let base = Permissions {
        tools: ToolPermissions {
            allowed: Some(ToolAllowance::Set(BTreeSet::from(["a".to_string(), "b".to_string()]))),
            disallowed: BTreeSet::new(),
        },
        ..Default::default()
    };
    let overrides = PermissionOverrides {
        tools_allowed_add: BTreeSet::from(["c".to_string()]),
        tools_allowed_remove: BTreeSet::from(["a".to_string()]),
        ..Default::default()
    };
    let resolved = apply_overrides(&base, &overrides);
    match resolved.tools.allowed {
        Some(ToolAllowance::Set(set)) => {
            assert!(set.contains("b"));
            assert!(set.contains("c"));
            assert!(!set.contains("a"));
        }
        other => panic!("expected a concrete set, got {other:?}"),
    }
}

#[test]
fn overrides_union_filesystem_paths() {
    let base = Permissions {
        filesystem: FilesystemPermissions {
            read_paths: BTreeSet::from([PathBuf::from("/a")]),
            write_paths: BTreeSet::new(),
        },
        ..Default::default()
    };
    let overrides = PermissionOverrides {
        filesystem_read_paths_add: BTreeSet::from([PathBuf::from("/b")]),
        ..Default::default()
    };
    let resolved = apply_overrides(&base, &overrides);
    assert_eq!(
        resolved.filesystem.read_paths,
        BTreeSet::from([PathBuf::from("/a"), PathBuf::from("/b")])
    );
}

#[test]
fn overrides_resources_take_max_of_base_and_override() {
    let base =
        Permissions { resources: ResourceLimits { max_tokens: Some(1000), ..Default::default() }, ..Default::default() };
    let overrides = PermissionOverrides {
        resources: ResourceLimits { max_tokens: Some(2000), ..Default::default() },
        ..Default::default()
    };
    let resolved = apply_overrides(&base, &overrides);
    assert_eq!(resolved.resources.max_tokens, Some(2000));
}

#[test]
fn validate_spawn_rejects_tools_outside_parent_set() {
    let parent = Permissions {
        tools: ToolPermissions {
            allowed: Some(ToolAllowance::Set(BTreeSet::from(["a".to_string()]))),
            disallowed: BTreeSet::new(),
        },
        ..Default::default()
    };
    let child = Permissions {
        tools: ToolPermissions {
            allowed: Some(ToolAllowance::Set(BTreeSet::from(["a".to_string(), "b".to_string()]))),
            disallowed: BTreeSet::new(),
        },
        ..Default::default()
    };
    assert!(!validate_spawn(&parent, &child));
}

#[test]
fn validate_spawn_rejects_child_all_when_parent_is_set() {
    let parent = Permissions {
        tools: ToolPermissions {
            allowed: Some(ToolAllowance::Set(BTreeSet::from(["a".to_string()]))),
            disallowed: BTreeSet::new(),
        },
        ..Default::default()
    };
    let child = Permissions { tools: ToolPermissions { allowed: Some(ToolAllowance::all()), disallowed: BTreeSet::new() }, ..Default::default() };
    assert!(!validate_spawn(&parent, &child));
}

#[test]
fn validate_spawn_rejects_filesystem_paths_outside_parent() {
    let parent = Permissions {
        filesystem: FilesystemPermissions { read_paths: BTreeSet::from([PathBuf::from("/a")]), write_paths: BTreeSet::new() },
        ..Default::default()
    };
    let child = Permissions {
        filesystem: FilesystemPermissions { read_paths: BTreeSet::from([PathBuf::from("/b")]), write_paths: BTreeSet::new() },
        ..Default::default()
    };
    assert!(!validate_spawn(&parent, &child));
}

#[test]
fn validate_spawn_rejects_resources_exceeding_parent() {
    let parent = Permissions { resources: ResourceLimits { max_tokens: Some(100), ..Default::default() }, ..Default::default() };
    let child = Permissions { resources: ResourceLimits { max_tokens: Some(200), ..Default::default() }, ..Default::default() };
    assert!(!validate_spawn(&parent, &child));
}

#[test]
fn validate_spawn_accepts_strict_subset() {
    let parent = tier_defaults(PermissionLevel::Trusted);
    let child = tier_defaults(PermissionLevel::Restricted);
    assert!(validate_spawn(&parent, &child));
}

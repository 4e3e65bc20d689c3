// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Permission profile resolution and spawn validation (spec.md §4.7).

use ksi_core::{FilesystemPermissions, PermissionLevel, PermissionOverrides, Permissions, ResourceLimits, ToolAllowance, ToolPermissions};
use std::collections::BTreeSet;

/// Input to [`resolve_profile`]: a named tier, an already-structured
/// profile, or a base profile plus additive overrides.
pub enum ProfileInput {
    Level(PermissionLevel),
    Explicit(Permissions),
    BaseWithOverrides { base: Box<Permissions>, overrides: Box<PermissionOverrides> },
}

/// The built-in tier -> `Permissions` mapping. Each tier only widens what
/// the previous one grants.
pub fn tier_defaults(level: PermissionLevel) -> Permissions {
    match level {
        PermissionLevel::Restricted => Permissions {
            level: Some(level),
            tools: ToolPermissions {
                allowed: Some(ToolAllowance::Set(BTreeSet::from(["read_file".to_string()]))),
                disallowed: BTreeSet::new(),
            },
            filesystem: FilesystemPermissions::default(),
            resources: ResourceLimits { max_tokens: Some(4_096), timeout_s: Some(30), ..Default::default() },
            capabilities: Default::default(),
        },
        PermissionLevel::Standard => Permissions {
            level: Some(level),
            tools: ToolPermissions {
                allowed: Some(ToolAllowance::Set(BTreeSet::from([
                    "read_file".to_string(),
                    "write_file".to_string(),
                    "run_command".to_string(),
                ]))),
                disallowed: BTreeSet::new(),
            },
            filesystem: FilesystemPermissions::default(),
            resources: ResourceLimits { max_tokens: Some(32_768), timeout_s: Some(120), ..Default::default() },
            capabilities: Default::default(),
        },
        PermissionLevel::Trusted => Permissions {
            level: Some(level),
            tools: ToolPermissions { allowed: Some(ToolAllowance::all()), disallowed: BTreeSet::new() },
            filesystem: FilesystemPermissions::default(),
            resources: ResourceLimits { max_tokens: Some(131_072), timeout_s: Some(300), ..Default::default() },
            capabilities: Default::default(),
        },
        PermissionLevel::Researcher => Permissions {
            level: Some(level),
            tools: ToolPermissions { allowed: Some(ToolAllowance::all()), disallowed: BTreeSet::new() },
            filesystem: FilesystemPermissions::default(),
            resources: ResourceLimits::default(),
            capabilities: Default::default(),
        },
    }
}

pub fn resolve_profile(input: ProfileInput) -> Permissions {
    match input {
        ProfileInput::Level(level) => tier_defaults(level),
        ProfileInput::Explicit(permissions) => permissions,
        ProfileInput::BaseWithOverrides { base, overrides } => apply_overrides(&base, &overrides),
    }
}

/// Apply structured add/remove overrides on top of a base profile
/// (spec.md §4.7). `tools.allowed_add`/`remove` adjust the allowed set,
/// `disallowed_add` adds to disallowed, filesystem path sets union in,
/// resource scalars take the max of base and override, and capabilities
/// map-merge with override winning on key collision.
pub fn apply_overrides(base: &Permissions, overrides: &PermissionOverrides) -> Permissions {
    let mut tools = base.tools.clone();
    tools.allowed = Some(match (tools.allowed.take(), &overrides.tools_allowed_add, &overrides.tools_allowed_remove) {
        (Some(ToolAllowance::All(marker)), add, remove) if add.is_empty() && remove.is_empty() => {
            ToolAllowance::All(marker)
        }
        (Some(ToolAllowance::All(_)), _, remove) => {
            // Can't subtract from "*" meaningfully without a universe; once
            // any remove is requested, degrade to the add set only.
            let _ = remove;
            ToolAllowance::Set(overrides.tools_allowed_add.clone())
        }
        (Some(ToolAllowance::Set(mut set)), add, remove) => {
            set.extend(add.iter().cloned());
            for r in remove {
                set.remove(r);
            }
            ToolAllowance::Set(set)
        }
        (None, add, _) => ToolAllowance::Set(add.clone()),
    });
    tools.disallowed.extend(overrides.tools_disallowed_add.iter().cloned());

    let mut filesystem = base.filesystem.clone();
    filesystem.read_paths.extend(overrides.filesystem_read_paths_add.iter().cloned());
    filesystem.write_paths.extend(overrides.filesystem_write_paths_add.iter().cloned());

    let resources = merge_resources(&base.resources, &overrides.resources);

    let mut capabilities = base.capabilities.clone();
    for (key, value) in &overrides.capabilities {
        capabilities.insert(key.clone(), value.clone());
    }

    Permissions { level: base.level, tools, filesystem, resources, capabilities }
}

fn merge_resources(base: &ResourceLimits, overrides: &ResourceLimits) -> ResourceLimits {
    let max_tokens = max_option(base.max_tokens, overrides.max_tokens);
    let timeout_s = max_option(base.timeout_s, overrides.timeout_s);
    let mut other = base.other.clone();
    for (key, value) in &overrides.other {
        let merged = other.get(key).copied().map(|v| v.max(*value)).unwrap_or(*value);
        other.insert(key.clone(), merged);
    }
    ResourceLimits { max_tokens, timeout_s, other }
}

fn max_option(a: Option<u64>, b: Option<u64>) -> Option<u64> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x.max(y)),
        (Some(x), None) => Some(x),
        (None, Some(y)) => Some(y),
        (None, None) => None,
    }
}

/// `validate_spawn`: a child's grant must be a subset of its parent's on
/// every axis (spec.md §4.7).
pub fn validate_spawn(parent: &Permissions, child: &Permissions) -> bool {
    if !tools_subset(&parent.tools, &child.tools) {
        return false;
    }
    if !child.filesystem.read_paths.is_subset(&parent.filesystem.read_paths) {
        return false;
    }
    if !child.filesystem.write_paths.is_subset(&parent.filesystem.write_paths) {
        return false;
    }
    if !resources_within(&parent.resources, &child.resources) {
        return false;
    }
    true
}

fn tools_subset(parent: &ToolPermissions, child: &ToolPermissions) -> bool {
    match (&parent.allowed, &child.allowed) {
        (Some(ToolAllowance::All(_)), _) => true,
        (_, Some(ToolAllowance::All(_))) => false,
        (Some(ToolAllowance::Set(parent_set)), Some(ToolAllowance::Set(child_set))) => {
            child_set.is_subset(parent_set)
        }
        (None, Some(ToolAllowance::Set(child_set))) => child_set.is_empty(),
        (_, None) => true,
    }
}

fn resources_within(parent: &ResourceLimits, child: &ResourceLimits) -> bool {
    if !le_option(child.max_tokens, parent.max_tokens) {
        return false;
    }
    if !le_option(child.timeout_s, parent.timeout_s) {
        return false;
    }
    for (key, child_value) in &child.other {
        match parent.other.get(key) {
            Some(parent_value) if child_value <= parent_value => {}
            Some(_) => return false,
            None => return false,
        }
    }
    true
}

/// `child <= parent`, where an unset parent limit is treated as
/// unbounded (any child value passes) and an unset child limit always
/// passes.
fn le_option(child: Option<u64>, parent: Option<u64>) -> bool {
    match (child, parent) {
        (Some(c), Some(p)) => c <= p,
        (Some(_), None) => true,
        (None, _) => true,
    }
}

#[cfg(test)]
#[path = "permission_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Permission profile data model (spec.md §3, §4.7).

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionLevel {
    Restricted,
    Standard,
    Trusted,
    Researcher,
}

/// `allowed: "*" | [tool, ...]` — either "everything" or a concrete set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolAllowance {
    All(String), // always the literal "*"; validated on construction
    Set(BTreeSet<String>),
}

impl ToolAllowance {
    pub fn all() -> Self {
        ToolAllowance::All("*".to_string())
    }

    pub fn permits(&self, tool: &str) -> bool {
        match self {
            ToolAllowance::All(_) => true,
            ToolAllowance::Set(set) => set.contains(tool),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolPermissions {
    #[serde(default)]
    pub allowed: Option<ToolAllowance>,
    #[serde(default)]
    pub disallowed: BTreeSet<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilesystemPermissions {
    #[serde(default)]
    pub read_paths: BTreeSet<PathBuf>,
    #[serde(default)]
    pub write_paths: BTreeSet<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceLimits {
    #[serde(default)]
    pub max_tokens: Option<u64>,
    #[serde(default)]
    pub timeout_s: Option<u64>,
    #[serde(flatten)]
    pub other: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Permissions {
    pub level: Option<PermissionLevel>,
    #[serde(default)]
    pub tools: ToolPermissions,
    #[serde(default)]
    pub filesystem: FilesystemPermissions,
    #[serde(default)]
    pub resources: ResourceLimits,
    #[serde(default)]
    pub capabilities: BTreeMap<String, serde_json::Value>,
}

/// Structured add/remove overrides applied on top of a named base profile
/// (spec.md §4.7 override semantics).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PermissionOverrides {
    #[serde(default)]
    pub tools_allowed_add: BTreeSet<String>,
    #[serde(default)]
    pub tools_allowed_remove: BTreeSet<String>,
    #[serde(default)]
    pub tools_disallowed_add: BTreeSet<String>,
    #[serde(default)]
    pub filesystem_read_paths_add: BTreeSet<PathBuf>,
    #[serde(default)]
    pub filesystem_write_paths_add: BTreeSet<PathBuf>,
    #[serde(default)]
    pub resources: ResourceLimits,
    #[serde(default)]
    pub capabilities: BTreeMap<String, serde_json::Value>,
}

#[cfg(test)]
#[path = "permission_tests.rs"]
mod tests;

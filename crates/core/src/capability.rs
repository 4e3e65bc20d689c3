// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Capability profile data model (spec.md §3, §4.6).

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A named atomic capability: a fixed set of event names it grants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AtomicCapability {
    pub name: String,
    pub events: BTreeSet<String>,
}

/// A named mixin: a bundle with dependencies on other atoms/mixins and its
/// own additional events.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Mixin {
    pub name: String,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub additional_events: BTreeSet<String>,
}

/// A named tool group: a set of host-tool names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolGroup {
    pub name: String,
    pub tools: BTreeSet<String>,
}

/// A capability profile: the unresolved declaration a composition or
/// permission profile references.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CapabilityProfile {
    pub name: String,
    #[serde(default)]
    pub inherits: Option<String>,
    #[serde(default)]
    pub atoms: Vec<String>,
    #[serde(default)]
    pub mixins: Vec<String>,
    #[serde(default)]
    pub claude_tools: Vec<String>,
}

/// The output of capability resolution (spec.md §3, §4.6).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResolvedCapabilities {
    pub allowed_events: BTreeSet<String>,
    pub allowed_tools: BTreeSet<String>,
    pub expanded_capabilities: BTreeSet<String>,
}

#[cfg(test)]
#[path = "capability_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Capability resolver (spec.md §4.6): profile -> `(allowed_events,
//! allowed_tools, expanded_capabilities)` by recursive union expansion
//! of atoms, mixins, and tool groups.

use ksi_core::{AtomicCapability, CapabilityProfile, Mixin, ResolvedCapabilities, ToolGroup};
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;
use tracing::warn;

#[derive(Debug, thiserror::Error)]
pub enum CapabilityError {
    #[error("unknown capability profile: {0}")]
    UnknownProfile(String),
    #[error("reading {path}: {source}")]
    Io { path: std::path::PathBuf, source: std::io::Error },
    #[error("parsing {path}: {source}")]
    Yaml { path: std::path::PathBuf, source: serde_yaml::Error },
}

/// On-disk shape of `lib/capabilities/ksi_capabilities.yaml` (spec.md
/// §6.3): top-level arrays of the same types `CapabilityRegistry` holds,
/// plus the legacy tier-name map.
#[derive(Debug, Default, Deserialize)]
struct CapabilityDefinitions {
    #[serde(default)]
    atoms: Vec<AtomicCapability>,
    #[serde(default)]
    mixins: Vec<Mixin>,
    #[serde(default)]
    tool_groups: Vec<ToolGroup>,
    #[serde(default)]
    profiles: Vec<CapabilityProfile>,
    #[serde(default)]
    legacy_tiers: HashMap<String, String>,
}

/// In-memory registry of known atoms/mixins/tool-groups/profiles. Built
/// once at startup from the bundled capability definitions and held for
/// the daemon's lifetime.
#[derive(Debug, Default)]
pub struct CapabilityRegistry {
    atoms: HashMap<String, AtomicCapability>,
    mixins: HashMap<String, Mixin>,
    tool_groups: HashMap<String, ToolGroup>,
    profiles: HashMap<String, CapabilityProfile>,
    /// Legacy tier name -> structured profile name (spec.md §4.6).
    legacy_tiers: HashMap<String, String>,
}

/// Bundled defaults (spec.md §4.6), seeded to disk on first run by
/// whichever binary owns `lib/capabilities/` rather than compiled
/// straight into the registry, so operators can edit the on-disk copy.
pub const DEFAULT_CAPABILITIES_YAML: &str = include_str!("../assets/default_capabilities.yaml");

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a registry from an on-disk `ksi_capabilities.yaml` (spec.md
    /// §6.3). The daemon seeds a default copy on first run and reloads it
    /// here at startup rather than embedding capability definitions in code.
    pub fn load_from_yaml(path: &Path) -> Result<Self, CapabilityError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|source| CapabilityError::Io { path: path.to_path_buf(), source })?;
        let definitions: CapabilityDefinitions = serde_yaml::from_str(&raw)
            .map_err(|source| CapabilityError::Yaml { path: path.to_path_buf(), source })?;

        let mut registry = Self::default();
        for atom in definitions.atoms {
            registry.register_atom(atom);
        }
        for mixin in definitions.mixins {
            registry.register_mixin(mixin);
        }
        for group in definitions.tool_groups {
            registry.register_tool_group(group);
        }
        for profile in definitions.profiles {
            registry.register_profile(profile);
        }
        for (tier, profile) in definitions.legacy_tiers {
            registry.register_legacy_tier(tier, profile);
        }
        Ok(registry)
    }

    pub fn register_atom(&mut self, atom: AtomicCapability) {
        self.atoms.insert(atom.name.clone(), atom);
    }

    pub fn register_mixin(&mut self, mixin: Mixin) {
        self.mixins.insert(mixin.name.clone(), mixin);
    }

    pub fn register_tool_group(&mut self, group: ToolGroup) {
        self.tool_groups.insert(group.name.clone(), group);
    }

    pub fn register_profile(&mut self, profile: CapabilityProfile) {
        self.profiles.insert(profile.name.clone(), profile);
    }

    pub fn register_legacy_tier(&mut self, tier: impl Into<String>, profile: impl Into<String>) {
        self.legacy_tiers.insert(tier.into(), profile.into());
    }

    pub fn all_atom_names(&self) -> Vec<String> {
        self.atoms.keys().cloned().collect()
    }

    pub fn all_tool_group_names(&self) -> Vec<String> {
        self.tool_groups.keys().cloned().collect()
    }

    /// Resolve a profile name, mapping legacy tier names at the boundary.
    pub fn resolve(&self, name_or_tier: &str) -> Result<ResolvedCapabilities, CapabilityError> {
        let name = self.legacy_tiers.get(name_or_tier).map(String::as_str).unwrap_or(name_or_tier);
        let profile = self
            .profiles
            .get(name)
            .ok_or_else(|| CapabilityError::UnknownProfile(name.to_string()))?;
        Ok(resolve_capabilities(self, profile))
    }
}

/// Expands a profile, following `inherits`, and unions in atoms, mixins,
/// and tool groups. `all`/`exclude` are handled by callers constructing
/// `atoms`/`claude_tools` lists ahead of time (the special forms expand
/// against [`CapabilityRegistry::all_atom_names`] /
/// [`CapabilityRegistry::all_tool_group_names`]).
pub fn resolve_capabilities(registry: &CapabilityRegistry, profile: &CapabilityProfile) -> ResolvedCapabilities {
    let mut allowed_events = BTreeSet::new();
    let mut allowed_tools = BTreeSet::new();
    let mut expanded_capabilities = BTreeSet::new();
    let mut seen_mixins = HashSet::new();

    let mut current = Some(profile.clone());
    let mut inherit_chain_seen = HashSet::new();
    while let Some(p) = current {
        if !inherit_chain_seen.insert(p.name.clone()) {
            warn!(profile = %p.name, "capability inherits cycle broken");
            break;
        }
        expand_atoms(registry, &p.atoms, &mut allowed_events, &mut expanded_capabilities);
        expand_mixins(registry, &p.mixins, &mut allowed_events, &mut expanded_capabilities, &mut seen_mixins);
        expand_tool_groups(registry, &p.claude_tools, &mut allowed_tools);
        current = p.inherits.as_ref().and_then(|parent| registry.profiles.get(parent)).cloned();
    }

    ResolvedCapabilities { allowed_events, allowed_tools, expanded_capabilities }
}

fn expand_atoms(
    registry: &CapabilityRegistry,
    names: &[String],
    events: &mut BTreeSet<String>,
    expanded: &mut BTreeSet<String>,
) {
    for name in names {
        if let Some(atom) = registry.atoms.get(name) {
            events.extend(atom.events.iter().cloned());
            expanded.insert(name.clone());
        } else {
            warn!(atom = %name, "unknown capability atom referenced");
        }
    }
}

fn expand_mixins(
    registry: &CapabilityRegistry,
    names: &[String],
    events: &mut BTreeSet<String>,
    expanded: &mut BTreeSet<String>,
    seen: &mut HashSet<String>,
) {
    for name in names {
        expand_mixin_one(registry, name, events, expanded, seen);
    }
}

fn expand_mixin_one(
    registry: &CapabilityRegistry,
    name: &str,
    events: &mut BTreeSet<String>,
    expanded: &mut BTreeSet<String>,
    seen: &mut HashSet<String>,
) {
    if !seen.insert(name.to_string()) {
        warn!(mixin = %name, "capability mixin cycle broken");
        return;
    }
    let Some(mixin) = registry.mixins.get(name) else {
        warn!(mixin = %name, "unknown capability mixin referenced");
        seen.remove(name);
        return;
    };
    expanded.insert(name.to_string());
    events.extend(mixin.additional_events.iter().cloned());
    for dep in &mixin.dependencies {
        if registry.atoms.contains_key(dep) {
            expand_atoms(registry, std::slice::from_ref(dep), events, expanded);
        } else {
            expand_mixin_one(registry, dep, events, expanded, seen);
        }
    }
    seen.remove(name);
}

fn expand_tool_groups(registry: &CapabilityRegistry, names: &[String], tools: &mut BTreeSet<String>) {
    for name in names {
        if let Some(group) = registry.tool_groups.get(name) {
            tools.extend(group.tools.iter().cloned());
        } else {
            warn!(tool_group = %name, "unknown tool group referenced");
        }
    }
}

/// Expand the `all`/`exclude` special form for atoms: the universe of
/// known atom names minus `exclude`.
pub fn expand_all_atoms(registry: &CapabilityRegistry, exclude: &[String]) -> Vec<String> {
    registry.all_atom_names().into_iter().filter(|a| !exclude.contains(a)).collect()
}

/// Expand the `all`/`exclude` special form for tool groups.
pub fn expand_all_tool_groups(registry: &CapabilityRegistry, exclude: &[String]) -> Vec<String> {
    registry.all_tool_group_names().into_iter().filter(|g| !exclude.contains(g)).collect()
}

#[cfg(test)]
#[path = "capability_tests.rs"]
mod tests;

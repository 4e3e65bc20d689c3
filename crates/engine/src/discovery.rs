// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `system:discover` / `system:help` introspection (SPEC_FULL.md §4.14).
//!
//! Handlers describe themselves explicitly at registration time -- no
//! reflection over function signatures, matching spec.md's Design Notes
//! §9 instruction to replace the reference daemon's decorator-based
//! discovery with static registration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What one registered handler reports about itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandlerInfo {
    pub event: String,
    pub summary: String,
    #[serde(default)]
    pub parameters: serde_json::Value,
    /// Events this handler is known to trigger downstream, e.g.
    /// `completion:async` declares `completion:result`.
    #[serde(default)]
    pub triggers: Vec<String>,
}

/// Implemented by every built-in handler module so `system:discover` can
/// serve a description without inspecting the handler's code.
pub trait Discoverable {
    fn describe(&self) -> HandlerInfo;
}

/// The registry `ksi-daemon::handlers` populates alongside router
/// registration. Keyed by event name; `system:discover`/`system:help`
/// read from here rather than from the router itself.
#[derive(Default)]
pub struct DiscoveryRegistry {
    handlers: BTreeMap<String, HandlerInfo>,
}

impl DiscoveryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, info: HandlerInfo) {
        self.handlers.insert(info.event.clone(), info);
    }

    /// `system:discover`: every registered handler, optionally filtered
    /// to one namespace (`"state"` matches `"state:get"`, `"state:set"`, ...).
    pub fn discover(&self, namespace: Option<&str>) -> Vec<HandlerInfo> {
        self.handlers
            .values()
            .filter(|info| match namespace {
                Some(ns) => info.event.split(':').next() == Some(ns),
                None => true,
            })
            .cloned()
            .collect()
    }

    /// `system:help`: the description of one specific event name.
    pub fn help(&self, event: &str) -> Option<HandlerInfo> {
        self.handlers.get(event).cloned()
    }
}

#[cfg(test)]
#[path = "discovery_tests.rs"]
mod tests;

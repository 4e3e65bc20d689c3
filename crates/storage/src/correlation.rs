// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory correlation trace store (spec.md §4.3).
//!
//! `HashMap<CorrelationId, Trace>` guarded by a `parking_lot::RwLock`, plus
//! an ordered root set. Reads are lock-free snapshots in spirit (a short
//! read-lock, no I/O); eviction runs on a timer the daemon lifecycle owns.

use ksi_core::{CorrelationId, Trace};
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, Default, Serialize)]
pub struct CorrelationStats {
    pub open: usize,
    pub closed: usize,
    pub roots: usize,
}

pub struct CorrelationStore {
    traces: RwLock<HashMap<CorrelationId, Trace>>,
    roots: RwLock<Vec<CorrelationId>>,
}

impl Default for CorrelationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CorrelationStore {
    pub fn new() -> Self {
        Self { traces: RwLock::new(HashMap::new()), roots: RwLock::new(Vec::new()) }
    }

    /// Start a new trace. If `parent` is given and known, the new id is
    /// appended to the parent's `children`; otherwise it becomes a root.
    pub fn begin(
        &self,
        id: CorrelationId,
        event_name: impl Into<String>,
        data: Value,
        parent: Option<CorrelationId>,
        now: f64,
    ) -> Trace {
        let trace = Trace::new(id, parent, event_name, data, now);
        {
            let mut traces = self.traces.write();
            if let Some(parent_id) = parent {
                if let Some(parent_trace) = traces.get_mut(&parent_id) {
                    parent_trace.children.push(id);
                } else {
                    self.roots.write().push(id);
                }
            } else {
                self.roots.write().push(id);
            }
            traces.insert(id, trace.clone());
        }
        trace
    }

    pub fn end(&self, id: &CorrelationId, result: Option<Value>, error: Option<String>, now: f64) {
        if let Some(trace) = self.traces.write().get_mut(id) {
            trace.completed_at = Some(now);
            trace.result = result;
            trace.error = error;
        }
    }

    pub fn get(&self, id: &CorrelationId) -> Option<Trace> {
        self.traces.read().get(id).cloned()
    }

    /// Leaf -> root path, nearest first.
    pub fn chain(&self, id: &CorrelationId) -> Vec<Trace> {
        let traces = self.traces.read();
        let mut out = Vec::new();
        let mut current = Some(*id);
        let mut seen = std::collections::HashSet::new();
        while let Some(cur) = current {
            if !seen.insert(cur) {
                break;
            }
            let Some(trace) = traces.get(&cur) else { break };
            out.push(trace.clone());
            current = trace.parent_id;
        }
        out
    }

    /// Subtree rooted at the chain root of `id` (spec.md §4.3 `tree`).
    pub fn tree(&self, id: &CorrelationId) -> Vec<Trace> {
        let traces = self.traces.read();
        let root = {
            let mut current = *id;
            let mut seen = std::collections::HashSet::new();
            loop {
                if !seen.insert(current) {
                    break current;
                }
                match traces.get(&current).and_then(|t| t.parent_id) {
                    Some(parent) => current = parent,
                    None => break current,
                }
            }
        };

        let mut out = Vec::new();
        let mut stack = vec![root];
        let mut seen = std::collections::HashSet::new();
        while let Some(cur) = stack.pop() {
            if !seen.insert(cur) {
                continue;
            }
            if let Some(trace) = traces.get(&cur) {
                out.push(trace.clone());
                stack.extend(trace.children.iter().copied());
            }
        }
        out
    }

    pub fn stats(&self) -> CorrelationStats {
        let traces = self.traces.read();
        let open = traces.values().filter(|t| t.is_open()).count();
        CorrelationStats {
            open,
            closed: traces.len() - open,
            roots: self.roots.read().len(),
        }
    }

    /// Purge traces older than `max_age_hours` with no open children
    /// (spec.md §4.3). Run on a timer by the daemon lifecycle.
    pub fn sweep_expired(&self, now: f64, max_age_hours: u64) -> usize {
        let max_age_s = max_age_hours as f64 * 3600.0;
        let mut traces = self.traces.write();
        let expired: Vec<CorrelationId> = traces
            .iter()
            .filter(|(_, trace)| {
                !trace.is_open()
                    && now - trace.created_at > max_age_s
                    && !trace.children.iter().any(|child| {
                        traces.get(child).map(|t| t.is_open()).unwrap_or(false)
                    })
            })
            .map(|(id, _)| *id)
            .collect();
        for id in &expired {
            traces.remove(id);
        }
        drop(traces);
        let mut roots = self.roots.write();
        roots.retain(|id| !expired.contains(id));
        expired.len()
    }
}

#[cfg(test)]
#[path = "correlation_tests.rs"]
mod tests;

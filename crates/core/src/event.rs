// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The event envelope dispatched by the router and persisted by the log.
//!
//! Unlike a closed domain-event enum, KSI events are open-ended: any
//! `<namespace>:<verb>` name with a JSON payload is a valid event. The
//! namespaces below are reserved (spec.md §3) but the set of verbs within
//! each is intentionally not enumerated here — handlers register for the
//! names they own (§4.13) and `system:discover` (§4.14) is the source of
//! truth for what is actually wired up at runtime.

use crate::id::{CorrelationId, EventId, RequestId, SessionId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Namespaces spec.md §3 reserves. Not an exhaustive enum of events --
/// just the set of prefixes a dispatched event name is expected to use.
pub const RESERVED_NAMESPACES: &[&str] = &[
    "system",
    "completion",
    "agent",
    "state",
    "composition",
    "permission",
    "injection",
    "orchestration",
    "monitor",
    "evaluation",
    "sandbox",
    "async_state",
    "correlation",
];

/// Split `"ns:verb"` into its namespace and verb. Events without a `:`
/// have an empty namespace.
pub fn split_name(name: &str) -> (&str, &str) {
    match name.split_once(':') {
        Some((ns, verb)) => (ns, verb),
        None => ("", name),
    }
}

/// A dispatched event: what the router receives, annotates, and records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub name: String,
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<CorrelationId>,
    pub event_id: EventId,
    /// Seconds since the Unix epoch, matching spec.md's `float_seconds`.
    pub timestamp: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub originator_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub construct_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<RequestId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl Event {
    /// Build an event carrying its own fresh `event_id`/`timestamp`; the
    /// router fills in `correlation_id` during dispatch (§4.1).
    pub fn new(name: impl Into<String>, data: Value, now: f64) -> Self {
        Self {
            name: name.into(),
            data,
            correlation_id: None,
            event_id: EventId::new(),
            timestamp: now,
            originator_id: None,
            construct_id: None,
            request_id: None,
            session_id: None,
            status: None,
        }
    }

    pub fn namespace(&self) -> &str {
        split_name(&self.name).0
    }

    pub fn verb(&self) -> &str {
        split_name(&self.name).1
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;

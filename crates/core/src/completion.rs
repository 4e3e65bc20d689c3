// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Completion request/record data model (spec.md §3, §4.2, §4.4).

use crate::id::{CorrelationId, RequestId, SessionId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Scheduling priority. Ord is derived top-to-bottom so `Critical` sorts
/// first out of a `BinaryHeap` built with `Reverse`, matching spec.md §4.3's
/// two effective scheduling tiers (`inject`-style work always outranks
/// queued `async` work regardless of where it falls on this scale).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Critical,
    High,
    Normal,
    Low,
    Background,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_request_id: Option<RequestId>,
    #[serde(default)]
    pub max_depth: Option<u32>,
    #[serde(default)]
    pub token_budget: Option<u64>,
    #[serde(default)]
    pub time_window_s: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub request_id: RequestId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    /// Exactly one of `prompt`/`messages` is populated; validated on
    /// construction rather than encoded in the type (spec.md §3).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<Value>>,
    pub model: String,
    #[serde(default = "default_priority")]
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub injection_config: Option<Value>,
    #[serde(default)]
    pub circuit_breaker_config: CircuitBreakerConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<CorrelationId>,
}

fn default_priority() -> Priority {
    Priority::Normal
}

impl CompletionRequest {
    /// A request must carry exactly one of `prompt`/`messages`.
    pub fn has_valid_input(&self) -> bool {
        self.prompt.is_some() != self.messages.is_some()
    }
}

/// One entry in the circuit breaker's completion chain history
/// (spec.md §3, §4.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRecord {
    pub request_id: RequestId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<RequestId>,
    pub timestamp: f64,
    pub content_hash: String,
    pub content_length: usize,
    pub depth: u32,
    pub estimated_tokens: u64,
}

#[cfg(test)]
#[path = "completion_tests.rs"]
mod tests;

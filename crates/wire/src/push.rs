// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subscriber push frame (spec.md §6.1): lines the router pushes to
//! connections that opted in via `monitor:subscribe`, independent of
//! any request/response exchange on that connection.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PushFrame {
    pub event: String,
    pub data: Value,
    pub timestamp: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

impl PushFrame {
    pub fn new(event: impl Into<String>, data: Value, timestamp: f64) -> Self {
        Self { event: event.into(), data, timestamp, correlation_id: None }
    }

    pub fn with_correlation(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }
}

#[cfg(test)]
#[path = "push_tests.rs"]
mod tests;

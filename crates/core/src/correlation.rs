// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Correlation trace data model (spec.md §3, §4.3).

use crate::id::CorrelationId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trace {
    pub correlation_id: CorrelationId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<CorrelationId>,
    pub event_name: String,
    pub created_at: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<f64>,
    pub data: Value,
    #[serde(default)]
    pub children: Vec<CorrelationId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Trace {
    pub fn new(
        correlation_id: CorrelationId,
        parent_id: Option<CorrelationId>,
        event_name: impl Into<String>,
        data: Value,
        now: f64,
    ) -> Self {
        Self {
            correlation_id,
            parent_id,
            event_name: event_name.into(),
            created_at: now,
            completed_at: None,
            data,
            children: Vec::new(),
            result: None,
            error: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.completed_at.is_none()
    }
}

#[cfg(test)]
#[path = "correlation_tests.rs"]
mod tests;

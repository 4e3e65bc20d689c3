// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error taxonomy shared across the daemon kernel.
//!
//! Every variant maps to a transport-visible `{"error": "..."}` string via
//! `Display`; `Blocked` additionally carries the structured circuit-breaker
//! shape used by `completion:async` rejections (spec S3).

use serde::Serialize;
use serde_json::Value;

/// Structured reason a completion enqueue was blocked by the circuit breaker.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BlockedReason {
    pub check: String,
    #[serde(flatten)]
    pub detail: Value,
}

#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum KsiError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found: {kind} {id}")]
    NotFound { kind: String, id: String },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("blocked: {reason}")]
    Blocked { reason: BlockedReason },

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("provider error: {0}")]
    Provider(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl KsiError {
    pub fn not_found(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound { kind: kind.into(), id: id.into() }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn blocked(check: impl Into<String>, detail: Value) -> Self {
        Self::Blocked { reason: BlockedReason { check: check.into(), detail } }
    }

    /// Serialize as the wire-visible error envelope: `{"error": message}`,
    /// or the richer `{"status": "blocked", "reason": "circuit_breaker", ...}`
    /// shape for `Blocked`, per spec.md S3.
    pub fn to_response(&self) -> Value {
        match self {
            KsiError::Blocked { reason } => {
                let mut obj = serde_json::json!({
                    "status": "blocked",
                    "reason": "circuit_breaker",
                    "check": reason.check,
                });
                if let (Some(obj_map), Value::Object(detail_map)) =
                    (obj.as_object_mut(), &reason.detail)
                {
                    for (k, v) in detail_map {
                        obj_map.insert(k.clone(), v.clone());
                    }
                }
                obj
            }
            other => serde_json::json!({ "error": other.to_string() }),
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Outbound response frame (spec.md §6.1): the raw handler result, or
//! `{"error": "message"}` on failure.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Response {
    Error { error: String },
    Result(Value),
}

impl Response {
    pub fn ok(value: Value) -> Self {
        Response::Result(value)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Response::Error { error: message.into() }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Response::Error { .. })
    }
}

impl From<ksi_core::KsiError> for Response {
    fn from(error: ksi_core::KsiError) -> Self {
        Response::ok(error.to_response())
    }
}

#[cfg(test)]
#[path = "response_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Small helpers for pulling fields out of a handler's `Event::data`.
//! Every KSI event payload is a loosely-typed JSON object, so handlers
//! extract what they need field by field rather than deserializing the
//! whole envelope into a fixed struct.

use ksi_core::KsiError;
use serde_json::Value;

pub fn require_str(data: &Value, field: &str) -> Result<String, KsiError> {
    data.get(field)
        .and_then(Value::as_str)
        .map(str::to_owned)
        .ok_or_else(|| KsiError::validation(format!("missing required field `{field}`")))
}

pub fn opt_str(data: &Value, field: &str) -> Option<String> {
    data.get(field).and_then(Value::as_str).map(str::to_owned)
}

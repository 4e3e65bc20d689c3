// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Payload externalization: the leak-prone area spec.md's Design Notes §9
//! calls out by name. The referenceable field set lives here and nowhere
//! else -- any field added later must be classified explicitly.

use ksi_core::Event;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

/// Fields large enough to warrant externalization when they exceed the
/// configured threshold (spec.md §3).
pub const REFERENCEABLE_FIELDS: &[&str] = &[
    "response",
    "content",
    "prompt",
    "messages",
    "system_prompt",
    "composed_prompt",
    "composition",
    "pattern",
    "events",
    "arguments",
    "result",
];

pub fn is_referenceable(field: &str) -> bool {
    REFERENCEABLE_FIELDS.contains(&field)
}

/// Fields whose content is already durably materialized elsewhere by the
/// time a `completion:*` event carrying them is logged (the scheduler
/// appends the provider response to `responses/<session>.jsonl` before
/// emitting `completion:result`, spec.md §4.8 step 4-5).
const MATERIALIZED_ELSEWHERE: &[&str] = &["response", "content", "result"];

fn field_byte_len(value: &Value) -> usize {
    match value {
        Value::String(s) => s.len(),
        other => serde_json::to_string(other).map(|s| s.len()).unwrap_or(0),
    }
}

/// Replace any referenceable field of `data` whose serialized size exceeds
/// `threshold` bytes with a `<ref:path>` or `<stripped:N chars>` sentinel.
/// Returns the (possibly modified) data and a map of field -> path for the
/// fields that became `<ref:...>`.
pub fn externalize(
    data: &Value,
    threshold: u64,
    event: &Event,
    responses_dir: &Path,
) -> (Value, BTreeMap<String, String>) {
    let mut refs = BTreeMap::new();
    let Value::Object(map) = data else {
        return (data.clone(), refs);
    };

    let mut out = map.clone();
    for field in REFERENCEABLE_FIELDS {
        let Some(value) = map.get(*field) else { continue };
        let len = field_byte_len(value);
        if (len as u64) <= threshold {
            continue;
        }
        if MATERIALIZED_ELSEWHERE.contains(field) {
            if let Some(session_id) = &event.session_id {
                let path = responses_dir.join(format!("{session_id}.jsonl"));
                refs.insert((*field).to_string(), path.display().to_string());
                out.insert((*field).to_string(), Value::String(format!("<ref:{}>", path.display())));
                continue;
            }
        }
        out.insert((*field).to_string(), Value::String(format!("<stripped:{len} chars>")));
    }
    (Value::Object(out), refs)
}

#[cfg(test)]
#[path = "payload_tests.rs"]
mod tests;

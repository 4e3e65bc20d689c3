// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Token estimation and content hashing for completion chains.
//!
//! Ported from the reference daemon's `estimate_tokens` heuristic: average
//! of a char/4 estimate and a word*1.3 estimate, floored at 1.

use sha2::{Digest, Sha256};

/// Estimate the token count of `content`. Always `>= 1` for non-empty input.
pub fn estimate_tokens(content: &str) -> u64 {
    if content.trim().is_empty() {
        return 1;
    }

    let char_estimate = content.len() as f64 / 4.0;
    let word_estimate = content.split_whitespace().count() as f64 * 1.3;
    let avg = (char_estimate + word_estimate) / 2.0;

    avg.floor().max(1.0) as u64
}

/// Stable content hash used for circular-content detection in the circuit
/// breaker. SHA-256 rather than the original's MD5 — same role (cheap,
/// stable equality fingerprint), stronger primitive.
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
#[path = "tokens_tests.rs"]
mod tests;

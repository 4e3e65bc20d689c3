// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Circuit breaker for completion chains (spec.md §4.9).
//!
//! Five gate checks run in order -- depth, chain token budget,
//! time-window tokens, circular content, and poisoning risk -- and the
//! first to trip wins. `calculate_depth` treats an untracked declared
//! parent as depth 0 rather than 1: a request whose parent was never
//! recorded has no known chain to be part of.

use ksi_core::{content_hash, estimate_tokens, CompletionRecord, RequestId};
use parking_lot::RwLock;
use serde_json::json;
use std::collections::{HashMap, VecDeque};

pub const DEFAULT_MAX_DEPTH: u32 = 5;
pub const DEFAULT_TOKEN_BUDGET: u64 = 50_000;
pub const DEFAULT_TIME_WINDOW_S: u64 = 3_600;
const POISONING_BLOCK_THRESHOLD: f64 = 0.7;

/// Resolved limits for one completion chain, with the config defaults
/// from spec.md §4.9 applied.
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    pub max_depth: u32,
    pub token_budget: u64,
    pub time_window_s: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            token_budget: DEFAULT_TOKEN_BUDGET,
            time_window_s: DEFAULT_TIME_WINDOW_S,
        }
    }
}

/// Why a completion enqueue was blocked (spec.md §4.9, §7 S3 response shape).
#[derive(Debug, Clone, PartialEq)]
pub enum BlockCheck {
    Depth { depth: u32, max_depth: u32 },
    ChainTokenBudget { chain_tokens: u64, token_budget: u64 },
    TimeWindowTokens { window_tokens: u64, token_budget: u64, window_s: u64 },
    CircularContent { repeated_at: usize },
    PoisoningRisk { score: f64 },
}

impl BlockCheck {
    pub fn check_name(&self) -> &'static str {
        match self {
            BlockCheck::Depth { .. } => "depth",
            BlockCheck::ChainTokenBudget { .. } => "chain_token_budget",
            BlockCheck::TimeWindowTokens { .. } => "time_window_tokens",
            BlockCheck::CircularContent { .. } => "circular_content",
            BlockCheck::PoisoningRisk { .. } => "poisoning_risk",
        }
    }

    pub fn detail(&self) -> serde_json::Value {
        match self {
            BlockCheck::Depth { depth, max_depth } => json!({ "depth": depth, "max_depth": max_depth }),
            BlockCheck::ChainTokenBudget { chain_tokens, token_budget } => {
                json!({ "chain_tokens": chain_tokens, "token_budget": token_budget })
            }
            BlockCheck::TimeWindowTokens { window_tokens, token_budget, window_s } => json!({
                "window_tokens": window_tokens,
                "token_budget": token_budget,
                "window_s": window_s,
            }),
            BlockCheck::CircularContent { repeated_at } => json!({ "repeated_at": repeated_at }),
            BlockCheck::PoisoningRisk { score } => json!({ "score": score }),
        }
    }
}

/// Tracks per-request-id completion chains in memory: the ancestor link
/// (for depth), the full record history (for token/circular checks), and
/// a rolling window of `(timestamp, tokens)` pairs per chain root.
#[derive(Default)]
pub struct CircuitBreaker {
    records: RwLock<HashMap<RequestId, CompletionRecord>>,
    windows: RwLock<HashMap<RequestId, VecDeque<(f64, u64)>>>,
}

impl CircuitBreaker {
    pub fn new() -> Self {
        Self::default()
    }

    /// `depth(request)`: parent-id chained through the in-memory map;
    /// a request with no declared parent is depth 0, and (per spec.md
    /// §4.9) a declared-but-untracked parent also implies depth 0.
    pub fn calculate_depth(&self, parent_id: Option<&RequestId>) -> u32 {
        match parent_id {
            None => 0,
            Some(parent) => {
                let records = self.records.read();
                records.get(parent).map(|record| record.depth + 1).unwrap_or(0)
            }
        }
    }

    fn chain(&self, parent_id: Option<&RequestId>) -> Vec<CompletionRecord> {
        let records = self.records.read();
        let mut out = Vec::new();
        let mut current = parent_id.cloned();
        let mut seen = std::collections::HashSet::new();
        while let Some(id) = current {
            if !seen.insert(id.clone()) {
                break;
            }
            let Some(record) = records.get(&id) else { break };
            current = record.parent_id.clone();
            out.push(record.clone());
        }
        out.reverse();
        out
    }

    /// Evaluate all five gate checks for a new completion carrying
    /// `content` with an optional declared `parent_id`. Returns the
    /// first failing check, if any.
    pub fn evaluate(
        &self,
        parent_id: Option<&RequestId>,
        content: &str,
        now: f64,
        limits: Limits,
    ) -> Option<BlockCheck> {
        let depth = self.calculate_depth(parent_id);
        if depth >= limits.max_depth {
            return Some(BlockCheck::Depth { depth, max_depth: limits.max_depth });
        }

        let chain = self.chain(parent_id);

        // Chain total is the parent's own accumulated total, not including
        // this new request's tokens (circuit_breakers.py::check_budget).
        let chain_tokens: u64 = chain.iter().map(|r| r.estimated_tokens).sum();
        if chain_tokens >= limits.token_budget {
            return Some(BlockCheck::ChainTokenBudget { chain_tokens, token_budget: limits.token_budget });
        }

        // The rolling window is keyed by the immediate parent's own
        // request id, mirroring `_calculate_window_usage(parent_id, ...)`.
        if let Some(parent) = parent_id {
            let windows = self.windows.read();
            if let Some(window) = windows.get(parent) {
                let window_tokens: u64 = window
                    .iter()
                    .filter(|(ts, _)| now - ts <= limits.time_window_s as f64)
                    .map(|(_, tokens)| tokens)
                    .sum();
                if window_tokens >= limits.token_budget {
                    return Some(BlockCheck::TimeWindowTokens {
                        window_tokens,
                        token_budget: limits.token_budget,
                        window_s: limits.time_window_s,
                    });
                }
            }
        }

        if chain.len() >= 6 {
            let new_hash = content_hash(content);
            if let Some(position) = chain.iter().rev().take(5).position(|r| r.content_hash == new_hash) {
                return Some(BlockCheck::CircularContent { repeated_at: chain.len() - 1 - position });
            }
        }

        let score = poisoning_risk(&chain);
        if score > POISONING_BLOCK_THRESHOLD {
            return Some(BlockCheck::PoisoningRisk { score });
        }

        None
    }

    /// Record a `CompletionRecord` for a request that passed `evaluate`,
    /// ahead of the worker actually sending it to the provider (spec.md
    /// §4.9: "On pass, the tracker records a new CompletionRecord before
    /// the worker sends the request").
    pub fn record(&self, request_id: RequestId, parent_id: Option<RequestId>, content: &str, now: f64) {
        let depth = self.calculate_depth(parent_id.as_ref());
        let estimated_tokens = estimate_tokens(content);
        let record = CompletionRecord {
            request_id: request_id.clone(),
            parent_id: parent_id.clone(),
            timestamp: now,
            content_hash: content_hash(content),
            content_length: content.len(),
            depth,
            estimated_tokens,
        };
        // The window entry is keyed by this request's own id -- a later
        // child citing it as `parent_id` sums whatever accumulated here.
        let mut windows = self.windows.write();
        let window = windows.entry(request_id).or_default();
        window.push_back((now, estimated_tokens));
        while window.len() > 1024 {
            window.pop_front();
        }
        drop(windows);

        self.records.write().insert(request_id, record);
    }
}

/// Weighted poisoning-risk score on `[0, 1]` from six pattern detectors,
/// each with the exact weight/threshold preserved from
/// `circuit_breakers.py::analyze_chain`. Chains shorter than 2 records
/// score 0 -- not enough history for any detector to fire.
fn poisoning_risk(chain: &[CompletionRecord]) -> f64 {
    if chain.len() < 2 {
        return 0.0;
    }
    let lengths: Vec<f64> = chain.iter().map(|r| r.content_length as f64).collect();
    let mut score = 0.0;

    score += recursive_self_reference(chain, &lengths);
    score += hallucination_cascade(&lengths);
    score += topic_drift(chain);
    score += coherence_degradation(&lengths);
    score += infinite_elaboration(&lengths);
    score += circular_reasoning(chain);

    score.min(1.0)
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn variance(values: &[f64], avg: f64) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / values.len() as f64
    }
}

/// weight 0.4 if any content hash repeats >= 3 times in the chain; else
/// weight 0.2 if length variance is < 0.1 when normalized by mean^2.
fn recursive_self_reference(chain: &[CompletionRecord], lengths: &[f64]) -> f64 {
    if chain.len() < 3 {
        return 0.0;
    }
    let mut counts: HashMap<&str, u32> = HashMap::new();
    for record in chain {
        *counts.entry(record.content_hash.as_str()).or_insert(0) += 1;
    }
    if counts.values().any(|&count| count >= 3) {
        return 0.4;
    }
    let avg = mean(lengths);
    let normalized_variance = if avg > 0.0 { variance(lengths, avg) / avg.powi(2) } else { 0.0 };
    if normalized_variance < 0.1 {
        return 0.2;
    }
    0.0
}

/// weight 0.3 if the average growth rate of consecutive content lengths
/// exceeds 1.5x. Needs at least 4 records.
fn hallucination_cascade(lengths: &[f64]) -> f64 {
    if lengths.len() < 4 {
        return 0.0;
    }
    let ratios: Vec<f64> = lengths
        .windows(2)
        .filter(|pair| pair[0] > 0.0)
        .map(|pair| pair[1] / pair[0])
        .collect();
    if ratios.is_empty() {
        return 0.0;
    }
    if mean(&ratios) > 1.5 {
        0.3
    } else {
        0.0
    }
}

/// weight 0.25 if the hash similarity between the first and last record
/// falls below 0.3 (character-position match count over hash length).
/// Needs at least 5 records.
fn topic_drift(chain: &[CompletionRecord]) -> f64 {
    if chain.len() < 5 {
        return 0.0;
    }
    let (Some(first_record), Some(last_record)) = (chain.first(), chain.last()) else {
        return 0.0;
    };
    let first = &first_record.content_hash;
    let last = &last_record.content_hash;
    let len = first.len().min(last.len());
    if len == 0 {
        return 0.0;
    }
    let matches = first.bytes().zip(last.bytes()).take(len).filter(|(a, b)| a == b).count();
    let similarity = matches as f64 / len as f64;
    if similarity < 0.3 {
        0.25
    } else {
        0.0
    }
}

/// weight 0.3 if at least half the records are "very short" (< 100
/// chars); else weight 0.25 if at least a third are "very long" (>
/// 10000 chars) -- mutually exclusive, matching
/// `detect_coherence_loss`'s early-return order. Needs at least 3
/// records. Thresholds use integer floor division like the original.
fn coherence_degradation(lengths: &[f64]) -> f64 {
    if lengths.len() < 3 {
        return 0.0;
    }
    let total = lengths.len();
    let very_short = lengths.iter().filter(|&&l| l < 100.0).count();
    let very_long = lengths.iter().filter(|&&l| l > 10_000.0).count();
    if very_short >= total / 2 {
        return 0.3;
    }
    if very_long >= total / 3 {
        return 0.25;
    }
    0.0
}

/// weight 0.35 if the last 5 lengths are strictly increasing and total
/// growth (last/first of that window) exceeds 3x. Needs at least 4 records.
fn infinite_elaboration(lengths: &[f64]) -> f64 {
    if lengths.len() < 4 {
        return 0.0;
    }
    let window_start = lengths.len().saturating_sub(5);
    let window = &lengths[window_start..];
    let strictly_increasing = window.windows(2).all(|pair| pair[1] > pair[0]);
    if !strictly_increasing {
        return 0.0;
    }
    let first = window.first().copied().unwrap_or(0.0);
    let last = window.last().copied().unwrap_or(0.0);
    if first > 0.0 && last / first > 3.0 {
        0.35
    } else {
        0.0
    }
}

/// weight 0.4 if an 8-char hash-prefix cycle repeats somewhere in the
/// chain. Needs at least 6 records.
fn circular_reasoning(chain: &[CompletionRecord]) -> f64 {
    if chain.len() < 6 {
        return 0.0;
    }
    let prefixes: Vec<&str> =
        chain.iter().map(|r| &r.content_hash[..r.content_hash.len().min(8)]).collect();
    if has_cycle(&prefixes) {
        0.4
    } else {
        0.0
    }
}

/// Brute-force search for a repeating cycle of length `2..min(6, n/2)`
/// (exclusive upper bound, matching `range(2, min(6, len(chain) // 2))`
/// in `detect_circular_reasoning`) in `items`.
fn has_cycle(items: &[&str]) -> bool {
    let n = items.len();
    let upper_exclusive = 6.min(n / 2);
    for cycle_len in 2..upper_exclusive {
        if n < cycle_len * 2 {
            continue;
        }
        for start in 0..=n - cycle_len * 2 {
            let a = &items[start..start + cycle_len];
            let b = &items[start + cycle_len..start + cycle_len * 2];
            if a == b {
                return true;
            }
        }
    }
    false
}

#[cfg(test)]
#[path = "circuit_breaker_tests.rs"]
mod tests;

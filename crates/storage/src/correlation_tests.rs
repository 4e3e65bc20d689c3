// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use ksi_core::CorrelationId;

#[test]
fn begin_without_parent_becomes_root() {
    let store = CorrelationStore::new();
    let id = CorrelationId::new();
    store.begin(id, "system:health", serde_json::json!({}), None, 1.0);
    assert_eq!(store.stats().roots, 1);
    assert!(store.get(&id).unwrap().is_open());
}

#[test]
fn begin_with_parent_links_as_child() {
    let store = CorrelationStore::new();
    let parent = CorrelationId::new();
    let child = CorrelationId::new();
    store.begin(parent, "completion:async", serde_json::json!({}), None, 1.0);
    store.begin(child, "completion:result", serde_json::json!({}), Some(parent), 2.0);
    let parent_trace = store.get(&parent).unwrap();
    assert_eq!(parent_trace.children, vec![child]);
}

#[test]
fn end_closes_trace_and_records_result() {
    let store = CorrelationStore::new();
    let id = CorrelationId::new();
    store.begin(id, "state:get", serde_json::json!({}), None, 1.0);
    store.end(&id, Some(serde_json::json!({"found": true})), None, 2.0);
    let trace = store.get(&id).unwrap();
    assert!(!trace.is_open());
    assert_eq!(trace.result, Some(serde_json::json!({"found": true})));
}

#[test]
fn chain_walks_leaf_to_root() {
    let store = CorrelationStore::new();
    let root = CorrelationId::new();
    let mid = CorrelationId::new();
    let leaf = CorrelationId::new();
    store.begin(root, "a", serde_json::json!({}), None, 1.0);
    store.begin(mid, "b", serde_json::json!({}), Some(root), 2.0);
    store.begin(leaf, "c", serde_json::json!({}), Some(mid), 3.0);

    let chain = store.chain(&leaf);
    let ids: Vec<_> = chain.iter().map(|t| t.correlation_id).collect();
    assert_eq!(ids, vec![leaf, mid, root]);
}

#[test]
fn tree_returns_full_subtree_from_any_member() {
    let store = CorrelationStore::new();
    let root = CorrelationId::new();
    let child_a = CorrelationId::new();
    let child_b = CorrelationId::new();
    store.begin(root, "a", serde_json::json!({}), None, 1.0);
    store.begin(child_a, "b", serde_json::json!({}), Some(root), 2.0);
    store.begin(child_b, "c", serde_json::json!({}), Some(root), 3.0);

    let tree = store.tree(&child_a);
    let mut ids: Vec<_> = tree.iter().map(|t| t.correlation_id).collect();
    ids.sort();
    let mut expected = vec![root, child_a, child_b];
    expected.sort();
    assert_eq!(ids, expected);
}

#[test]
fn sweep_expired_purges_old_closed_traces_without_open_children() {
    let store = CorrelationStore::new();
    let id = CorrelationId::new();
    store.begin(id, "system:health", serde_json::json!({}), None, 0.0);
    store.end(&id, None, None, 1.0);

    let purged = store.sweep_expired(100_000.0, 1);
    assert_eq!(purged, 1);
    assert!(store.get(&id).is_none());
}

#[test]
fn sweep_expired_keeps_traces_with_open_children() {
    let store = CorrelationStore::new();
    let root = CorrelationId::new();
    let child = CorrelationId::new();
    store.begin(root, "a", serde_json::json!({}), None, 0.0);
    store.begin(child, "b", serde_json::json!({}), Some(root), 0.0);
    store.end(&root, None, None, 1.0);
    // child stays open

    let purged = store.sweep_expired(100_000.0, 1);
    assert_eq!(purged, 0);
    assert!(store.get(&root).is_some());
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::state::StateStore;

#[tokio::test]
async fn update_then_get_round_trips() {
    let store = StateStore::open_in_memory().unwrap();
    store.session_update("ses-1", serde_json::json!({"text": "hi"}), 1.0).await.unwrap();
    let scratch = store.session_get("ses-1").await.unwrap().unwrap();
    assert_eq!(scratch.last_output, serde_json::json!({"text": "hi"}));
}

#[tokio::test]
async fn get_unknown_session_returns_none() {
    let store = StateStore::open_in_memory().unwrap();
    assert!(store.session_get("ses-missing").await.unwrap().is_none());
}

#[tokio::test]
async fn update_overwrites_previous_output() {
    let store = StateStore::open_in_memory().unwrap();
    store.session_update("ses-1", serde_json::json!("first"), 1.0).await.unwrap();
    store.session_update("ses-1", serde_json::json!("second"), 2.0).await.unwrap();
    let scratch = store.session_get("ses-1").await.unwrap().unwrap();
    assert_eq!(scratch.last_output, serde_json::json!("second"));
    assert_eq!(scratch.updated_at, 2.0);
}

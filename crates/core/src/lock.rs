// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Conversation lock data model (spec.md §3, §4.3).

use crate::id::{RequestId, SessionId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockState {
    Unlocked,
    Locked,
    Queued,
    Forked,
}

/// One session's completion serialization lock: at most one in-flight
/// request per session, with a FIFO wait queue for the rest
/// (spec.md §4.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationLock {
    pub session_id: SessionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub holder_request_id: Option<RequestId>,
    #[serde(default)]
    pub acquired_at: Option<f64>,
    pub state: LockState,
    #[serde(default)]
    pub queue: Vec<RequestId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_session_id: Option<SessionId>,
    #[serde(default)]
    pub child_session_ids: Vec<SessionId>,
}

impl ConversationLock {
    pub fn unlocked(session_id: SessionId) -> Self {
        Self {
            session_id,
            holder_request_id: None,
            acquired_at: None,
            state: LockState::Unlocked,
            queue: Vec::new(),
            parent_session_id: None,
            child_session_ids: Vec::new(),
        }
    }

    pub fn is_held(&self) -> bool {
        self.holder_request_id.is_some()
    }
}

#[cfg(test)]
#[path = "lock_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn unlocked_lock_has_no_holder() {
    let lock = ConversationLock::unlocked(SessionId::new());
    assert_eq!(lock.state, LockState::Unlocked);
    assert!(!lock.is_held());
    assert!(lock.queue.is_empty());
}

#[test]
fn is_held_reflects_holder_presence() {
    let mut lock = ConversationLock::unlocked(SessionId::new());
    lock.holder_request_id = Some(RequestId::new());
    lock.state = LockState::Locked;
    assert!(lock.is_held());
}

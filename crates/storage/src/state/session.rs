// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-session scratch (spec.md §3, §4.4 `state:session:get|update`).

use super::{StateError, StateStore};
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionScratch {
    pub last_output: Value,
    pub updated_at: f64,
}

impl StateStore {
    pub async fn session_get(&self, session_id: &str) -> Result<Option<SessionScratch>, StateError> {
        let _guard = self.lock_key("__session__", session_id).await;
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                "SELECT last_output, updated_at FROM sessions WHERE session_id = ?1",
                params![session_id],
                |row| {
                    let last_output: String = row.get(0)?;
                    let updated_at: f64 = row.get(1)?;
                    Ok((last_output, updated_at))
                },
            )
            .optional()?;
        Ok(match row {
            Some((last_output, updated_at)) => {
                Some(SessionScratch { last_output: serde_json::from_str(&last_output)?, updated_at })
            }
            None => None,
        })
    }

    pub async fn session_update(
        &self,
        session_id: &str,
        last_output: Value,
        now: f64,
    ) -> Result<(), StateError> {
        let _guard = self.lock_key("__session__", session_id).await;
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO sessions (session_id, last_output, updated_at) VALUES (?1,?2,?3)
             ON CONFLICT(session_id) DO UPDATE SET
                last_output = excluded.last_output, updated_at = excluded.updated_at",
            params![session_id, serde_json::to_string(&last_output)?, now],
        )?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Provider subprocess adapter (spec.md §6.2). A provider is invoked as a
//! child process carrying a model name and prompt; stdout is expected to
//! be a single JSON object describing the result.

use async_trait::async_trait;
use ksi_core::{KsiError, SessionId};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Command;

/// What to send the provider: a model name plus either a flat prompt or
/// the session id continuing a prior conversation (spec.md §3).
#[derive(Debug, Clone)]
pub struct ProviderInvocation {
    pub model: String,
    pub prompt: String,
    pub session_id: Option<SessionId>,
    pub working_dir: Option<PathBuf>,
    pub timeout: Duration,
}

/// Parsed provider stdout (spec.md §6.2). Exactly one of `result`/`content`
/// is populated by providers; both fields are kept so either shape parses.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderOutput {
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub total_cost_usd: Option<f64>,
    #[serde(default)]
    pub is_error: bool,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl ProviderOutput {
    pub fn text(&self) -> Option<&str> {
        self.result.as_deref().or(self.content.as_deref())
    }

    /// A returned session id different from the one requested signals the
    /// provider forked a new conversation (spec.md §6.2).
    pub fn forked_from(&self, requested: Option<&SessionId>) -> bool {
        match (requested, &self.session_id) {
            (Some(requested), Some(returned)) => requested.as_str() != returned,
            _ => false,
        }
    }
}

#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    async fn run(&self, invocation: ProviderInvocation) -> Result<ProviderOutput, KsiError>;
}

/// Spawns the provider binary found at `command` as a subprocess, passing
/// the model and prompt as arguments and reading its stdout as JSON.
pub struct SubprocessProvider {
    command: PathBuf,
}

impl SubprocessProvider {
    pub fn new(command: PathBuf) -> Self {
        Self { command }
    }
}

#[async_trait]
impl ProviderAdapter for SubprocessProvider {
    async fn run(&self, invocation: ProviderInvocation) -> Result<ProviderOutput, KsiError> {
        let mut cmd = Command::new(&self.command);
        cmd.arg("--model").arg(&invocation.model);
        if let Some(session_id) = &invocation.session_id {
            cmd.arg("--session-id").arg(session_id.as_str());
        }
        cmd.arg("--prompt").arg(&invocation.prompt);
        if let Some(dir) = &invocation.working_dir {
            cmd.current_dir(dir);
        }

        let output = run_with_timeout(cmd, invocation.timeout)
            .await
            .map_err(|_| KsiError::Timeout(format!("provider {} timed out", self.command.display())))?
            .map_err(|e| KsiError::Provider(format!("failed to spawn provider: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(KsiError::Provider(format!(
                "provider exited with {}: {stderr}",
                output.status
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let parsed: ProviderOutput = serde_json::from_str(&stdout)
            .map_err(|e| KsiError::Provider(format!("malformed provider output: {e}")))?;

        if parsed.is_error {
            let message = parsed.error_message.clone().unwrap_or_else(|| "provider reported an error".to_string());
            return Err(KsiError::Provider(message));
        }

        Ok(parsed)
    }
}

async fn run_with_timeout(
    mut cmd: Command,
    timeout: Duration,
) -> Result<std::io::Result<std::process::Output>, tokio::time::error::Elapsed> {
    tokio::time::timeout(timeout, cmd.output()).await
}

#[cfg(test)]
#[path = "provider_tests.rs"]
mod tests;

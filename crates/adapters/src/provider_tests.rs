// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::time::Duration;

fn script_provider(body: &str) -> (tempfile::TempDir, SubprocessProvider) {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("provider.sh");
    let mut file = std::fs::File::create(&path).expect("create script");
    writeln!(file, "#!/bin/sh\n{body}").expect("write script");
    drop(file);
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).expect("chmod");
    let provider = SubprocessProvider::new(path);
    (dir, provider)
}

fn invocation(prompt: &str) -> ProviderInvocation {
    ProviderInvocation {
        model: "test-model".to_string(),
        prompt: prompt.to_string(),
        session_id: None,
        working_dir: None,
        timeout: Duration::from_secs(5),
    }
}

#[tokio::test]
async fn run_parses_result_field() {
    let (_dir, provider) = script_provider(r#"echo '{"result":"hello","session_id":"abc"}'"#);
    let output = provider.run(invocation("hi")).await.expect("run");
    assert_eq!(output.text(), Some("hello"));
    assert_eq!(output.session_id.as_deref(), Some("abc"));
}

#[tokio::test]
async fn run_parses_content_field_as_fallback() {
    let (_dir, provider) = script_provider(r#"echo '{"content":"fallback text"}'"#);
    let output = provider.run(invocation("hi")).await.expect("run");
    assert_eq!(output.text(), Some("fallback text"));
}

#[tokio::test]
async fn forked_from_detects_session_id_mismatch() {
    let (_dir, provider) = script_provider(r#"echo '{"result":"ok","session_id":"new-session"}'"#);
    let requested = SessionId::new();
    let output = provider.run(invocation("hi")).await.expect("run");
    assert!(output.forked_from(Some(&requested)));
}

#[tokio::test]
async fn forked_from_is_false_when_session_matches() {
    let requested = SessionId::new();
    let (_dir, provider) =
        script_provider(&format!(r#"echo '{{"result":"ok","session_id":"{requested}"}}'"#));
    let output = provider.run(invocation("hi")).await.expect("run");
    assert!(!output.forked_from(Some(&requested)));
}

#[tokio::test]
async fn run_times_out_on_slow_provider() {
    let (_dir, provider) = script_provider("sleep 5; echo '{\"result\":\"too late\"}'");
    let mut inv = invocation("hi");
    inv.timeout = Duration::from_millis(50);
    let err = provider.run(inv).await.expect_err("should time out");
    assert!(matches!(err, KsiError::Timeout(_)));
}

#[tokio::test]
async fn run_errors_on_nonzero_exit() {
    let (_dir, provider) = script_provider("echo 'boom' >&2; exit 1");
    let err = provider.run(invocation("hi")).await.expect_err("should error");
    assert!(matches!(err, KsiError::Provider(_)));
}

#[tokio::test]
async fn run_errors_on_malformed_json() {
    let (_dir, provider) = script_provider("echo 'not json'");
    let err = provider.run(invocation("hi")).await.expect_err("should error");
    assert!(matches!(err, KsiError::Provider(_)));
}

#[tokio::test]
async fn run_errors_when_provider_reports_is_error() {
    let (_dir, provider) =
        script_provider(r#"echo '{"result":"","is_error":true,"error_message":"rate limited"}'"#);
    let err = provider.run(invocation("hi")).await.expect_err("should error");
    match err {
        KsiError::Provider(message) => assert!(message.contains("rate limited")),
        other => panic!("expected Provider error, got {other:?}"),
    }
}

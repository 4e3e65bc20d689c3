// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serial_test::serial;

fn clear_env() {
    for key in [
        "KSI_BASE_DIR",
        "KSI_CONFIG_FILE",
        "KSI_SOCKET_TIMEOUT_S",
        "KSI_LOG_LEVEL",
        "KSI_LOG_FORMAT",
        "KSI_COMPLETION_MAX_CONCURRENT",
    ] {
        env::remove_var(key);
    }
}

#[test]
#[serial]
fn defaults_match_spec_table() {
    clear_env();
    let config = Config::from_env();
    assert_eq!(config.socket_timeout, Duration::from_secs(30));
    assert_eq!(config.log_level, "info");
    assert_eq!(config.log_format, LogFormat::Pretty);
    assert_eq!(config.completion_max_concurrent, 8);
}

#[test]
#[serial]
fn file_values_fill_the_gap_between_defaults_and_env() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let file_path = dir.path().join("config.toml");
    std::fs::write(&file_path, "log_level = \"debug\"\ncompletion_max_concurrent = 4\n").unwrap();
    env::set_var("KSI_CONFIG_FILE", &file_path);
    env::set_var("KSI_COMPLETION_MAX_CONCURRENT", "16");

    let config = Config::from_env();
    // env wins over file
    assert_eq!(config.completion_max_concurrent, 16);
    // file wins over built-in default
    assert_eq!(config.log_level, "debug");
    // untouched by either layer
    assert_eq!(config.socket_timeout, Duration::from_secs(30));

    clear_env();
}

#[test]
#[serial]
fn honors_overrides() {
    env::set_var("KSI_SOCKET_TIMEOUT_S", "5");
    env::set_var("KSI_LOG_FORMAT", "json");
    env::set_var("KSI_COMPLETION_MAX_CONCURRENT", "16");

    let config = Config::from_env();
    assert_eq!(config.socket_timeout, Duration::from_secs(5));
    assert_eq!(config.log_format, LogFormat::Json);
    assert_eq!(config.completion_max_concurrent, 16);

    env::remove_var("KSI_SOCKET_TIMEOUT_S");
    env::remove_var("KSI_LOG_FORMAT");
    env::remove_var("KSI_COMPLETION_MAX_CONCURRENT");
}

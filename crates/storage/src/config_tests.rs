// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn rooted_at_derives_var_layout() {
    let paths = Paths::rooted_at(PathBuf::from("/tmp/ksi-test"));
    assert_eq!(paths.socket_path, PathBuf::from("/tmp/ksi-test/var/run/daemon.sock"));
    assert_eq!(paths.db_dir, PathBuf::from("/tmp/ksi-test/var/db"));
    assert_eq!(paths.sandbox_root, PathBuf::from("/tmp/ksi-test/var/sandbox"));
}

#[test]
fn events_day_dir_nests_under_events_dir() {
    let paths = Paths::rooted_at(PathBuf::from("/tmp/ksi-test"));
    assert_eq!(
        paths.events_day_dir("2026-07-26"),
        PathBuf::from("/tmp/ksi-test/var/logs/events/2026-07-26")
    );
}

#[test]
fn storage_settings_default_matches_spec_table() {
    let settings = StorageSettings::default();
    assert_eq!(settings.event_reference_threshold, 4096);
    assert_eq!(settings.event_batch_size, 50);
    assert_eq!(settings.ring_capacity, 10_000);
}

#[test]
fn path_is_within_checks_prefix() {
    let root = Path::new("/tmp/ksi-test/var/sandbox/agt-1");
    assert!(path_is_within(root, Path::new("/tmp/ksi-test/var/sandbox/agt-1/notes.txt")));
    assert!(!path_is_within(root, Path::new("/tmp/ksi-test/var/sandbox/agt-2/notes.txt")));
}

#[test]
fn utc_date_string_formats_as_expected() {
    // 2026-07-26T00:00:00Z
    let s = utc_date_string(1_785_024_000.0);
    assert_eq!(s, "2026-07-26");
}

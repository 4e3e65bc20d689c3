// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn empty_content_estimates_one_token() {
    assert_eq!(estimate_tokens(""), 1);
    assert_eq!(estimate_tokens("   "), 1);
}

#[test]
fn longer_content_estimates_more_tokens() {
    let short = estimate_tokens("hello world");
    let long = estimate_tokens(&"hello world ".repeat(50));
    assert!(long > short);
}

#[test]
fn identical_content_hashes_identically() {
    assert_eq!(content_hash("same content"), content_hash("same content"));
    assert_ne!(content_hash("content a"), content_hash("content b"));
}

#[cfg(feature = "test-support")]
mod props {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn estimate_is_always_at_least_one(s in ".{0,500}") {
            prop_assert!(estimate_tokens(&s) >= 1);
        }

        #[test]
        fn estimate_is_monotone_in_repetition(unit in "[a-z ]{1,20}", n in 1u32..20) {
            let shorter = unit.clone();
            let longer = unit.repeat(n as usize + 1);
            prop_assert!(estimate_tokens(&longer) >= estimate_tokens(&shorter));
        }
    }
}

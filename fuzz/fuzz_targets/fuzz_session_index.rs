//! Fuzz target for association key normalization.
//!
//! Run with:
//! cargo +nightly fuzz run fuzz_session_index -- -max_total_time=600

#![no_main]

use fedgate_saml::session::{normalize_session_index, MAX_SESSION_INDEX_LEN};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let index = String::from_utf8_lossy(data);
    let normalized = normalize_session_index(&index);

    if index.chars().count() <= MAX_SESSION_INDEX_LEN {
        assert_eq!(normalized, index);
    } else {
        assert_eq!(normalized.len(), 40);
        assert!(normalized.chars().all(|c| c.is_ascii_hexdigit()));
    }

    // Normalizing twice is stable
    assert_eq!(normalize_session_index(&normalized), normalized);
});

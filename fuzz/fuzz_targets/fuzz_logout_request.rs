//! Fuzz target for LogoutRequest parsing.
//!
//! Arbitrary XML must either parse or produce an error, never panic.
//!
//! Run with:
//! cargo +nightly fuzz run fuzz_logout_request -- -max_total_time=600

#![no_main]

use fedgate_saml::services::{parse_logout_request, parse_logout_request_xml};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(xml) = std::str::from_utf8(data) {
        if let Ok(request) = parse_logout_request_xml(xml) {
            assert!(request.id.len() <= 256);
            assert!(request.session_indexes.iter().all(|s| s.len() <= 1024));
        }

        // Same input treated as the base64 form parameter
        let _ = parse_logout_request(xml);
    }
});

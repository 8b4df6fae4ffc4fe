//! Trust validator tests against generated keys and certificates

pub mod encryption_tests;
pub mod logout_request_tests;
pub mod validity_tests;

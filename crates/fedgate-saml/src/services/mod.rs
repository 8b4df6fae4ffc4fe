//! SAML trust validation and logout services

pub mod back_channel;
pub mod certificate_resolver;
pub mod decryption;
pub mod logout_coordinator;
pub mod logout_parser;
pub mod signature;
pub mod slo_builder;
pub mod slo_orchestrator;
pub mod trust_validator;

pub use back_channel::{is_safe_slo_url, BackChannelDispatcher, BackChannelLogout};
pub use certificate_resolver::CertificateResolver;
pub use decryption::decrypt_assertion;
pub use logout_coordinator::{LocalSessionDispatcher, LogoutCoordinator};
pub use logout_parser::{parse_logout_request, parse_logout_request_xml};
pub use signature::SigningCredentials;
pub use slo_builder::{simple_sign_content, SignedMessage, SloBuilder};
pub use slo_orchestrator::{
    LogoutDispatcher, LogoutOutcome, LogoutTarget, SloOrchestrator, TargetStatus,
};
pub use trust_validator::TrustValidator;

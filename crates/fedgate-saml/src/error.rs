//! SAML-specific error types

use crate::session::StoreError;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Result type for SAML operations
pub type SamlResult<T> = Result<T, SamlError>;

/// Top-level SAML status: the request was at fault.
pub const STATUS_REQUESTER: &str = "urn:oasis:names:tc:SAML:2.0:status:Requester";
/// Top-level SAML status: the responder was at fault.
pub const STATUS_RESPONDER: &str = "urn:oasis:names:tc:SAML:2.0:status:Responder";
/// Second-level status for partial logout.
pub const STATUS_PARTIAL_LOGOUT: &str = "urn:oasis:names:tc:SAML:2.0:status:PartialLogout";

/// SAML-specific errors
#[derive(Debug, Error)]
pub enum SamlError {
    /// The peer reported a non-success status in the message itself
    #[error("Peer returned status {code}{}{}", .sub_code.as_ref().map(|s| format!(" / {s}")).unwrap_or_default(), .message.as_ref().map(|m| format!(": {m}")).unwrap_or_default())]
    Status {
        code: String,
        sub_code: Option<String>,
        message: Option<String>,
    },

    /// Structural violation: wrong cardinality, mismatched correlation fields
    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    /// Signature absent or invalid, or no matching certificate
    #[error("Untrusted message: {0}")]
    UntrustedMessage(String),

    /// Validity window violated
    #[error("Expired assertion: {0}")]
    ExpiredAssertion(String),

    /// Our entity ID is not in the audience restriction
    #[error("Audience mismatch: {expected} not in {audiences:?}")]
    AudienceMismatch {
        expected: String,
        audiences: Vec<String>,
    },

    /// Recipient does not match the endpoint processing the message
    #[error("Recipient mismatch: expected {expected}, got {}", .actual.as_deref().unwrap_or("<none>"))]
    RecipientMismatch {
        expected: String,
        actual: Option<String>,
    },

    /// Encryption was required but the assertion was sent in the clear
    #[error("Policy violation: {0}")]
    PolicyViolation(String),

    /// Encrypted assertion could not be decrypted
    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    /// Missing or unusable key/trust configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Association store backend failure
    #[error("Association store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),

    /// Some associated services could not be confirmed as logged out
    #[error(
        "Partial logout failure: {} completed, {} failed, {} timed out",
        .completed.len(),
        .failed.len(),
        .timed_out.len()
    )]
    PartialLogoutFailure {
        completed: BTreeSet<String>,
        failed: BTreeMap<String, String>,
        timed_out: BTreeSet<String>,
    },

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl SamlError {
    /// SAML status codes to put in a protocol-level error response.
    ///
    /// Returns the top-level code and an optional second-level code.
    #[must_use]
    pub fn saml_status(&self) -> (&str, Option<&str>) {
        match self {
            SamlError::Status { code, sub_code, .. } => (code.as_str(), sub_code.as_deref()),
            SamlError::MalformedMessage(_)
            | SamlError::UntrustedMessage(_)
            | SamlError::ExpiredAssertion(_)
            | SamlError::AudienceMismatch { .. }
            | SamlError::RecipientMismatch { .. }
            | SamlError::PolicyViolation(_)
            | SamlError::DecryptionFailed(_) => (STATUS_REQUESTER, None),
            SamlError::PartialLogoutFailure { .. } => {
                (STATUS_RESPONDER, Some(STATUS_PARTIAL_LOGOUT))
            }
            SamlError::Configuration(_)
            | SamlError::StoreUnavailable(_)
            | SamlError::InternalError(_) => (STATUS_RESPONDER, None),
        }
    }

    /// Whether the end user must be told about this error directly.
    ///
    /// A partial logout leaves sessions the IdP could not confirm as closed,
    /// so the user has to be asked to close the browser.
    #[must_use]
    pub fn is_user_visible(&self) -> bool {
        matches!(self, SamlError::PartialLogoutFailure { .. })
    }

    /// Message that is safe to show outside the operator log.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            SamlError::Configuration(msg) => {
                tracing::error!("SAML configuration error: {}", msg);
                "The identity service is misconfigured".to_string()
            }
            SamlError::StoreUnavailable(e) => {
                tracing::error!("SAML association store error: {}", e);
                "A session storage error occurred".to_string()
            }
            SamlError::InternalError(msg) => {
                tracing::error!("SAML internal error: {}", msg);
                "An internal error occurred".to_string()
            }
            SamlError::DecryptionFailed(_) => "Assertion decryption failed".to_string(),
            SamlError::UntrustedMessage(_) => "Signature validation failed".to_string(),
            SamlError::PartialLogoutFailure { .. } => {
                "Not all services could be logged out. Close your browser to end every session."
                    .to_string()
            }
            SamlError::Status { .. }
            | SamlError::MalformedMessage(_)
            | SamlError::ExpiredAssertion(_)
            | SamlError::AudienceMismatch { .. }
            | SamlError::RecipientMismatch { .. }
            | SamlError::PolicyViolation(_) => self.to_string(),
        }
    }
}

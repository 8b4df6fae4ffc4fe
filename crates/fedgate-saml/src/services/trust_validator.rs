//! Trust validation for inbound SAML messages
//!
//! Decides whether a `Response` (and the single assertion inside it) is
//! authentic, fresh and addressed to us. Every failure is a typed
//! [`SamlError`]; nothing is recovered locally.

use super::certificate_resolver::CertificateResolver;
use super::decryption::decrypt_assertion;
use super::signature::verify_signature;
use crate::error::{SamlError, SamlResult};
use crate::metadata::Metadata;
use crate::models::{Assertion, AssertionItem, LogoutRequest, Response, Signature};
use chrono::{DateTime, Duration, Utc};

/// Allowed clock difference between us and the peer (seconds).
pub const CLOCK_SKEW_SECONDS: i64 = 60;

/// Stateless validator; safe to share across concurrent requests.
#[derive(Debug, Clone)]
pub struct TrustValidator {
    resolver: CertificateResolver,
    clock_skew: Duration,
}

impl Default for TrustValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl TrustValidator {
    #[must_use]
    pub fn new() -> Self {
        Self {
            resolver: CertificateResolver,
            clock_skew: Duration::seconds(CLOCK_SKEW_SECONDS),
        }
    }

    #[must_use]
    pub fn with_clock_skew(mut self, skew: Duration) -> Self {
        self.clock_skew = skew;
        self
    }

    /// Validate `response` sent by `peer` to the endpoint at `endpoint_url`.
    pub fn process_response(
        &self,
        own: &Metadata,
        peer: &Metadata,
        response: &Response,
        endpoint_url: &str,
    ) -> SamlResult<Assertion> {
        self.process_response_at(own, peer, response, endpoint_url, Utc::now())
    }

    /// [`Self::process_response`] against an explicit current time.
    pub fn process_response_at(
        &self,
        own: &Metadata,
        peer: &Metadata,
        response: &Response,
        endpoint_url: &str,
        now: DateTime<Utc>,
    ) -> SamlResult<Assertion> {
        let result = self.validate_response(own, peer, response, endpoint_url, now);
        match &result {
            Ok(assertion) => tracing::info!(
                response_id = %response.id,
                assertion_id = %assertion.id,
                issuer = %response.issuer,
                "SAML response accepted"
            ),
            Err(e) => tracing::warn!(
                response_id = %response.id,
                issuer = %response.issuer,
                error = %e,
                "SAML response rejected"
            ),
        }
        result
    }

    fn validate_response(
        &self,
        own: &Metadata,
        peer: &Metadata,
        response: &Response,
        endpoint_url: &str,
        now: DateTime<Utc>,
    ) -> SamlResult<Assertion> {
        if !response.status.is_success() {
            return Err(SamlError::Status {
                code: response.status.code.clone(),
                sub_code: response.status.sub_code.clone(),
                message: response.status.message.clone(),
            });
        }

        let item = match response.assertions.as_slice() {
            [single] => single,
            [] => {
                return Err(SamlError::MalformedMessage(
                    "response contains no assertion".to_string(),
                ))
            }
            many => {
                return Err(SamlError::MalformedMessage(format!(
                    "response contains {} assertions, expected exactly one",
                    many.len()
                )))
            }
        };

        let assertion = match item {
            AssertionItem::Plain(assertion) => {
                if own.encryption_required() || peer.encryption_required() {
                    return Err(SamlError::PolicyViolation(
                        "received unencrypted assertion while encryption is required".to_string(),
                    ));
                }
                assertion.clone()
            }
            AssertionItem::Encrypted(encrypted) => decrypt_assertion(own, peer, encrypted)?,
        };

        self.check_sign(peer, response, &assertion)?;
        check_consistency(response, &assertion)?;
        self.check_validity_window(&assertion, now)?;
        check_audience(own, &assertion)?;
        check_recipient(&assertion, endpoint_url)?;

        Ok(assertion)
    }

    /// Accept when either the assertion or the response signature verifies.
    ///
    /// A peer without any trust anchor is rejected as misconfigured before
    /// either signature is looked at.
    fn check_sign(&self, peer: &Metadata, response: &Response, assertion: &Assertion) -> SamlResult<()> {
        self.resolver.require_trust_anchor(peer)?;

        let assertion_content = assertion
            .signed_content()
            .map_err(|e| SamlError::InternalError(format!("cannot serialize assertion: {e}")))?;
        if self.verify_element(peer, assertion.signature.as_ref(), &assertion_content)? {
            tracing::debug!(assertion_id = %assertion.id, "Assertion signature verified");
            return Ok(());
        }

        let response_content = response
            .signed_content()
            .map_err(|e| SamlError::InternalError(format!("cannot serialize response: {e}")))?;
        if self.verify_element(peer, response.signature.as_ref(), &response_content)? {
            tracing::debug!(response_id = %response.id, "Response signature verified");
            return Ok(());
        }

        Err(SamlError::UntrustedMessage(
            if assertion.signature.is_none() && response.signature.is_none() {
                "neither the assertion nor the response was signed".to_string()
            } else {
                "no signature verified against the peer's trust anchor".to_string()
            },
        ))
    }

    /// `Ok(false)` for an absent or non-verifying signature. Configuration
    /// problems propagate so they are not reported as trust failures.
    fn verify_element(
        &self,
        peer: &Metadata,
        signature: Option<&Signature>,
        content: &[u8],
    ) -> SamlResult<bool> {
        let Some(signature) = signature else {
            return Ok(false);
        };

        let keys = match self.resolver.resolve(peer, &signature.certificates) {
            Ok(keys) => keys,
            Err(SamlError::UntrustedMessage(reason)) => {
                tracing::debug!(reason = %reason, "No usable key for signature");
                return Ok(false);
            }
            Err(e) => return Err(e),
        };

        for key in &keys {
            match verify_signature(key, &signature.algorithm, content, &signature.value) {
                Ok(true) => return Ok(true),
                Ok(false) => {}
                Err(SamlError::UntrustedMessage(reason)) => {
                    tracing::debug!(reason = %reason, "Signature could not be checked");
                    return Ok(false);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(false)
    }

    fn check_validity_window(&self, assertion: &Assertion, now: DateTime<Utc>) -> SamlResult<()> {
        if let Some(not_before) = assertion.not_before {
            if not_before > now + self.clock_skew {
                return Err(SamlError::ExpiredAssertion(format!(
                    "assertion not valid before {not_before}"
                )));
            }
        }
        if let Some(not_on_or_after) = assertion.not_on_or_after {
            if not_on_or_after <= now - self.clock_skew {
                return Err(SamlError::ExpiredAssertion(format!(
                    "assertion expired at {not_on_or_after}"
                )));
            }
        }
        if let Some(session_expiry) = assertion.session_not_on_or_after {
            if session_expiry <= now - self.clock_skew {
                return Err(SamlError::ExpiredAssertion(format!(
                    "session expired at {session_expiry}"
                )));
            }
        }
        Ok(())
    }

    /// Validate an inbound `LogoutRequest`.
    ///
    /// `signed_content` is whatever the binding signed (the query string
    /// for HTTP-Redirect, the serialized request otherwise). A signature is
    /// only demanded when the peer's metadata sets `validate.logout`.
    pub fn validate_logout_request(
        &self,
        peer: &Metadata,
        request: &LogoutRequest,
        signature: Option<&Signature>,
        signed_content: &[u8],
        endpoint_url: &str,
        now: DateTime<Utc>,
    ) -> SamlResult<()> {
        if peer.validate_logout() && !self.verify_element(peer, signature, signed_content)? {
            tracing::warn!(
                request_id = %request.id,
                issuer = %request.issuer,
                signed = signature.is_some(),
                "LogoutRequest signature rejected"
            );
            return Err(SamlError::UntrustedMessage(
                "LogoutRequest signature missing or invalid".to_string(),
            ));
        }

        if let Some(destination) = &request.destination {
            if destination != endpoint_url {
                return Err(SamlError::RecipientMismatch {
                    expected: endpoint_url.to_string(),
                    actual: Some(destination.clone()),
                });
            }
        }

        if let Some(not_on_or_after) = request.not_on_or_after {
            if not_on_or_after <= now - self.clock_skew {
                return Err(SamlError::ExpiredAssertion(format!(
                    "LogoutRequest expired at {not_on_or_after}"
                )));
            }
        }

        Ok(())
    }
}

fn check_consistency(response: &Response, assertion: &Assertion) -> SamlResult<()> {
    if let (Some(outer), Some(inner)) = (&response.in_response_to, &assertion.in_response_to) {
        if outer != inner {
            return Err(SamlError::MalformedMessage(format!(
                "InResponseTo mismatch: response {outer}, assertion {inner}"
            )));
        }
    }
    if let (Some(outer), Some(inner)) = (&response.destination, &assertion.recipient) {
        if outer != inner {
            return Err(SamlError::MalformedMessage(format!(
                "Destination mismatch: response {outer}, assertion {inner}"
            )));
        }
    }
    Ok(())
}

fn check_audience(own: &Metadata, assertion: &Assertion) -> SamlResult<()> {
    if assertion.audiences.is_empty() {
        return Ok(());
    }
    let entity_id = own.entity_id()?;
    if assertion.audiences.iter().any(|a| *a == entity_id) {
        Ok(())
    } else {
        Err(SamlError::AudienceMismatch {
            expected: entity_id,
            audiences: assertion.audiences.clone(),
        })
    }
}

fn check_recipient(assertion: &Assertion, endpoint_url: &str) -> SamlResult<()> {
    match &assertion.recipient {
        Some(recipient) if recipient == endpoint_url => Ok(()),
        other => Err(SamlError::RecipientMismatch {
            expected: endpoint_url.to_string(),
            actual: other.clone(),
        }),
    }
}

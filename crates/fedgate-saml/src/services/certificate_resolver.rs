//! Resolution of the public key a peer's signature must verify against
//!
//! Order of precedence:
//! 1. full certificate(s) configured in the peer metadata;
//! 2. an embedded certificate whose SHA-1 fingerprint is configured;
//! 3. the first embedded certificate, validated against a CA bundle.
//!
//! A peer with none of the three configured is a configuration problem,
//! not an untrusted message.

use super::signature::{parse_certificate, sha1_fingerprint};
use crate::error::{SamlError, SamlResult};
use crate::metadata::Metadata;
use openssl::pkey::{PKey, Public};
use openssl::stack::Stack;
use openssl::x509::store::X509StoreBuilder;
use openssl::x509::{X509StoreContext, X509};
use std::path::Path;

/// Stateless resolver; see module docs for the precedence rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct CertificateResolver;

impl CertificateResolver {
    /// Candidate verification keys for a message from `peer`.
    ///
    /// `embedded` holds the base64 DER certificates carried in the message's
    /// `KeyInfo`, signer first.
    pub fn resolve(&self, peer: &Metadata, embedded: &[String]) -> SamlResult<Vec<PKey<Public>>> {
        let configured = peer.signing_certificates()?;
        if !configured.is_empty() {
            return configured
                .iter()
                .map(|data| {
                    let cert = parse_certificate(data).map_err(|e| {
                        SamlError::Configuration(format!("metadata certificate unusable: {e}"))
                    })?;
                    public_key(&cert)
                })
                .collect();
        }

        let fingerprints = peer.fingerprints();
        if !fingerprints.is_empty() {
            let cert = find_by_fingerprint(embedded, &fingerprints)?;
            return Ok(vec![public_key(&cert)?]);
        }

        if let Some(ca_file) = peer.ca_file() {
            let cert = validate_against_ca(embedded, &ca_file)?;
            return Ok(vec![public_key(&cert)?]);
        }

        Err(missing_trust_anchor(peer))
    }

    /// Whether `peer` configures any certificate, fingerprint or CA bundle.
    pub fn has_trust_anchor(&self, peer: &Metadata) -> SamlResult<bool> {
        Ok(!peer.signing_certificates()?.is_empty()
            || !peer.fingerprints().is_empty()
            || peer.ca_file().is_some())
    }

    /// Fail with a configuration error unless `peer` has a trust anchor.
    pub fn require_trust_anchor(&self, peer: &Metadata) -> SamlResult<()> {
        if self.has_trust_anchor(peer)? {
            Ok(())
        } else {
            Err(missing_trust_anchor(peer))
        }
    }
}

fn missing_trust_anchor(peer: &Metadata) -> SamlError {
    SamlError::Configuration(format!(
        "no certData, certFingerprint or caFile configured for {}",
        peer.get_string("entityid", Some("<unknown entity>"))
            .unwrap_or_default()
    ))
}

fn public_key(cert: &X509) -> SamlResult<PKey<Public>> {
    cert.public_key()
        .map_err(|e| SamlError::UntrustedMessage(format!("Invalid certificate key: {e}")))
}

fn find_by_fingerprint(embedded: &[String], fingerprints: &[String]) -> SamlResult<X509> {
    if embedded.is_empty() {
        return Err(SamlError::UntrustedMessage(
            "message carries no certificate to match against certFingerprint".to_string(),
        ));
    }

    let mut seen = Vec::with_capacity(embedded.len());
    for data in embedded {
        let cert = parse_certificate(data)?;
        let fingerprint = sha1_fingerprint(&cert)?;
        if fingerprints.iter().any(|f| *f == fingerprint) {
            tracing::debug!(fingerprint = %fingerprint, "Embedded certificate matched fingerprint");
            return Ok(cert);
        }
        seen.push(fingerprint);
    }

    tracing::warn!(
        candidates = ?seen,
        configured = ?fingerprints,
        "No embedded certificate matched a configured fingerprint"
    );
    Err(SamlError::UntrustedMessage(
        "no embedded certificate matches the configured fingerprints".to_string(),
    ))
}

fn validate_against_ca(embedded: &[String], ca_file: &Path) -> SamlResult<X509> {
    let Some((first, rest)) = embedded.split_first() else {
        return Err(SamlError::UntrustedMessage(
            "message carries no certificate to validate against caFile".to_string(),
        ));
    };

    let bundle = std::fs::read(ca_file).map_err(|e| {
        SamlError::Configuration(format!("cannot read caFile {}: {e}", ca_file.display()))
    })?;
    let authorities = X509::stack_from_pem(&bundle).map_err(|e| {
        SamlError::Configuration(format!("invalid caFile {}: {e}", ca_file.display()))
    })?;
    if authorities.is_empty() {
        return Err(SamlError::Configuration(format!(
            "caFile {} contains no certificates",
            ca_file.display()
        )));
    }

    let leaf = parse_certificate(first)?;
    let ssl_err = |e: openssl::error::ErrorStack| SamlError::InternalError(e.to_string());

    let mut store = X509StoreBuilder::new().map_err(ssl_err)?;
    for authority in authorities {
        store.add_cert(authority).map_err(ssl_err)?;
    }
    let store = store.build();

    // Any further embedded certificates may be intermediates
    let mut chain = Stack::new().map_err(ssl_err)?;
    for data in rest {
        chain.push(parse_certificate(data)?).map_err(ssl_err)?;
    }

    let mut context = X509StoreContext::new().map_err(ssl_err)?;
    let (valid, reason) = context
        .init(&store, &leaf, &chain, |c| {
            let valid = c.verify_cert()?;
            Ok((valid, c.error().error_string().to_string()))
        })
        .map_err(ssl_err)?;

    if valid {
        Ok(leaf)
    } else {
        tracing::warn!(reason = %reason, ca_file = %ca_file.display(), "Certificate rejected by CA bundle");
        Err(SamlError::UntrustedMessage(format!(
            "certificate not issued by a trusted CA: {reason}"
        )))
    }
}

//! Signature primitives shared by the validator and the logout dispatcher
//!
//! Wraps openssl for certificate parsing, fingerprinting, signature
//! verification and RSA signing.

use crate::error::{SamlError, SamlResult};
use base64::{engine::general_purpose::STANDARD, Engine};
use openssl::hash::MessageDigest;
use openssl::pkey::{PKey, Private, Public};
use openssl::sign::{Signer, Verifier};
use openssl::x509::X509;

pub const ALG_RSA_SHA1: &str = "http://www.w3.org/2000/09/xmldsig#rsa-sha1";
pub const ALG_RSA_SHA256: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256";
pub const ALG_RSA_SHA384: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha384";
pub const ALG_RSA_SHA512: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha512";

/// Parse an X.509 certificate given as PEM or as bare base64 DER.
pub fn parse_certificate(data: &str) -> SamlResult<X509> {
    if data.contains("-----BEGIN CERTIFICATE-----") {
        return X509::from_pem(data.as_bytes())
            .map_err(|e| SamlError::UntrustedMessage(format!("Invalid certificate: {e}")));
    }

    let der = STANDARD
        .decode(data.split_whitespace().collect::<String>())
        .map_err(|e| SamlError::UntrustedMessage(format!("Invalid certificate encoding: {e}")))?;
    X509::from_der(&der)
        .map_err(|e| SamlError::UntrustedMessage(format!("Invalid certificate: {e}")))
}

/// Lowercase hex SHA-1 fingerprint of a certificate's DER encoding.
pub fn sha1_fingerprint(cert: &X509) -> SamlResult<String> {
    let digest = cert
        .digest(MessageDigest::sha1())
        .map_err(|e| SamlError::InternalError(format!("Fingerprint failed: {e}")))?;
    Ok(hex::encode(digest))
}

/// Digest for a signature method URI.
pub fn digest_for_algorithm(algorithm: &str) -> SamlResult<MessageDigest> {
    match algorithm {
        ALG_RSA_SHA256 => Ok(MessageDigest::sha256()),
        ALG_RSA_SHA1 => Ok(MessageDigest::sha1()),
        ALG_RSA_SHA384 => Ok(MessageDigest::sha384()),
        ALG_RSA_SHA512 => Ok(MessageDigest::sha512()),
        alg => Err(SamlError::UntrustedMessage(format!(
            "Unsupported signature algorithm: {alg}"
        ))),
    }
}

/// Verify a base64 signature over `data` with one public key.
///
/// Returns `Ok(false)` for a well-formed signature that does not verify;
/// errors are reserved for undecodable input.
pub fn verify_signature(
    key: &PKey<Public>,
    algorithm: &str,
    data: &[u8],
    signature_b64: &str,
) -> SamlResult<bool> {
    let digest = digest_for_algorithm(algorithm)?;
    let signature = STANDARD
        .decode(signature_b64.split_whitespace().collect::<String>())
        .map_err(|e| SamlError::UntrustedMessage(format!("Invalid signature encoding: {e}")))?;

    let mut verifier = Verifier::new(digest, key).map_err(|e| {
        SamlError::UntrustedMessage(format!("Verifier creation failed: {e}"))
    })?;
    verifier
        .update(data)
        .map_err(|e| SamlError::UntrustedMessage(format!("Signature update failed: {e}")))?;

    // openssl reports a mismatching signature as an error on some key types
    Ok(verifier.verify(&signature).unwrap_or(false))
}

/// Private key and certificate used to sign outbound messages.
#[derive(Clone)]
pub struct SigningCredentials {
    key: PKey<Private>,
    certificate: X509,
}

impl SigningCredentials {
    /// Load from PEM-encoded certificate and private key.
    pub fn from_pem(certificate_pem: &str, key_pem: &str) -> SamlResult<Self> {
        let certificate = X509::from_pem(certificate_pem.as_bytes())
            .map_err(|e| SamlError::Configuration(format!("Invalid signing certificate: {e}")))?;
        let key = PKey::private_key_from_pem(key_pem.as_bytes())
            .map_err(|e| SamlError::Configuration(format!("Invalid signing key: {e}")))?;
        Ok(Self { key, certificate })
    }

    /// RSA-SHA256 signature over `data`, base64 encoded.
    pub fn sign_sha256(&self, data: &[u8]) -> SamlResult<String> {
        let mut signer = Signer::new(MessageDigest::sha256(), &self.key)
            .map_err(|e| SamlError::InternalError(format!("Signer creation failed: {e}")))?;
        signer
            .update(data)
            .map_err(|e| SamlError::InternalError(format!("Signing failed: {e}")))?;
        let signature = signer
            .sign_to_vec()
            .map_err(|e| SamlError::InternalError(format!("Signing failed: {e}")))?;
        Ok(STANDARD.encode(signature))
    }

    /// Signing certificate as base64 DER, for `KeyInfo`.
    pub fn certificate_base64_der(&self) -> SamlResult<String> {
        let der = self
            .certificate
            .to_der()
            .map_err(|e| SamlError::InternalError(format!("Certificate encoding failed: {e}")))?;
        Ok(STANDARD.encode(der))
    }
}

impl std::fmt::Debug for SigningCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningCredentials")
            .field("subject", &self.certificate.subject_name())
            .finish_non_exhaustive()
    }
}

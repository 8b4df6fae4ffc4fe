//! `EncryptedAssertion` decryption
//!
//! - Content: AES-256-GCM, encoded as base64(nonce || ciphertext || tag)
//! - Content key: the peer's pre-shared `sharedkey`, or an RSA-OAEP wrapped
//!   key unwrapped with our own private key

use crate::error::{SamlError, SamlResult};
use crate::metadata::Metadata;
use crate::models::{Assertion, EncryptedAssertion};
use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use openssl::encrypt::Decrypter;
use openssl::pkey::PKey;
use openssl::rsa::Padding;

/// Nonce size for AES-GCM (96 bits / 12 bytes).
pub const NONCE_SIZE: usize = 12;

/// Decrypt an assertion addressed to `own` and sent by `peer`.
pub fn decrypt_assertion(
    own: &Metadata,
    peer: &Metadata,
    encrypted: &EncryptedAssertion,
) -> SamlResult<Assertion> {
    let key = content_key(own, peer, encrypted)?;
    let plaintext = decrypt_content(&encrypted.cipher_value, &key)?;
    serde_json::from_slice(&plaintext)
        .map_err(|e| SamlError::DecryptionFailed(format!("Decrypted assertion is malformed: {e}")))
}

fn content_key(
    own: &Metadata,
    peer: &Metadata,
    encrypted: &EncryptedAssertion,
) -> SamlResult<Vec<u8>> {
    if let Some(shared) = peer.shared_key()? {
        tracing::debug!("Decrypting assertion with pre-shared key");
        return Ok(shared);
    }

    let wrapped = encrypted.encrypted_key.as_deref().ok_or_else(|| {
        SamlError::DecryptionFailed("no EncryptedKey and no sharedkey configured".to_string())
    })?;
    let key_pem = own.private_key_pem()?.ok_or_else(|| {
        SamlError::Configuration("no private key configured to decrypt assertions".to_string())
    })?;
    unwrap_key(&key_pem, wrapped)
}

fn unwrap_key(key_pem: &str, wrapped_b64: &str) -> SamlResult<Vec<u8>> {
    let private_key = PKey::private_key_from_pem(key_pem.as_bytes())
        .map_err(|e| SamlError::Configuration(format!("Invalid private key: {e}")))?;
    let wrapped = BASE64
        .decode(wrapped_b64)
        .map_err(|e| SamlError::DecryptionFailed(format!("Base64 decode failed: {e}")))?;

    let fail = |e: openssl::error::ErrorStack| SamlError::DecryptionFailed(e.to_string());
    let mut decrypter = Decrypter::new(&private_key).map_err(fail)?;
    decrypter.set_rsa_padding(Padding::PKCS1_OAEP).map_err(fail)?;

    let mut key = vec![0u8; decrypter.decrypt_len(&wrapped).map_err(fail)?];
    let len = decrypter.decrypt(&wrapped, &mut key).map_err(fail)?;
    key.truncate(len);

    if key.len() != 32 {
        return Err(SamlError::DecryptionFailed(format!(
            "Invalid content key length: expected 32 bytes, got {}",
            key.len()
        )));
    }
    Ok(key)
}

fn decrypt_content(encoded: &str, key: &[u8]) -> SamlResult<Vec<u8>> {
    let encrypted = BASE64
        .decode(encoded)
        .map_err(|e| SamlError::DecryptionFailed(format!("Base64 decode failed: {e}")))?;

    if encrypted.len() < NONCE_SIZE + 1 {
        return Err(SamlError::DecryptionFailed(
            "Invalid encrypted data format".to_string(),
        ));
    }

    let cipher =
        Aes256Gcm::new_from_slice(key).map_err(|e| SamlError::DecryptionFailed(e.to_string()))?;
    let nonce = Nonce::from_slice(&encrypted[..NONCE_SIZE]);

    cipher
        .decrypt(nonce, &encrypted[NONCE_SIZE..])
        .map_err(|e| SamlError::DecryptionFailed(e.to_string()))
}

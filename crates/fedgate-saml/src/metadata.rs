//! Parsed entity metadata
//!
//! Metadata arrives from an external loader as a flat JSON object keyed by
//! the usual SAML configuration names (`entityid`, `keys`, `certFingerprint`,
//! `caFile`, `assertion.encryption`, ...). This module only offers read
//! access; metadata is immutable for the lifetime of a request.

use crate::error::{SamlError, SamlResult};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::PathBuf;

/// Read-only configuration object describing one entity.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct Metadata {
    values: Map<String, Value>,
}

impl Metadata {
    #[must_use]
    pub fn new(values: Map<String, Value>) -> Self {
        Self { values }
    }

    /// Build from a JSON value; anything but an object is a configuration error.
    pub fn from_value(value: Value) -> SamlResult<Self> {
        match value {
            Value::Object(values) => Ok(Self { values }),
            other => Err(SamlError::Configuration(format!(
                "metadata must be an object, got {other}"
            ))),
        }
    }

    #[must_use]
    pub fn has_value(&self, key: &str) -> bool {
        self.values.get(key).is_some_and(|v| !v.is_null())
    }

    /// String option, or `default` when absent or not a string.
    #[must_use]
    pub fn get_string(&self, key: &str, default: Option<&str>) -> Option<String> {
        self.values
            .get(key)
            .and_then(Value::as_str)
            .or(default)
            .map(str::to_string)
    }

    #[must_use]
    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        self.values
            .get(key)
            .and_then(Value::as_bool)
            .unwrap_or(default)
    }

    /// Array option; a single scalar is treated as a one-element array.
    #[must_use]
    pub fn get_array(&self, key: &str) -> Vec<Value> {
        match self.values.get(key) {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items.clone(),
            Some(other) => vec![other.clone()],
        }
    }

    /// `entityid`, required.
    pub fn entity_id(&self) -> SamlResult<String> {
        self.get_string("entityid", None)
            .ok_or_else(|| SamlError::Configuration("metadata has no entityid".to_string()))
    }

    /// Signing certificates configured in full, as PEM or bare base64 DER.
    ///
    /// `keys` entries win over `certData`, which wins over a `certificate`
    /// file. Entries flagged `"signing": false` are skipped.
    pub fn signing_certificates(&self) -> SamlResult<Vec<String>> {
        let from_keys: Vec<String> = self
            .get_array("keys")
            .iter()
            .filter(|k| k.get("signing").and_then(Value::as_bool).unwrap_or(true))
            .filter_map(|k| k.get("X509Certificate").and_then(Value::as_str))
            .map(str::to_string)
            .collect();
        if !from_keys.is_empty() {
            return Ok(from_keys);
        }

        if let Some(cert_data) = self.get_string("certData", None) {
            return Ok(vec![cert_data]);
        }

        if let Some(path) = self.get_string("certificate", None) {
            let pem = std::fs::read_to_string(&path).map_err(|e| {
                SamlError::Configuration(format!("cannot read certificate {path}: {e}"))
            })?;
            return Ok(vec![pem]);
        }

        Ok(Vec::new())
    }

    /// `certFingerprint` entries, lowercase hex without separators.
    #[must_use]
    pub fn fingerprints(&self) -> Vec<String> {
        self.get_array("certFingerprint")
            .iter()
            .filter_map(Value::as_str)
            .map(normalize_fingerprint)
            .filter(|f| !f.is_empty())
            .collect()
    }

    /// `caFile`: path to a PEM bundle of trusted issuers.
    #[must_use]
    pub fn ca_file(&self) -> Option<PathBuf> {
        self.get_string("caFile", None).map(PathBuf::from)
    }

    /// `assertion.encryption`
    #[must_use]
    pub fn encryption_required(&self) -> bool {
        self.get_bool("assertion.encryption", false)
    }

    /// `validate.logout`: whether logout messages from this entity must be signed.
    #[must_use]
    pub fn validate_logout(&self) -> bool {
        self.get_bool("validate.logout", true)
    }

    /// `sharedkey`: 32-byte symmetric key, base64 or hex encoded.
    pub fn shared_key(&self) -> SamlResult<Option<Vec<u8>>> {
        let Some(encoded) = self.get_string("sharedkey", None) else {
            return Ok(None);
        };
        let trimmed = encoded.trim();
        let key = hex::decode(trimmed)
            .ok()
            .filter(|k| k.len() == 32)
            .or_else(|| STANDARD.decode(trimmed).ok())
            .ok_or_else(|| {
                SamlError::Configuration("sharedkey is neither hex nor base64".to_string())
            })?;
        if key.len() != 32 {
            return Err(SamlError::Configuration(format!(
                "sharedkey must be 32 bytes, got {}",
                key.len()
            )));
        }
        Ok(Some(key))
    }

    /// Private key PEM from `privatekey_pem`, or the file at `privatekey`.
    pub fn private_key_pem(&self) -> SamlResult<Option<String>> {
        if let Some(pem) = self.get_string("privatekey_pem", None) {
            return Ok(Some(pem));
        }
        let Some(path) = self.get_string("privatekey", None) else {
            return Ok(None);
        };
        std::fs::read_to_string(&path)
            .map(Some)
            .map_err(|e| SamlError::Configuration(format!("cannot read private key {path}: {e}")))
    }

    /// `SingleLogoutService` location, either a plain string or the first
    /// `{ "Location": ... }` endpoint.
    #[must_use]
    pub fn single_logout_service(&self) -> Option<String> {
        self.get_array("SingleLogoutService")
            .iter()
            .find_map(|endpoint| match endpoint {
                Value::String(s) => Some(s.clone()),
                Value::Object(o) => o.get("Location").and_then(Value::as_str).map(str::to_string),
                _ => None,
            })
    }
}

/// Lowercase hex without `:` separators or whitespace.
#[must_use]
pub fn normalize_fingerprint(fingerprint: &str) -> String {
    fingerprint
        .chars()
        .filter(|c| *c != ':' && !c.is_whitespace())
        .collect::<String>()
        .to_lowercase()
}

//! SAML `Response` envelope, status and signature

use super::assertion::AssertionItem;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const STATUS_SUCCESS: &str = "urn:oasis:names:tc:SAML:2.0:status:Success";

/// Status carried by a protocol response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Status {
    #[must_use]
    pub fn success() -> Self {
        Self {
            code: STATUS_SUCCESS.to_string(),
            sub_code: None,
            message: None,
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.code == STATUS_SUCCESS
    }
}

impl Default for Status {
    fn default() -> Self {
        Self::success()
    }
}

/// Enveloped signature over an element's signed content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    /// Signature method URI, e.g. `http://www.w3.org/2001/04/xmldsig-more#rsa-sha256`
    pub algorithm: String,
    /// Base64-encoded signature value
    pub value: String,
    /// Base64 DER certificates from `KeyInfo`, signer first
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub certificates: Vec<String>,
}

/// Inbound SAML `Response`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub id: String,
    pub issuer: String,
    pub issue_instant: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_response_to: Option<String>,
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub assertions: Vec<AssertionItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<Signature>,
}

impl Response {
    /// Bytes covered by the response signature: the whole response,
    /// including the assertions in the form they were sent, minus the
    /// signature itself.
    pub fn signed_content(&self) -> Result<Vec<u8>, serde_json::Error> {
        let mut unsigned = self.clone();
        unsigned.signature = None;
        serde_json::to_vec(&unsigned)
    }
}

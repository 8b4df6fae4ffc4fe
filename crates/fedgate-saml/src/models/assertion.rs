//! SAML `Assertion`, plain or encrypted

use super::name_id::NameId;
use super::response::Signature;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Identity statement issued by an `IdP`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assertion {
    pub id: String,
    pub issuer: String,
    pub issue_instant: DateTime<Utc>,
    pub name_id: NameId,
    /// `AuthnStatement/@SessionIndex`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_index: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_before: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_on_or_after: Option<DateTime<Utc>>,
    /// `AuthnStatement/@SessionNotOnOrAfter`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_not_on_or_after: Option<DateTime<Utc>>,
    /// `AudienceRestriction` entries; empty means unrestricted
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub audiences: Vec<String>,
    /// `SubjectConfirmationData/@Recipient`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,
    /// `SubjectConfirmationData/@InResponseTo`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_response_to: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<Signature>,
}

impl Assertion {
    /// Bytes covered by the assertion's own signature.
    pub fn signed_content(&self) -> Result<Vec<u8>, serde_json::Error> {
        let mut unsigned = self.clone();
        unsigned.signature = None;
        serde_json::to_vec(&unsigned)
    }
}

/// `EncryptedAssertion` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedAssertion {
    /// Base64 RSA-OAEP wrapped content key; absent when a shared key is used
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypted_key: Option<String>,
    /// Base64 of `nonce || AES-256-GCM ciphertext`
    pub cipher_value: String,
}

/// One entry of a response's assertion list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum AssertionItem {
    Plain(Assertion),
    Encrypted(EncryptedAssertion),
}

impl AssertionItem {
    #[must_use]
    pub fn is_encrypted(&self) -> bool {
        matches!(self, AssertionItem::Encrypted(_))
    }
}

//! SAML `NameID`

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const NAMEID_FORMAT_EMAIL: &str = "urn:oasis:names:tc:SAML:1.1:nameid-format:emailAddress";
pub const NAMEID_FORMAT_PERSISTENT: &str = "urn:oasis:names:tc:SAML:2.0:nameid-format:persistent";
pub const NAMEID_FORMAT_TRANSIENT: &str = "urn:oasis:names:tc:SAML:2.0:nameid-format:transient";

/// Subject identifier: a value plus its format and optional qualifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameId {
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_qualifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sp_name_qualifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sp_provided_id: Option<String>,
}

impl NameId {
    /// `NameID` with just a value and format.
    pub fn new(value: impl Into<String>, format: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            format: Some(format.into()),
            name_qualifier: None,
            sp_name_qualifier: None,
            sp_provided_id: None,
        }
    }

    /// Key/value view used for association hashing.
    ///
    /// Keys follow the protocol attribute names; absent qualifiers are
    /// omitted rather than stored empty.
    #[must_use]
    pub fn to_fields(&self) -> HashMap<String, String> {
        let mut fields = HashMap::new();
        fields.insert("Value".to_string(), self.value.clone());
        let optional = [
            ("Format", &self.format),
            ("NameQualifier", &self.name_qualifier),
            ("SPNameQualifier", &self.sp_name_qualifier),
            ("SPProvidedID", &self.sp_provided_id),
        ];
        for (key, value) in optional {
            if let Some(v) = value {
                fields.insert(key.to_string(), v.clone());
            }
        }
        fields
    }

    /// Format, falling back to `unspecified`.
    #[must_use]
    pub fn format_or_unspecified(&self) -> &str {
        self.format
            .as_deref()
            .unwrap_or("urn:oasis:names:tc:SAML:1.1:nameid-format:unspecified")
    }
}

//! SAML `LogoutRequest` and `LogoutResponse` builder
//!
//! Messages are signed with the HTTP-POST-SimpleSign construction: the
//! signature covers `SAMLRequest=<value>&SigAlg=<alg>` rather than an
//! enveloped XML signature.

use super::signature::{SigningCredentials, ALG_RSA_SHA256};
use crate::error::SamlResult;
use crate::models::NameId;
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::Utc;
use uuid::Uuid;

/// Form fields of a SimpleSign-signed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedMessage {
    /// Message ID, for correlating the response
    pub id: String,
    /// `SAMLRequest` or `SAMLResponse`
    pub parameter: &'static str,
    /// Base64 XML
    pub value: String,
    pub sig_alg: &'static str,
    /// Base64 signature over [`simple_sign_content`]
    pub signature: String,
    /// Signing certificate, base64 DER
    pub certificate: String,
}

impl SignedMessage {
    /// Fields for an `application/x-www-form-urlencoded` POST body.
    #[must_use]
    pub fn form_fields(&self) -> [(&str, &str); 3] {
        [
            (self.parameter, self.value.as_str()),
            ("SigAlg", self.sig_alg),
            ("Signature", self.signature.as_str()),
        ]
    }
}

/// Octets covered by a SimpleSign signature.
#[must_use]
pub fn simple_sign_content(
    parameter: &str,
    value: &str,
    relay_state: Option<&str>,
    sig_alg: &str,
) -> Vec<u8> {
    let mut content = format!("{parameter}={value}");
    if let Some(relay_state) = relay_state {
        content.push_str("&RelayState=");
        content.push_str(relay_state);
    }
    content.push_str("&SigAlg=");
    content.push_str(sig_alg);
    content.into_bytes()
}

/// Builder for outbound logout messages
#[derive(Debug, Clone)]
pub struct SloBuilder {
    issuer: String,
    credentials: SigningCredentials,
}

impl SloBuilder {
    #[must_use]
    pub fn new(issuer: String, credentials: SigningCredentials) -> Self {
        Self {
            issuer,
            credentials,
        }
    }

    /// Signed LogoutRequest for one principal at `destination`.
    pub fn build_logout_request(
        &self,
        destination: &str,
        name_id: &NameId,
        session_indexes: &[String],
    ) -> SamlResult<SignedMessage> {
        let request_id = format!("_lr_{}", Uuid::new_v4().simple());
        let issue_instant = Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string();

        let mut xml = String::new();
        xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        xml.push_str("<samlp:LogoutRequest xmlns:samlp=\"urn:oasis:names:tc:SAML:2.0:protocol\"\n");
        xml.push_str("    xmlns:saml=\"urn:oasis:names:tc:SAML:2.0:assertion\"\n");
        xml.push_str("    ID=\"");
        xml.push_str(&xml_escape(&request_id));
        xml.push_str("\"\n    Version=\"2.0\"\n    IssueInstant=\"");
        xml.push_str(&issue_instant);
        xml.push_str("\"\n    Destination=\"");
        xml.push_str(&xml_escape(destination));
        xml.push_str("\">\n    <saml:Issuer>");
        xml.push_str(&xml_escape(&self.issuer));
        xml.push_str("</saml:Issuer>\n    ");
        xml.push_str(&name_id_xml(name_id));
        for session_index in session_indexes {
            xml.push_str("\n    <samlp:SessionIndex>");
            xml.push_str(&xml_escape(session_index));
            xml.push_str("</samlp:SessionIndex>");
        }
        xml.push_str("\n</samlp:LogoutRequest>");

        self.sign("SAMLRequest", request_id, &xml)
    }

    /// Signed LogoutResponse answering `in_response_to`.
    pub fn build_logout_response(
        &self,
        in_response_to: &str,
        destination: &str,
        status_code: &str,
        sub_status_code: Option<&str>,
    ) -> SamlResult<SignedMessage> {
        let response_id = format!("_lresp_{}", Uuid::new_v4().simple());
        let issue_instant = Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string();

        let mut xml = String::new();
        xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        xml.push_str(
            "<samlp:LogoutResponse xmlns:samlp=\"urn:oasis:names:tc:SAML:2.0:protocol\"\n",
        );
        xml.push_str("    xmlns:saml=\"urn:oasis:names:tc:SAML:2.0:assertion\"\n");
        xml.push_str("    ID=\"");
        xml.push_str(&xml_escape(&response_id));
        xml.push_str("\"\n    Version=\"2.0\"\n    IssueInstant=\"");
        xml.push_str(&issue_instant);
        xml.push_str("\"\n    Destination=\"");
        xml.push_str(&xml_escape(destination));
        xml.push_str("\"\n    InResponseTo=\"");
        xml.push_str(&xml_escape(in_response_to));
        xml.push_str("\">\n    <saml:Issuer>");
        xml.push_str(&xml_escape(&self.issuer));
        xml.push_str("</saml:Issuer>\n    <samlp:Status>\n        <samlp:StatusCode Value=\"");
        xml.push_str(&xml_escape(status_code));
        match sub_status_code {
            Some(sub) => {
                xml.push_str("\">\n            <samlp:StatusCode Value=\"");
                xml.push_str(&xml_escape(sub));
                xml.push_str("\"/>\n        </samlp:StatusCode>");
            }
            None => xml.push_str("\"/>"),
        }
        xml.push_str("\n    </samlp:Status>\n</samlp:LogoutResponse>");

        self.sign("SAMLResponse", response_id, &xml)
    }

    fn sign(&self, parameter: &'static str, id: String, xml: &str) -> SamlResult<SignedMessage> {
        let value = STANDARD.encode(xml.as_bytes());
        let content = simple_sign_content(parameter, &value, None, ALG_RSA_SHA256);
        let signature = self.credentials.sign_sha256(&content)?;
        Ok(SignedMessage {
            id,
            parameter,
            value,
            sig_alg: ALG_RSA_SHA256,
            signature,
            certificate: self.credentials.certificate_base64_der()?,
        })
    }
}

fn name_id_xml(name_id: &NameId) -> String {
    let mut xml = String::from("<saml:NameID");
    let attributes = [
        ("Format", &name_id.format),
        ("NameQualifier", &name_id.name_qualifier),
        ("SPNameQualifier", &name_id.sp_name_qualifier),
        ("SPProvidedID", &name_id.sp_provided_id),
    ];
    for (name, value) in attributes {
        if let Some(value) = value {
            xml.push(' ');
            xml.push_str(name);
            xml.push_str("=\"");
            xml.push_str(&xml_escape(value));
            xml.push('"');
        }
    }
    xml.push('>');
    xml.push_str(&xml_escape(&name_id.value));
    xml.push_str("</saml:NameID>");
    xml
}

fn xml_escape(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' => result.push_str("&quot;"),
            '\'' => result.push_str("&apos;"),
            _ => result.push(c),
        }
    }
    result
}

//! Parse incoming SAML LogoutRequest XML

use crate::error::{SamlError, SamlResult};
use crate::models::{LogoutRequest, NameId};
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, Utc};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use std::collections::HashMap;

/// Upper bound on the encoded message size.
pub const MAX_LOGOUT_REQUEST_SIZE: usize = 512 * 1024;

/// Parse a base64-encoded SAML LogoutRequest
pub fn parse_logout_request(encoded: &str) -> SamlResult<LogoutRequest> {
    // Size check before decode
    if encoded.len() > MAX_LOGOUT_REQUEST_SIZE {
        return Err(SamlError::MalformedMessage(
            "LogoutRequest too large".to_string(),
        ));
    }

    let decoded = STANDARD
        .decode(encoded.split_whitespace().collect::<String>())
        .map_err(|e| SamlError::MalformedMessage(format!("Base64 decode failed: {e}")))?;
    let xml = String::from_utf8(decoded)
        .map_err(|e| SamlError::MalformedMessage(format!("Invalid UTF-8: {e}")))?;

    parse_logout_request_xml(&xml)
}

/// Parse LogoutRequest from raw XML
pub fn parse_logout_request_xml(xml: &str) -> SamlResult<LogoutRequest> {
    if xml.len() > MAX_LOGOUT_REQUEST_SIZE {
        return Err(SamlError::MalformedMessage(
            "LogoutRequest too large".to_string(),
        ));
    }

    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut root: Option<HashMap<String, String>> = None;
    let mut issuer = None;
    let mut name_id_value = None;
    let mut name_id_attrs = HashMap::new();
    let mut session_indexes = Vec::new();
    let mut current_element = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                let local = String::from_utf8_lossy(e.local_name().into_inner()).to_string();
                match local.as_str() {
                    "LogoutRequest" if root.is_none() => root = Some(attributes(e)?),
                    "NameID" => name_id_attrs = attributes(e)?,
                    _ => {}
                }
                current_element = local;
            }
            Ok(Event::Text(ref e)) => {
                let text = e
                    .unescape()
                    .map_err(|e| SamlError::MalformedMessage(format!("Invalid text: {e}")))?
                    .to_string();
                match current_element.as_str() {
                    "Issuer" if issuer.is_none() => issuer = Some(text),
                    "NameID" => name_id_value = Some(text),
                    "SessionIndex" => session_indexes.push(text),
                    _ => {}
                }
            }
            Ok(Event::End(_)) => {
                current_element.clear();
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(SamlError::MalformedMessage(format!(
                    "XML parse error: {e}"
                )));
            }
            _ => {}
        }
    }

    let mut root = root
        .ok_or_else(|| SamlError::MalformedMessage("Missing LogoutRequest element".to_string()))?;
    let id = root
        .remove("ID")
        .ok_or_else(|| SamlError::MalformedMessage("Missing LogoutRequest ID".to_string()))?;
    let issuer =
        issuer.ok_or_else(|| SamlError::MalformedMessage("Missing Issuer".to_string()))?;
    let value =
        name_id_value.ok_or_else(|| SamlError::MalformedMessage("Missing NameID".to_string()))?;

    // Validate lengths
    if id.len() > 256 {
        return Err(SamlError::MalformedMessage(
            "ID too long (max 256)".to_string(),
        ));
    }
    if issuer.len() > 1024 {
        return Err(SamlError::MalformedMessage(
            "Issuer too long (max 1024)".to_string(),
        ));
    }
    if value.len() > 4096 {
        return Err(SamlError::MalformedMessage(
            "NameID too long (max 4096)".to_string(),
        ));
    }
    if session_indexes.iter().any(|si| si.len() > 1024) {
        return Err(SamlError::MalformedMessage(
            "SessionIndex too long (max 1024)".to_string(),
        ));
    }

    Ok(LogoutRequest {
        id,
        issuer,
        issue_instant: root.get("IssueInstant").map(|v| parse_instant(v)).transpose()?,
        destination: root.remove("Destination"),
        name_id: NameId {
            value,
            format: name_id_attrs.remove("Format"),
            name_qualifier: name_id_attrs.remove("NameQualifier"),
            sp_name_qualifier: name_id_attrs.remove("SPNameQualifier"),
            sp_provided_id: name_id_attrs.remove("SPProvidedID"),
        },
        session_indexes,
        not_on_or_after: root.get("NotOnOrAfter").map(|v| parse_instant(v)).transpose()?,
        reason: root.remove("Reason"),
    })
}

fn attributes(element: &BytesStart<'_>) -> SamlResult<HashMap<String, String>> {
    let mut values = HashMap::new();
    for attr in element.attributes() {
        let attr =
            attr.map_err(|e| SamlError::MalformedMessage(format!("Invalid attribute: {e}")))?;
        let key = String::from_utf8_lossy(attr.key.local_name().into_inner()).to_string();
        let value = attr
            .unescape_value()
            .map_err(|e| SamlError::MalformedMessage(format!("Invalid attribute value: {e}")))?;
        values.insert(key, value.to_string());
    }
    Ok(values)
}

fn parse_instant(value: &str) -> SamlResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| SamlError::MalformedMessage(format!("Invalid timestamp {value}: {e}")))
}

//! Back-channel LogoutRequest delivery to service providers
//!
//! Used on the IdP side: each SP holding a session for the principal gets
//! a SimpleSign-signed LogoutRequest POSTed to its SingleLogoutService.
//! Combined with [`super::slo_orchestrator::SloOrchestrator`] every SP gets
//! its own deadline.

use super::slo_builder::SloBuilder;
use super::slo_orchestrator::LogoutDispatcher;
use crate::error::{SamlError, SamlResult};
use crate::models::NameId;
use async_trait::async_trait;
use std::time::Duration;

/// Per-request HTTP timeout; orchestrator deadlines are usually shorter.
const HTTP_TIMEOUT_SECONDS: u64 = 10;

/// What to send to one SP.
#[derive(Debug, Clone)]
pub struct BackChannelLogout {
    /// SP SingleLogoutService URL
    pub destination: String,
    pub name_id: NameId,
    pub session_indexes: Vec<String>,
}

/// Dispatcher POSTing signed LogoutRequests.
pub struct BackChannelDispatcher {
    builder: SloBuilder,
    http_client: reqwest::Client,
}

impl BackChannelDispatcher {
    pub fn new(builder: SloBuilder) -> SamlResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECONDS))
            .danger_accept_invalid_certs(false)
            .build()
            .map_err(|e| SamlError::InternalError(format!("HTTP client setup failed: {e}")))?;
        Ok(Self::with_client(builder, http_client))
    }

    #[must_use]
    pub fn with_client(builder: SloBuilder, http_client: reqwest::Client) -> Self {
        Self {
            builder,
            http_client,
        }
    }
}

#[async_trait]
impl LogoutDispatcher<BackChannelLogout> for BackChannelDispatcher {
    async fn dispatch(&self, target_id: &str, logout: BackChannelLogout) -> SamlResult<()> {
        if !is_safe_slo_url(&logout.destination) {
            return Err(SamlError::Configuration(format!(
                "SingleLogoutService URL {} is not allowed (must be HTTPS to a public host)",
                logout.destination
            )));
        }

        let message = self.builder.build_logout_request(
            &logout.destination,
            &logout.name_id,
            &logout.session_indexes,
        )?;

        let response = self
            .http_client
            .post(&logout.destination)
            .form(&message.form_fields())
            .send()
            .await
            .map_err(|e| {
                SamlError::InternalError(format!("LogoutRequest delivery failed: {e}"))
            })?;

        if response.status().is_success() {
            tracing::info!(
                target_id = %target_id,
                request_id = %message.id,
                slo_url = %logout.destination,
                "LogoutRequest delivered"
            );
            Ok(())
        } else {
            Err(SamlError::InternalError(format!(
                "SP answered LogoutRequest with HTTP {}",
                response.status()
            )))
        }
    }
}

/// HTTPS to a public address, or plain HTTP to localhost.
#[must_use]
pub fn is_safe_slo_url(url: &str) -> bool {
    let Ok(parsed) = url::Url::parse(url) else {
        return false;
    };

    let scheme = parsed.scheme();
    let host = parsed.host_str().unwrap_or("");

    // Allow HTTP only for localhost (development)
    if scheme == "http" {
        return host == "localhost" || host == "127.0.0.1" || host == "[::1]";
    }
    if scheme != "https" {
        return false;
    }

    // Block internal/private ranges to prevent SSRF
    match parsed.host() {
        Some(url::Host::Ipv4(ip)) => {
            !(ip.is_loopback() || ip.is_private() || ip.is_link_local() || ip.is_unspecified())
        }
        Some(url::Host::Ipv6(ip)) => {
            if ip.is_loopback() || ip.is_unspecified() {
                return false;
            }
            let first = ip.segments()[0];
            // fe80::/10 link-local, fc00::/7 unique local
            if first & 0xffc0 == 0xfe80 || first & 0xfe00 == 0xfc00 {
                return false;
            }
            match ip.to_ipv4_mapped() {
                Some(v4) => !(v4.is_loopback() || v4.is_private() || v4.is_link_local()),
                None => true,
            }
        }
        Some(url::Host::Domain(_)) => true,
        None => false,
    }
}

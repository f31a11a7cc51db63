//! Outbound HTTP plumbing shared by the loaders and the content proxy

use bytes::{Bytes, BytesMut};
use reqwest::{Client, Response, header::HeaderMap, redirect::Policy, tls};
use url::Url;

use crate::config::{ResolverConfig, defaults::DEFAULT_MAX_REDIRECTS};
use crate::errors::{AppError, AppResult};
use crate::models::Target;

/// Oldest TLS version accepted from upstream sites
pub const MIN_TLS_VERSION: tls::Version = tls::Version::TLS_1_3;

/// Build the single pooled client used for every upstream request.
///
/// TLS 1.3 only; HTTP/2 is negotiated through ALPN when the site offers it.
pub fn build_http_client(config: &ResolverConfig) -> AppResult<Client> {
    Client::builder()
        .min_tls_version(MIN_TLS_VERSION)
        .connect_timeout(config.connect_timeout)
        .user_agent(config.user_agent.as_str())
        .redirect(Policy::limited(DEFAULT_MAX_REDIRECTS))
        .build()
        .map_err(|e| AppError::configuration(format!("Failed to create HTTP client: {e}")))
}

/// Scheme used when turning a `Target` into outbound URLs.
///
/// Targets are always `https`; the plaintext variant only exists so in-crate
/// tests can talk to local mock servers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UpstreamScheme {
    #[default]
    Https,
    #[cfg(test)]
    Http,
}

impl UpstreamScheme {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Https => "https",
            #[cfg(test)]
            Self::Http => "http",
        }
    }

    /// Root URL of the target under this scheme
    pub fn base_url(self, target: &Target) -> Url {
        let mut url = target.base_url().clone();
        if url.scheme() != self.as_str() {
            // http <-> https is always permitted for special schemes
            let _ = url.set_scheme(self.as_str());
        }
        url
    }

    pub fn url_for(self, target: &Target, path: &str) -> Result<Url, url::ParseError> {
        self.base_url(target).join(path.trim_start_matches('/'))
    }
}

/// Read at most `limit` bytes of a response body, dropping the rest.
pub async fn read_capped(mut response: Response, limit: usize) -> Result<Bytes, reqwest::Error> {
    let mut buffer = BytesMut::new();
    while let Some(chunk) = response.chunk().await? {
        let remaining = limit.saturating_sub(buffer.len());
        if chunk.len() >= remaining {
            buffer.extend_from_slice(&chunk[..remaining]);
            break;
        }
        buffer.extend_from_slice(&chunk);
    }
    Ok(buffer.freeze())
}

/// Lowercased media type without parameters, e.g. `image/png`
pub fn content_type_essence(headers: &HeaderMap) -> Option<String> {
    headers
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or(v).trim().to_ascii_lowercase())
        .filter(|v| !v.is_empty())
}

//! Direct probe loader
//!
//! Sends concurrent HEAD requests for the conventional icon paths and takes
//! whichever acceptable response arrives first.

use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, trace, warn};
use url::Url;

use super::IconLoader;
use crate::config::ResolverConfig;
use crate::errors::{Interruption, LoaderError};
use crate::models::{ResolveContext, Target};
use crate::utils::{UpstreamScheme, content_type_essence};

pub struct DirectProbeLoader {
    client: Client,
    scheme: UpstreamScheme,
    paths: Vec<String>,
    timeout: Duration,
}

impl DirectProbeLoader {
    pub const NAME: &'static str = "direct";

    pub fn new(client: Client, config: &ResolverConfig) -> Self {
        Self {
            client,
            scheme: UpstreamScheme::default(),
            paths: config.probe_paths.clone(),
            timeout: config.probe_timeout,
        }
    }

    pub fn with_scheme(mut self, scheme: UpstreamScheme) -> Self {
        self.scheme = scheme;
        self
    }

    /// Check a single candidate; `Ok` only if it looks like an image
    async fn probe(&self, url: Url) -> Result<Url, LoaderError> {
        let response = self.client.head(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(LoaderError::RequestFailed {
                status: status.as_u16(),
            });
        }

        match content_type_essence(response.headers()) {
            Some(content_type) if is_icon_content_type(&content_type) => Ok(url),
            other => Err(LoaderError::invalid_response(format!(
                "unexpected content type {}",
                other.as_deref().unwrap_or("<none>")
            ))),
        }
    }
}

/// `image/*` or the generic binary type some servers use for `.ico`
pub fn is_icon_content_type(essence: &str) -> bool {
    essence.starts_with("image/") || essence == "application/octet-stream"
}

#[async_trait]
impl IconLoader for DirectProbeLoader {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn resolve(&self, ctx: &ResolveContext, target: &Target) -> Result<Url, LoaderError> {
        let candidates: Vec<Url> = self
            .paths
            .iter()
            .filter_map(|path| match self.scheme.url_for(target, path) {
                Ok(url) => Some(url),
                Err(e) => {
                    warn!(target = %target, path = %path, error = %e, "Skipping unusable probe path");
                    None
                }
            })
            .collect();

        let race = async {
            let mut probes: FuturesUnordered<_> =
                candidates.into_iter().map(|url| self.probe(url)).collect();

            while let Some(result) = probes.next().await {
                match result {
                    Ok(url) => return Some(url),
                    Err(e) => trace!(
                        request_id = ctx.request_id(),
                        target = %target,
                        error = %e,
                        "Probe candidate rejected"
                    ),
                }
            }
            None
        };

        // Remaining probes are dropped, and so aborted, once the race returns
        match ctx.within(self.timeout, race).await {
            Ok(Some(url)) => Ok(url),
            Ok(None) => Err(LoaderError::NotFound),
            Err(Interruption::TimedOut) => {
                debug!(
                    request_id = ctx.request_id(),
                    target = %target,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Direct probes timed out"
                );
                Err(LoaderError::NotFound)
            }
            Err(Interruption::Cancelled) => Err(LoaderError::Cancelled),
        }
    }
}

//! Icon content proxy
//!
//! Serves an icon either from a cache entry or by streaming it from the
//! resolved upstream URL. Successful upstream bodies are copied into the
//! cache as they pass through, as long as they fit the entry size limit.

use axum::body::Body;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::Response;
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use reqwest::Client;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

use super::icon_cache::{CacheEntry, IconCache};
use crate::config::ProxyConfig;
use crate::errors::{AppError, AppResult, DownloadError, Interruption};
use crate::models::{ResolveContext, Target};
use crate::observability::ResolverMetrics;
use crate::web::responses::plain_text;

/// Body written instead of an upstream error payload
pub const DOWNLOAD_FAILED_BODY: &str = "failed to download icon";

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Where the icon bytes come from
#[derive(Debug, Clone)]
pub enum IconSource {
    Cached(CacheEntry),
    Remote(Url),
}

pub struct ContentProxy {
    client: Client,
    cache: Arc<IconCache>,
    metrics: Arc<dyn ResolverMetrics>,
    timeout: Duration,
    cache_control: HeaderValue,
}

impl ContentProxy {
    pub fn new(
        client: Client,
        cache: Arc<IconCache>,
        metrics: Arc<dyn ResolverMetrics>,
        config: &ProxyConfig,
    ) -> AppResult<Self> {
        let cache_control = HeaderValue::from_str(&config.cache_control).map_err(|e| {
            AppError::configuration(format!("Invalid proxy.cache_control '{}': {e}", config.cache_control))
        })?;

        Ok(Self {
            client,
            cache,
            metrics,
            timeout: config.download_timeout,
            cache_control,
        })
    }

    pub async fn stream(
        &self,
        ctx: &ResolveContext,
        target: &Target,
        source: IconSource,
    ) -> AppResult<Response> {
        match source {
            IconSource::Cached(entry) => Ok(self.cached_response(entry)),
            IconSource::Remote(url) => self.fetch(ctx, target, url).await,
        }
    }

    fn cached_response(&self, entry: CacheEntry) -> Response {
        let content_type = HeaderValue::from_str(&entry.content_type)
            .unwrap_or_else(|_| HeaderValue::from_static(FALLBACK_CONTENT_TYPE));

        let mut response = Response::new(Body::from(entry.payload));
        let headers = response.headers_mut();
        headers.insert(header::CONTENT_TYPE, content_type);
        headers.insert(header::CACHE_CONTROL, self.cache_control.clone());
        response
    }

    async fn fetch(&self, ctx: &ResolveContext, target: &Target, url: Url) -> AppResult<Response> {
        let deadline = Instant::now() + self.timeout;

        let upstream = match ctx.within(self.timeout, self.client.get(url.clone()).send()).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Err(self.download_failed(ctx, &url, e.into())),
            Err(interruption) => return Err(self.download_failed(ctx, &url, interruption.into())),
        };

        let status = upstream.status();
        if status.is_client_error() || status.is_server_error() {
            self.metrics.download_finished(false);
            warn!(
                request_id = ctx.request_id(),
                url = %url,
                status = status.as_u16(),
                "Upstream responded with error status"
            );
            return Ok(download_failure_response(status, self.cache_control.clone()));
        }

        let content_type = upstream
            .headers()
            .get(header::CONTENT_TYPE)
            .cloned()
            .unwrap_or_else(|| HeaderValue::from_static(FALLBACK_CONTENT_TYPE));

        debug!(
            request_id = ctx.request_id(),
            url = %url,
            status = status.as_u16(),
            content_type = ?content_type,
            "Upstream accepted"
        );

        let body = self.tee_body(ctx, target, &url, status, &content_type, upstream, deadline);

        let mut response = Response::new(Body::from_stream(body));
        *response.status_mut() = status;
        let headers = response.headers_mut();
        headers.insert(header::CONTENT_TYPE, content_type);
        headers.insert(header::CACHE_CONTROL, self.cache_control.clone());
        Ok(response)
    }

    /// Forward the upstream body chunk by chunk, buffering a copy for the
    /// cache. The copy is inserted once the body has been fully read.
    #[allow(clippy::too_many_arguments)]
    fn tee_body(
        &self,
        ctx: &ResolveContext,
        target: &Target,
        url: &Url,
        status: StatusCode,
        content_type: &HeaderValue,
        upstream: reqwest::Response,
        deadline: Instant,
    ) -> impl futures::Stream<Item = Result<Bytes, io::Error>> + Send + 'static {
        let cache = self.cache.clone();
        let metrics = self.metrics.clone();
        let cancel = ctx.cancellation().clone();
        let request_id = ctx.request_id().to_string();
        let target = target.clone();
        let url = url.clone();
        let cacheable = status.is_success();
        let content_type = content_type
            .to_str()
            .unwrap_or(FALLBACK_CONTENT_TYPE)
            .to_string();
        let limit = cache.max_entry_size();
        let mut chunks = Box::pin(upstream.bytes_stream());

        async_stream::stream! {
            let mut buffer = Some(BytesMut::new());
            let mut total: u64 = 0;

            loop {
                let next = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Err(Interruption::Cancelled),
                    chunk = tokio::time::timeout_at(deadline, chunks.next()) => {
                        chunk.map_err(|_| Interruption::TimedOut)
                    }
                };

                match next {
                    Ok(Some(Ok(chunk))) => {
                        total += chunk.len() as u64;
                        let overflow = buffer
                            .as_ref()
                            .is_some_and(|buf| buf.len() + chunk.len() > limit);
                        if overflow {
                            buffer = None;
                        } else if let Some(buf) = buffer.as_mut() {
                            buf.extend_from_slice(&chunk);
                        }
                        yield Ok(chunk);
                    }
                    Ok(Some(Err(e))) => {
                        metrics.download_finished(false);
                        warn!(request_id = %request_id, url = %url, error = %e, "Icon body stream failed");
                        yield Err(io::Error::other(e));
                        return;
                    }
                    Ok(None) => break,
                    Err(interruption) => {
                        metrics.download_finished(false);
                        warn!(request_id = %request_id, url = %url, reason = %interruption, "Icon body stream interrupted");
                        yield Err(io::Error::new(io::ErrorKind::TimedOut, interruption.to_string()));
                        return;
                    }
                }
            }

            metrics.downloaded_bytes(total);
            metrics.download_finished(true);

            let cached = match buffer {
                Some(buf) if cacheable => cache.put(target.clone(), buf.freeze(), content_type).await,
                _ => false,
            };

            info!(
                request_id = %request_id,
                target = %target,
                url = %url,
                bytes = total,
                cached,
                "Icon downloaded"
            );
        }
    }

    fn download_failed(&self, ctx: &ResolveContext, url: &Url, source: DownloadError) -> AppError {
        self.metrics.download_finished(false);
        warn!(
            request_id = ctx.request_id(),
            url = %url,
            error = %source,
            "Failed to download icon"
        );
        AppError::download(url.as_str(), source)
    }
}

/// Upstream error status with a generic body in place of the upstream payload.
/// Carries the same `Cache-Control` as a successful icon response.
pub fn download_failure_response(status: StatusCode, cache_control: HeaderValue) -> Response {
    let mut response = plain_text(status, DOWNLOAD_FAILED_BODY);
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, cache_control);
    response
}

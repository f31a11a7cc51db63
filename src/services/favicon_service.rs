//! Request-level favicon flow: cache lookup, resolution, proxying.

use axum::response::Response;
use reqwest::Client;
use std::sync::Arc;
use tracing::{debug, info};

use super::content_proxy::{ContentProxy, IconSource};
use super::icon_cache::IconCache;
use super::resolver::{IconResolver, Resolution};
use crate::config::Config;
use crate::errors::{AppError, AppResult};
use crate::models::{ResolveContext, Target};
use crate::observability::ResolverMetrics;
use crate::utils::UpstreamScheme;

pub struct FaviconService {
    resolver: IconResolver,
    cache: Arc<IconCache>,
    proxy: ContentProxy,
    metrics: Arc<dyn ResolverMetrics>,
}

impl FaviconService {
    pub fn new(
        resolver: IconResolver,
        cache: Arc<IconCache>,
        proxy: ContentProxy,
        metrics: Arc<dyn ResolverMetrics>,
    ) -> Self {
        Self {
            resolver,
            cache,
            proxy,
            metrics,
        }
    }

    /// Wire the standard loader chain, cache and proxy around one HTTP client.
    pub fn from_config(
        config: &Config,
        client: Client,
        scheme: UpstreamScheme,
        metrics: Arc<dyn ResolverMetrics>,
    ) -> AppResult<Self> {
        let cache = Arc::new(IconCache::new(&config.cache));
        let resolver =
            IconResolver::from_config(client.clone(), &config.resolver, scheme, metrics.clone());
        let proxy = ContentProxy::new(client, cache.clone(), metrics.clone(), &config.proxy)?;
        Ok(Self::new(resolver, cache, proxy, metrics))
    }

    pub fn cache(&self) -> &Arc<IconCache> {
        &self.cache
    }

    pub fn loader_names(&self) -> Vec<&'static str> {
        self.resolver.loader_names()
    }

    /// Normalize the raw `site` parameter, counting the outcome
    pub fn parse_target(&self, raw: Option<&str>) -> AppResult<Target> {
        let result = Target::normalize(raw.unwrap_or_default());
        self.metrics.target_parsed(result.is_ok());
        result.map_err(AppError::from)
    }

    pub async fn serve(&self, ctx: &ResolveContext, target: &Target) -> AppResult<Response> {
        if let Some(entry) = self.cache.get(target).await {
            self.metrics.cache_lookup(true);
            debug!(
                request_id = ctx.request_id(),
                target = %target,
                bytes = entry.payload.len(),
                "Serving icon from cache"
            );
            return self.proxy.stream(ctx, target, IconSource::Cached(entry)).await;
        }
        self.metrics.cache_lookup(false);

        match self.resolver.resolve(ctx, target).await {
            Resolution::Resolved { url, loader } => {
                info!(
                    request_id = ctx.request_id(),
                    target = %target,
                    loader,
                    url = %url,
                    "Resolved icon"
                );
                self.proxy.stream(ctx, target, IconSource::Remote(url)).await
            }
            Resolution::Unresolved => {
                info!(request_id = ctx.request_id(), target = %target, "No icon found");
                Err(AppError::Unresolved)
            }
        }
    }
}

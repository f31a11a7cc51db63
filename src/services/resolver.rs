//! Resolution orchestrator
//!
//! Runs the loader chain in order and stops at the first loader that
//! produces a URL. Loader errors never leave this module.

use reqwest::Client;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;
use url::Url;

use crate::config::ResolverConfig;
use crate::errors::LoaderError;
use crate::loaders::{DirectProbeLoader, IconLoader, MarkupScrapeLoader};
use crate::models::{ResolveContext, Target};
use crate::observability::{LoaderOutcome, ResolverMetrics};
use crate::utils::UpstreamScheme;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved { url: Url, loader: &'static str },
    Unresolved,
}

pub struct IconResolver {
    loaders: Vec<Arc<dyn IconLoader>>,
    metrics: Arc<dyn ResolverMetrics>,
}

impl IconResolver {
    pub fn new(loaders: Vec<Arc<dyn IconLoader>>, metrics: Arc<dyn ResolverMetrics>) -> Self {
        Self { loaders, metrics }
    }

    /// Standard chain: cheap direct probes first, then the markup scrape.
    pub fn from_config(
        client: Client,
        config: &ResolverConfig,
        scheme: UpstreamScheme,
        metrics: Arc<dyn ResolverMetrics>,
    ) -> Self {
        let loaders: Vec<Arc<dyn IconLoader>> = vec![
            Arc::new(DirectProbeLoader::new(client.clone(), config).with_scheme(scheme)),
            Arc::new(MarkupScrapeLoader::new(client, config).with_scheme(scheme)),
        ];
        Self::new(loaders, metrics)
    }

    pub fn loader_names(&self) -> Vec<&'static str> {
        self.loaders.iter().map(|l| l.name()).collect()
    }

    pub async fn resolve(&self, ctx: &ResolveContext, target: &Target) -> Resolution {
        for loader in &self.loaders {
            let name = loader.name();
            if ctx.is_cancelled() {
                debug!(request_id = ctx.request_id(), target = %target, "Resolution cancelled");
                break;
            }

            let started = Instant::now();
            match loader.resolve(ctx, target).await {
                Ok(url) => {
                    self.metrics.loader_finished(name, LoaderOutcome::Success);
                    debug!(
                        request_id = ctx.request_id(),
                        target = %target,
                        loader = name,
                        url = %url,
                        duration_ms = started.elapsed().as_millis() as u64,
                        "Loader resolved icon"
                    );
                    return Resolution::Resolved { url, loader: name };
                }
                Err(LoaderError::Cancelled) => {
                    debug!(request_id = ctx.request_id(), target = %target, loader = name, "Resolution cancelled");
                    break;
                }
                Err(LoaderError::NotFound) => {
                    self.metrics.loader_finished(name, LoaderOutcome::Empty);
                    debug!(
                        request_id = ctx.request_id(),
                        target = %target,
                        loader = name,
                        duration_ms = started.elapsed().as_millis() as u64,
                        "Loader found nothing"
                    );
                }
                Err(e) => {
                    self.metrics.loader_finished(name, LoaderOutcome::Error);
                    debug!(
                        request_id = ctx.request_id(),
                        target = %target,
                        loader = name,
                        kind = e.kind(),
                        error = %e,
                        duration_ms = started.elapsed().as_millis() as u64,
                        "Loader failed"
                    );
                }
            }
        }

        Resolution::Unresolved
    }
}

use async_trait::async_trait;
use url::Url;

use crate::errors::LoaderError;
use crate::models::{ResolveContext, Target};

/// A strategy that tries to turn a target into an absolute icon URL.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IconLoader: Send + Sync {
    /// Short name used in logs and metric attributes
    fn name(&self) -> &'static str;

    async fn resolve(&self, ctx: &ResolveContext, target: &Target) -> Result<Url, LoaderError>;
}

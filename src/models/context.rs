//! Request-scoped resolution context

use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::errors::Interruption;

/// Carried explicitly through the resolver, every loader and the content
/// proxy. Cancelling the token aborts all outbound work for the request.
#[derive(Debug, Clone)]
pub struct ResolveContext {
    request_id: String,
    cancel: CancellationToken,
}

impl ResolveContext {
    pub fn new<S: Into<String>>(request_id: S, cancel: CancellationToken) -> Self {
        Self {
            request_id: request_id.into(),
            cancel,
        }
    }

    /// Context with a fresh id and its own token, for callers outside a request
    pub fn detached() -> Self {
        Self::new(Uuid::new_v4().to_string(), CancellationToken::new())
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Run `fut` until it completes, `deadline` elapses or the context is cancelled.
    pub async fn within<F>(&self, deadline: Duration, fut: F) -> Result<F::Output, Interruption>
    where
        F: Future,
    {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Interruption::Cancelled),
            res = tokio::time::timeout(deadline, fut) => res.map_err(|_| Interruption::TimedOut),
        }
    }
}

impl Default for ResolveContext {
    fn default() -> Self {
        Self::detached()
    }
}

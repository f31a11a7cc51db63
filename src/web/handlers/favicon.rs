//! Favicon endpoint

use axum::{
    extract::{Query, State},
    response::Response,
};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::errors::AppError;
use crate::models::ResolveContext;
use crate::web::{
    AppState,
    extractors::{RequestContext, SiteQuery},
    responses::handle_error,
};

/// `GET /?site=<site>`
///
/// Outbound work is tied to a cancellation token that fires if the client
/// goes away (the handler future is dropped) or the request deadline passes.
pub async fn get_favicon(
    State(state): State<AppState>,
    context: RequestContext,
    Query(query): Query<SiteQuery>,
) -> Response {
    let target = match state.favicons.parse_target(query.site.as_deref()) {
        Ok(target) => target,
        Err(e) => {
            debug!(
                request_id = %context.request_id,
                site = query.site.as_deref().unwrap_or_default(),
                error = %e,
                "Rejected site parameter"
            );
            return handle_error(e);
        }
    };

    debug!(
        request_id = %context.request_id,
        target = %target,
        user_agent = context.user_agent.as_deref().unwrap_or("-"),
        real_ip = context.real_ip.as_deref().unwrap_or("-"),
        "Favicon requested"
    );

    let token = CancellationToken::new();
    let guard = token.clone().drop_guard();
    let ctx = ResolveContext::new(context.request_id.clone(), token.clone());

    let result = match tokio::time::timeout(
        state.config.web.request_timeout,
        state.favicons.serve(&ctx, &target),
    )
    .await
    {
        Ok(result) => result,
        Err(_) => {
            token.cancel();
            Err(AppError::TimedOut)
        }
    };

    // The response body may still be streaming from upstream
    let _ = guard.disarm();

    result.unwrap_or_else(handle_error)
}

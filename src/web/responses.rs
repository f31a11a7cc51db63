//! HTTP response helpers and error mapping
//!
//! Error bodies are short plain-text messages so browsers loading the
//! endpoint as an `<img>` source never receive upstream payloads.

use axum::{
    body::Body,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::error;

use crate::errors::AppError;
use crate::services::content_proxy::DOWNLOAD_FAILED_BODY;

pub const NOT_FOUND_BODY: &str = "404 page not found";

/// Plain-text response that must not be cached
pub fn plain_text<B: Into<Body>>(status: StatusCode, body: B) -> Response {
    let mut response = Response::new(body.into());
    *response.status_mut() = status;
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

/// Map an application error onto the HTTP boundary
pub fn handle_error(error: AppError) -> Response {
    match &error {
        AppError::InvalidTarget(_) => plain_text(StatusCode::BAD_REQUEST, error.to_string()),
        AppError::Unresolved => plain_text(StatusCode::NOT_FOUND, NOT_FOUND_BODY),
        AppError::Download { .. } => plain_text(StatusCode::BAD_GATEWAY, DOWNLOAD_FAILED_BODY),
        AppError::TimedOut => plain_text(StatusCode::GATEWAY_TIMEOUT, "request timed out"),
        AppError::Configuration { .. } => {
            error!(error = %error, "Request failed with internal error");
            plain_text(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        handle_error(self)
    }
}

/// Body of `GET /health`
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub uptime_seconds: i64,
    pub cache_entries: usize,
    pub cache_capacity: usize,
    pub loaders: Vec<&'static str>,
}

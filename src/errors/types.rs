//! Error type definitions for the favicon proxy
//!
//! Errors are layered: `TargetError` comes out of site normalization,
//! `LoaderError` stays inside the resolution chain, and `AppError` is the only
//! type that reaches the HTTP boundary.

use thiserror::Error;

/// Top-level application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// The `site` parameter was missing or could not be normalized
    #[error("invalid site: {0}")]
    InvalidTarget(#[from] TargetError),

    /// Every loader in the chain came back empty
    #[error("no icon could be resolved")]
    Unresolved,

    /// Transport failure while fetching the resolved icon
    #[error("failed to download icon from {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: DownloadError,
    },

    /// The inbound request exceeded its deadline
    #[error("request timed out")]
    TimedOut,

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl AppError {
    /// Create a download error for the given icon URL
    pub fn download<S: Into<String>>(url: S, source: DownloadError) -> Self {
        Self::Download {
            url: url.into(),
            source,
        }
    }

    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

/// Reasons a raw `site` string cannot become a `Target`
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TargetError {
    #[error("site parameter is required")]
    Empty,

    #[error("site contains control characters")]
    ControlCharacter,

    #[error("malformed site: {0}")]
    Malformed(#[from] url::ParseError),

    #[error("unsupported scheme '{0}'")]
    UnsupportedScheme(String),

    #[error("site has no host")]
    MissingHost,
}

/// Failure of a single loader attempt
///
/// None of these escape the resolver; they only decide whether the next
/// loader in the chain gets a turn.
#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("no usable icon found")]
    NotFound,

    #[error("upstream responded with status {status}")]
    RequestFailed { status: u16 },

    #[error("invalid upstream response: {message}")]
    InvalidResponse { message: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("loader deadline exceeded")]
    TimedOut,

    #[error("resolution cancelled")]
    Cancelled,
}

impl LoaderError {
    pub fn invalid_response<S: Into<String>>(message: S) -> Self {
        Self::InvalidResponse {
            message: message.into(),
        }
    }

    /// Stable label used for logging and metric attributes
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::RequestFailed { .. } => "request_failed",
            Self::InvalidResponse { .. } => "invalid_response",
            Self::Transport(_) => "transport",
            Self::TimedOut => "timed_out",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Transport-level failure of the final icon fetch
#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("{0}")]
    Transport(#[from] reqwest::Error),

    #[error("download deadline exceeded")]
    TimedOut,

    #[error("download cancelled")]
    Cancelled,
}

/// Why an operation bound to a `ResolveContext` stopped early
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interruption {
    #[error("deadline exceeded")]
    TimedOut,

    #[error("cancelled")]
    Cancelled,
}

impl From<Interruption> for LoaderError {
    fn from(value: Interruption) -> Self {
        match value {
            Interruption::TimedOut => Self::TimedOut,
            Interruption::Cancelled => Self::Cancelled,
        }
    }
}

impl From<Interruption> for DownloadError {
    fn from(value: Interruption) -> Self {
        match value {
            Interruption::TimedOut => Self::TimedOut,
            Interruption::Cancelled => Self::Cancelled,
        }
    }
}

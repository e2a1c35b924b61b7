use std::time::Duration;
use thiserror::Error;

/// Why a request URL was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum InvalidUriKind {
    ParseError,
    /// No host
    MissingAuthority,
    /// No `http`/`https` scheme
    MissingScheme,
}

/// Everything that can go wrong between building a request and reading its body.
///
/// A non-success status is never an error here; it arrives as an ordinary
/// [`crate::HttpResponse`].
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum HttpError {
    #[error("cannot build request: {0}")]
    RequestBuild(#[from] http::Error),

    #[error("bad header name: {0}")]
    InvalidHeaderName(#[from] http::header::InvalidHeaderName),

    #[error("bad header value: {0}")]
    InvalidHeaderValue(#[from] http::header::InvalidHeaderValue),

    /// One attempt ran longer than the per-request timeout
    #[error("no response within {0:?}")]
    Timeout(Duration),

    /// Connect, DNS, reset and similar failures below HTTP
    #[error("connection failed: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("TLS setup failed: {0}")]
    Tls(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("response body exceeds {limit} bytes (read {actual})")]
    BodyTooLarge { limit: usize, actual: usize },

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The buffer worker is gone; the client cannot send anything anymore
    #[error("HTTP client worker stopped")]
    ServiceClosed,

    /// `reason` is for humans; match on `kind`
    #[error("bad URL '{url}': {reason}")]
    InvalidUri {
        url: String,
        kind: InvalidUriKind,
        reason: String,
    },

    /// Scheme not permitted by [`crate::TransportSecurity`]
    #[error("scheme '{scheme}' refused: {reason}")]
    InvalidScheme { scheme: String, reason: String },
}

impl From<hyper::Error> for HttpError {
    fn from(err: hyper::Error) -> Self {
        Self::Transport(Box::new(err))
    }
}

impl From<hyper_util::client::legacy::Error> for HttpError {
    fn from(err: hyper_util::client::legacy::Error) -> Self {
        Self::Transport(Box::new(err))
    }
}

//! Error types for the proxy.

use std::error::Error as StdError;

use thiserror::Error;

use mirage_core::TargetError;

/// Upstream fetch failure. Carries a human-readable message; never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The upstream did not answer within the configured deadline.
    #[error("upstream timed out: {0}")]
    Timeout(String),

    /// Connecting to the upstream failed (DNS, refused, TLS).
    #[error("could not connect to upstream: {0}")]
    Connect(String),

    /// The redirect chain was too long or invalid.
    #[error("redirect failed: {0}")]
    Redirect(String),

    /// The response started but its body could not be read.
    #[error("failed to read upstream body: {0}")]
    Body(String),

    /// Any other request failure.
    #[error("upstream request failed: {0}")]
    Request(String),
}

impl FetchError {
    /// Returns the message without the category prefix.
    pub fn message(&self) -> &str {
        match self {
            FetchError::Timeout(msg)
            | FetchError::Connect(msg)
            | FetchError::Redirect(msg)
            | FetchError::Body(msg)
            | FetchError::Request(msg) => msg,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        let message = error_chain(&err);
        if err.is_timeout() {
            FetchError::Timeout(message)
        } else if err.is_connect() {
            FetchError::Connect(message)
        } else if err.is_redirect() {
            FetchError::Redirect(message)
        } else if err.is_body() || err.is_decode() {
            FetchError::Body(message)
        } else {
            FetchError::Request(message)
        }
    }
}

/// Joins an error and its sources into one line.
fn error_chain(err: &dyn StdError) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}

/// Proxy error type.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// The caller's target is not a fetchable absolute URL.
    #[error("invalid target {raw:?}: {source}")]
    InvalidTarget {
        /// The target exactly as supplied.
        raw: String,
        /// Why it was rejected.
        source: TargetError,
    },

    /// The upstream fetch failed.
    #[error(transparent)]
    Upstream(#[from] FetchError),
}

/// Result type for proxy operations.
pub type Result<T> = std::result::Result<T, ProxyError>;

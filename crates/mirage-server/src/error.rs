//! Server error types.

use std::net::SocketAddr;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

/// Errors starting or running the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind to address.
    #[error("failed to bind to {0}: {1}")]
    BindError(SocketAddr, std::io::Error),

    /// The upstream HTTP client could not be built.
    #[error("HTTP client error: {0}")]
    Client(#[from] mirage_proxy::FetchError),

    /// Server runtime error.
    #[error("server error: {0}")]
    Runtime(String),
}

/// Per-request errors raised before the proxy takes over.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The proxy origin could not be derived from the request.
    #[error("missing Host header")]
    MissingHost,

    /// Bad request.
    #[error("bad request: {0}")]
    BadRequest(String),
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = match &self {
            ApiError::MissingHost => "missing_host",
            ApiError::BadRequest(_) => "bad_request",
        };

        let body = ErrorResponse {
            error: self.to_string(),
            code: code.to_string(),
        };

        (StatusCode::BAD_REQUEST, axum::Json(body)).into_response()
    }
}

/// Result type for request handlers.
pub type Result<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_errors_are_bad_requests() {
        assert_eq!(
            ApiError::MissingHost.into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::BadRequest("x".into()).into_response().status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn bind_error_display() {
        let addr: SocketAddr = "127.0.0.1:1".parse().unwrap();
        let err = ServerError::BindError(
            addr,
            std::io::Error::new(std::io::ErrorKind::AddrInUse, "in use"),
        );
        assert_eq!(err.to_string(), "failed to bind to 127.0.0.1:1: in use");
    }

    #[test]
    fn client_build_failure_is_server_error() {
        let err = ServerError::from(mirage_proxy::FetchError::Request("no TLS backend".into()));
        assert!(matches!(err, ServerError::Client(_)));
        assert_eq!(
            err.to_string(),
            "HTTP client error: upstream request failed: no TLS backend"
        );
    }
}

//! Error types for target parsing.

use thiserror::Error;

/// Reasons a caller-supplied target cannot be proxied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TargetError {
    /// The target did not parse as an absolute URL.
    #[error("invalid URL: {0}")]
    Parse(#[from] url::ParseError),

    /// The target parsed but uses a scheme the proxy does not fetch.
    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    /// The target has no host component.
    #[error("missing host")]
    MissingHost,
}

/// Result type for target operations.
pub type Result<T> = std::result::Result<T, TargetError>;

//! Response models.

use serde::{Deserialize, Serialize};

/// Response body for GET /healthz.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always `"ok"` while the server is answering.
    pub status: String,
    /// Crate version.
    pub version: String,
}

impl HealthResponse {
    /// Health of the running server.
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

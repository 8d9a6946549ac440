//! Application state for the entry point.

use std::sync::Arc;

use mirage_proxy::ProxyHandler;

/// Shared application state.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Proxied request handler.
    pub handler: ProxyHandler,
    /// Fixed public origin; when unset it is derived per request.
    pub public_origin: Option<Arc<str>>,
}

impl AppState {
    /// Creates state that derives the proxy origin from each request.
    pub fn new(handler: ProxyHandler) -> Self {
        Self {
            handler,
            public_origin: None,
        }
    }

    /// Pins the proxy origin, e.g. when running behind a reverse proxy.
    pub fn with_public_origin(mut self, origin: impl AsRef<str>) -> Self {
        self.public_origin = Some(Arc::from(origin.as_ref().trim_end_matches('/')));
        self
    }

    /// Returns the configured public origin.
    pub fn public_origin(&self) -> Option<&str> {
        self.public_origin.as_deref()
    }
}

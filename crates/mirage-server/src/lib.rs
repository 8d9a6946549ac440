//! Mirage Server - HTTP entry point.
//!
//! Receives browser requests, hands proxied ones to [`mirage_proxy`] and
//! writes the result back.
//!
//! ## Endpoints
//!
//! - `ANY /?url=<target>` - Fetch and rewrite `<target>`
//! - `GET /` - Landing page with an address bar
//! - `GET /healthz` - Liveness probe
//!
//! ## Example
//!
//! ```no_run
//! use mirage_server::{Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let server = Server::new(ServerConfig::default()).unwrap();
//!     server.run().await.unwrap();
//! }
//! ```

pub mod error;
mod handlers;
pub mod models;
pub mod state;

use std::net::SocketAddr;

use axum::extract::DefaultBodyLimit;
use axum::routing::{any, get};
use axum::Router;
use socket2::{Domain, Protocol, Socket, Type};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use mirage_proxy::{FetchConfig, Fetcher, ProxyHandler};

pub use error::{ApiError, Result, ServerError};
pub use handlers::{proxy_origin, LANDING_PAGE_HTML};
pub use state::AppState;

/// Default server port.
pub const DEFAULT_PORT: u16 = 8080;

/// Default server host (localhost only).
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default limit for inbound request bodies forwarded upstream.
pub const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host to bind to (default: 127.0.0.1).
    pub host: String,
    /// Port to bind to (default: 8080).
    pub port: u16,
    /// Origin written into rewritten URLs. Derived per request when unset.
    pub public_origin: Option<String>,
    /// Largest inbound body accepted (default: 10 MiB).
    pub max_body_bytes: usize,
    /// Upstream fetch settings.
    pub fetch: FetchConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            public_origin: None,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            fetch: FetchConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Sets the host.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Sets the port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Pins the public origin.
    pub fn with_public_origin(mut self, origin: impl Into<String>) -> Self {
        self.public_origin = Some(origin.into());
        self
    }

    /// Sets the inbound body limit.
    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }

    /// Sets the upstream fetch settings.
    pub fn with_fetch(mut self, fetch: FetchConfig) -> Self {
        self.fetch = fetch;
        self
    }
}

/// Builds the router for the given state.
pub fn router(state: AppState, max_body_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", any(handlers::root))
        .route("/healthz", get(handlers::health))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(cors)
        .with_state(state)
}

/// The Mirage HTTP server.
pub struct Server {
    router: Router,
    addr: SocketAddr,
}

impl Server {
    /// Creates a new server with the given configuration.
    pub fn new(config: ServerConfig) -> std::result::Result<Self, ServerError> {
        let handler = ProxyHandler::new(Fetcher::new(config.fetch.clone())?);
        let mut state = AppState::new(handler);
        if let Some(ref origin) = config.public_origin {
            state = state.with_public_origin(origin);
        }
        Self::with_state(config, state)
    }

    /// Creates a server with custom application state.
    pub fn with_state(
        config: ServerConfig,
        state: AppState,
    ) -> std::result::Result<Self, ServerError> {
        let router = router(state, config.max_body_bytes);

        let addr = format!("{}:{}", config.host, config.port)
            .parse()
            .map_err(|e| ServerError::Runtime(format!("invalid address: {}", e)))?;

        Ok(Self { router, addr })
    }

    /// Returns the server address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Runs the server until Ctrl-C.
    pub async fn run(self) -> std::result::Result<(), ServerError> {
        info!("Starting Mirage on http://{}", self.addr);

        let listener = bind(self.addr)?;

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| ServerError::Runtime(e.to_string()))?;

        info!("Mirage stopped");
        Ok(())
    }

    /// Returns the router for testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }
}

/// Binds with SO_REUSEADDR so a restart does not trip over lingering sockets.
fn bind(addr: SocketAddr) -> std::result::Result<tokio::net::TcpListener, ServerError> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))
        .map_err(|e| ServerError::BindError(addr, e))?;
    socket
        .set_reuse_address(true)
        .map_err(|e| ServerError::BindError(addr, e))?;
    socket
        .bind(&addr.into())
        .map_err(|e| ServerError::BindError(addr, e))?;
    socket
        .listen(1024)
        .map_err(|e| ServerError::BindError(addr, e))?;
    socket
        .set_nonblocking(true)
        .map_err(|e| ServerError::BindError(addr, e))?;

    let std_listener: std::net::TcpListener = socket.into();
    tokio::net::TcpListener::from_std(std_listener).map_err(|e| ServerError::BindError(addr, e))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

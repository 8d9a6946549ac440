//! Mirage Proxy - upstream fetching and proxied response assembly.
//!
//! Sits between the HTTP entry point and the rewriting engine in
//! `mirage-core`. Each call fetches the target once, classifies the payload,
//! rewrites it and returns a response with normalized headers.
//!
//! ## Flow
//!
//! ```text
//! ProxyRequest ──► parse_target ──(invalid)──► 400 Invalid URL
//!                       │
//!                       ▼
//!                 Fetcher::fetch ──(error)──► 502 Failed to fetch
//!                       │
//!                       ▼
//!          classify(content-type, final path)
//!                       │
//!           ┌───────────┴────────────┐
//!           ▼                        ▼
//!   HTML / CSS / JS              Other
//!   decoded + rewritten          streamed as-is
//!           └───────────┬────────────┘
//!                       ▼
//!          header normalization ──► ProxyResponse
//! ```

mod error;
mod fetcher;
mod handler;
pub mod headers;

pub use error::{FetchError, ProxyError, Result};
pub use fetcher::{
    charset_of, decode_text, FetchConfig, FetchRequest, Fetcher, UpstreamResponse,
    BROWSER_USER_AGENT, DEFAULT_MAX_REDIRECTS, DEFAULT_TIMEOUT,
};
pub use handler::{ProxyBody, ProxyHandler, ProxyRequest, ProxyResponse};

//! Upstream fetching.
//!
//! Issues exactly one request per proxied call with a browser-like header
//! set. Redirects are followed by the client, and the final URL is reported
//! so relative references are resolved against where the document actually
//! came from.

use std::time::Duration;

use bytes::Bytes;
use encoding_rs::{Encoding, UTF_8};
use futures::stream::{BoxStream, StreamExt};
use http::header::{ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, ORIGIN, REFERER};
use http::{HeaderMap, HeaderValue, Method, StatusCode};
use mime::Mime;
use url::Url;

use mirage_core::origin_of;

use crate::error::FetchError;

/// Default upstream deadline.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// Default redirect limit.
pub const DEFAULT_MAX_REDIRECTS: usize = 10;

/// User agent presented to upstreams.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

const BROWSER_ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8";
const BROWSER_ACCEPT_LANGUAGE: &str = "en-US,en;q=0.5";

/// Fetcher configuration.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Deadline for the whole upstream exchange, body included.
    pub timeout: Duration,
    /// Maximum redirects followed before giving up.
    pub max_redirects: usize,
    /// `User-Agent` sent upstream.
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            user_agent: BROWSER_USER_AGENT.to_string(),
        }
    }
}

impl FetchConfig {
    /// Sets the upstream deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the redirect limit.
    pub fn with_max_redirects(mut self, max_redirects: usize) -> Self {
        self.max_redirects = max_redirects;
        self
    }

    /// Sets the user agent.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

/// A request to send upstream.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    /// Absolute target URL.
    pub target: Url,
    /// Method forwarded from the inbound request.
    pub method: Method,
    /// Body forwarded from the inbound request (may be empty).
    pub body: Bytes,
    /// `Content-Type` of the forwarded body.
    pub content_type: Option<HeaderValue>,
}

impl FetchRequest {
    /// Creates a bodiless GET.
    pub fn get(target: Url) -> Self {
        Self {
            target,
            method: Method::GET,
            body: Bytes::new(),
            content_type: None,
        }
    }

    /// Sets the method and body.
    pub fn with_body(
        mut self,
        method: Method,
        body: Bytes,
        content_type: Option<HeaderValue>,
    ) -> Self {
        self.method = method;
        self.body = body;
        self.content_type = content_type;
        self
    }
}

/// Response headers and status from the upstream, body not yet read.
#[derive(Debug)]
pub struct UpstreamResponse {
    response: reqwest::Response,
}

impl UpstreamResponse {
    /// Upstream status code.
    pub fn status(&self) -> StatusCode {
        self.response.status()
    }

    /// Upstream response headers.
    pub fn headers(&self) -> &HeaderMap {
        self.response.headers()
    }

    /// URL the response was finally served from, after redirects.
    pub fn final_url(&self) -> &Url {
        self.response.url()
    }

    /// Declared content type, or an empty string.
    pub fn content_type(&self) -> &str {
        self.headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
    }

    /// Reads the whole body as text, decoded with the charset the upstream
    /// declared. Falls back to UTF-8; a byte order mark overrides both.
    pub async fn text(self) -> Result<String, FetchError> {
        let encoding = charset_of(self.content_type());
        let bytes = self.response.bytes().await?;
        Ok(decode_text(&bytes, encoding))
    }

    /// Streams the body. Dropping the stream aborts the upstream transfer.
    pub fn into_stream(self) -> BoxStream<'static, Result<Bytes, FetchError>> {
        self.response
            .bytes_stream()
            .map(|chunk| chunk.map_err(FetchError::from))
            .boxed()
    }
}

/// Upstream HTTP fetcher.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: reqwest::Client,
    config: FetchConfig,
}

impl Fetcher {
    /// Creates a fetcher with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self { client, config })
    }

    /// Creates a fetcher with default configuration.
    pub fn with_defaults() -> Result<Self, FetchError> {
        Self::new(FetchConfig::default())
    }

    /// Returns the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Sends the request once. Headers are available on return; the body is
    /// read through the returned [`UpstreamResponse`].
    pub async fn fetch(
        &self,
        request: FetchRequest,
    ) -> Result<UpstreamResponse, FetchError> {
        let origin = origin_of(&request.target);
        let mut builder = self
            .client
            .request(request.method.clone(), request.target.clone())
            .header(ACCEPT, BROWSER_ACCEPT)
            .header(ACCEPT_LANGUAGE, BROWSER_ACCEPT_LANGUAGE)
            .header(REFERER, format!("{origin}/"))
            .header(ORIGIN, origin);

        if !request.body.is_empty() {
            if let Some(content_type) = request.content_type {
                builder = builder.header(CONTENT_TYPE, content_type);
            }
            builder = builder.body(request.body);
        }

        tracing::debug!("Fetching {} {}", request.method, request.target);

        let response = builder.send().await?;

        if response.url() != &request.target {
            tracing::debug!("{} redirected to {}", request.target, response.url());
        }

        Ok(UpstreamResponse { response })
    }
}

/// Encoding named by the `charset` parameter of a content type, or UTF-8.
pub fn charset_of(content_type: &str) -> &'static Encoding {
    content_type
        .parse::<Mime>()
        .ok()
        .and_then(|mime| {
            mime.get_param(mime::CHARSET)
                .and_then(|charset| Encoding::for_label(charset.as_str().as_bytes()))
        })
        .unwrap_or(UTF_8)
}

/// Decodes a body, replacing malformed sequences with U+FFFD.
pub fn decode_text(body: &[u8], encoding: &'static Encoding) -> String {
    let (text, actual, had_errors) = encoding.decode(body);
    if had_errors {
        tracing::debug!("Malformed {} sequences replaced while decoding", actual.name());
    }
    text.into_owned()
}

//! Proxied request handling.
//!
//! Validates the target, fetches it once, picks a rewrite pipeline and
//! assembles the response the entry point writes back to the client.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use futures::stream::{BoxStream, StreamExt};
use http::header::CONTENT_TYPE;
use html_escape::encode_text;
use http::{HeaderMap, HeaderValue, Method, StatusCode};

use mirage_core::{classify, parse_target, transform, RewriteContext};

use crate::error::{FetchError, ProxyError, Result};
use crate::fetcher::{FetchRequest, Fetcher};
use crate::headers::{apply_proxy_headers, forwarded_headers, rewrite_location};

/// Page shown when the upstream could not be fetched.
const FAILURE_PAGE_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
    <title>Failed to fetch</title>
    <style>
        body {
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            display: flex;
            justify-content: center;
            align-items: center;
            min-height: 100vh;
            margin: 0;
            background: #111827;
            color: #f9fafb;
        }
        .container {
            text-align: center;
            padding: 2rem;
            max-width: 560px;
        }
        .reason {
            background: rgba(255,255,255,0.1);
            padding: 1rem;
            border-radius: 8px;
            word-break: break-word;
        }
        a { color: #93c5fd; }
    </style>
</head>
<body>
    <div class="container">
        <h1>Failed to fetch</h1>
        <p class="reason">{{MESSAGE}}</p>
        <p><a href="/">Back to Mirage</a></p>
    </div>
</body>
</html>"#;

/// A request the entry point wants proxied.
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    /// Origin the client reached the proxy on.
    pub proxy_origin: String,
    /// Target exactly as the client supplied it.
    pub raw_target: String,
    /// Inbound method, forwarded upstream.
    pub method: Method,
    /// Inbound body, forwarded upstream.
    pub body: Bytes,
    /// Inbound `Content-Type`.
    pub content_type: Option<HeaderValue>,
}

impl ProxyRequest {
    /// Creates a bodiless GET for `raw_target`.
    pub fn get(proxy_origin: impl Into<String>, raw_target: impl Into<String>) -> Self {
        Self {
            proxy_origin: proxy_origin.into(),
            raw_target: raw_target.into(),
            method: Method::GET,
            body: Bytes::new(),
            content_type: None,
        }
    }

    /// Sets the method and body to forward.
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

/// Response body: rewritten text in full, or the upstream bytes as they arrive.
pub enum ProxyBody {
    /// Complete body.
    Full(Bytes),
    /// Upstream body stream. Dropping it aborts the upstream transfer.
    Stream(BoxStream<'static, std::result::Result<Bytes, FetchError>>),
}

impl ProxyBody {
    /// Reads the whole body.
    pub async fn collect(self) -> std::result::Result<Bytes, FetchError> {
        match self {
            ProxyBody::Full(bytes) => Ok(bytes),
            ProxyBody::Stream(mut stream) => {
                let mut body = Vec::new();
                while let Some(chunk) = stream.next().await {
                    body.extend_from_slice(&chunk?);
                }
                Ok(Bytes::from(body))
            }
        }
    }
}

impl fmt::Debug for ProxyBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProxyBody::Full(bytes) => f.debug_tuple("Full").field(&bytes.len()).finish(),
            ProxyBody::Stream(_) => f.write_str("Stream"),
        }
    }
}

/// Response assembled for the client.
#[derive(Debug)]
pub struct ProxyResponse {
    /// Status code, mirrored from the upstream on success.
    pub status: StatusCode,
    /// Normalized headers.
    pub headers: HeaderMap,
    /// Body.
    pub body: ProxyBody,
}

impl ProxyResponse {
    fn full(status: StatusCode, content_type: &'static str, body: String) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        Self {
            status,
            headers,
            body: ProxyBody::Full(Bytes::from(body)),
        }
    }

    /// 400 response for a target that is not a fetchable URL.
    pub fn invalid_target(raw: &str) -> Self {
        Self::full(
            StatusCode::BAD_REQUEST,
            "text/plain; charset=utf-8",
            format!("Invalid URL: {raw}"),
        )
    }

    /// 502 response naming why the upstream could not be fetched.
    pub fn upstream_failure(message: &str) -> Self {
        Self::full(
            StatusCode::BAD_GATEWAY,
            "text/html;charset=utf-8",
            FAILURE_PAGE_HTML.replace("{{MESSAGE}}", &encode_text(message)),
        )
    }
}

/// Handles proxied requests.
#[derive(Debug, Clone)]
pub struct ProxyHandler {
    fetcher: Arc<Fetcher>,
}

impl ProxyHandler {
    /// Creates a handler around the given fetcher.
    pub fn new(fetcher: Fetcher) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
        }
    }

    /// Creates a handler with a default fetcher.
    pub fn with_defaults() -> Result<Self> {
        Ok(Self::new(Fetcher::with_defaults()?))
    }

    /// Returns the fetcher.
    pub fn fetcher(&self) -> &Fetcher {
        &self.fetcher
    }

    /// Proxies one request. Failures become 400 or 502 responses.
    pub async fn handle(&self, request: ProxyRequest) -> ProxyResponse {
        match self.try_handle(request).await {
            Ok(response) => response,
            Err(ProxyError::InvalidTarget { raw, source }) => {
                tracing::debug!("Rejected target {:?}: {}", raw, source);
                ProxyResponse::invalid_target(&raw)
            }
            Err(ProxyError::Upstream(e)) => {
                tracing::warn!("Upstream fetch failed: {}", e);
                ProxyResponse::upstream_failure(&e.to_string())
            }
        }
    }

    /// Proxies one request, returning failures as errors.
    pub async fn try_handle(&self, request: ProxyRequest) -> Result<ProxyResponse> {
        let target =
            parse_target(&request.raw_target).map_err(|source| ProxyError::InvalidTarget {
                raw: request.raw_target.clone(),
                source,
            })?;

        let method = request.method.clone();
        let fetch = FetchRequest::get(target).with_body(
            request.method,
            request.body,
            request.content_type,
        );
        let upstream = self.fetcher.fetch(fetch).await?;

        let status = upstream.status();
        let ctx = RewriteContext::new(request.proxy_origin, upstream.final_url());
        let kind = classify(upstream.content_type(), upstream.final_url().path());

        let mut headers = forwarded_headers(upstream.headers());
        apply_proxy_headers(&mut headers, kind);
        rewrite_location(&mut headers, &ctx);

        tracing::info!(
            "{} {} -> {} ({})",
            method,
            upstream.final_url(),
            status.as_u16(),
            kind.as_str()
        );

        let body = if kind.is_rewritten() {
            let text = upstream.text().await?;
            let rewritten = transform(kind, &text, &ctx);
            ProxyBody::Full(Bytes::from(rewritten))
        } else {
            ProxyBody::Stream(upstream.into_stream())
        };

        Ok(ProxyResponse {
            status,
            headers,
            body,
        })
    }
}

//! Route handlers.

use axum::body::{Body, Bytes};
use axum::extract::{RawQuery, State};
use axum::http::header::{CONTENT_TYPE, HOST};
use axum::http::{HeaderMap, Method};
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use tracing::debug;

use mirage_core::extract_target;
use mirage_proxy::{ProxyBody, ProxyRequest, ProxyResponse};

use crate::error::{ApiError, Result};
use crate::models::HealthResponse;
use crate::state::AppState;

/// Address bar and frame shown when no target is given.
pub const LANDING_PAGE_HTML: &str = include_str!("../assets/landing.html");

const FORWARDED_PROTO: &str = "x-forwarded-proto";

/// ANY / - Proxy `url=` when present, otherwise serve the landing page.
pub async fn root(
    State(state): State<AppState>,
    method: Method,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response> {
    let Some(raw_target) = extract_target(query.as_deref()) else {
        debug!("No target, serving landing page");
        return Ok(Html(LANDING_PAGE_HTML).into_response());
    };

    let proxy_origin = proxy_origin(&headers, state.public_origin())?;
    let request = ProxyRequest::get(proxy_origin, raw_target).with_body(
        method,
        body,
        headers.get(CONTENT_TYPE).cloned(),
    );

    let response = state.handler.handle(request).await;
    Ok(into_http_response(response))
}

/// GET /healthz - Liveness probe.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}

/// Origin the client reached the proxy on.
///
/// A configured origin wins. Otherwise the scheme comes from
/// `X-Forwarded-Proto` (default `http`) and the authority from `Host`.
pub fn proxy_origin(headers: &HeaderMap, configured: Option<&str>) -> Result<String> {
    if let Some(origin) = configured {
        return Ok(origin.trim_end_matches('/').to_string());
    }

    let host = headers.get(HOST).ok_or(ApiError::MissingHost)?;
    let host = host
        .to_str()
        .map_err(|_| ApiError::BadRequest("Host header is not valid ASCII".to_string()))?
        .trim();
    if host.is_empty() {
        return Err(ApiError::MissingHost);
    }

    let scheme = headers
        .get(FORWARDED_PROTO)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_ascii_lowercase())
        .filter(|v| v == "http" || v == "https")
        .unwrap_or_else(|| "http".to_string());

    Ok(format!("{scheme}://{host}"))
}

/// Converts a proxy response into an axum response, streaming pass-through
/// bodies.
pub fn into_http_response(response: ProxyResponse) -> Response {
    let body = match response.body {
        ProxyBody::Full(bytes) => Body::from(bytes),
        ProxyBody::Stream(stream) => Body::from_stream(stream),
    };

    let mut http_response = Response::new(body);
    *http_response.status_mut() = response.status;
    *http_response.headers_mut() = response.headers;
    http_response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, StatusCode};

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (name, value) in pairs {
            headers.insert(*name, HeaderValue::from_static(value));
        }
        headers
    }

    #[test]
    fn origin_from_host() {
        let origin = proxy_origin(&headers(&[("host", "localhost:8080")]), None).unwrap();
        assert_eq!(origin, "http://localhost:8080");
    }

    #[test]
    fn origin_honors_forwarded_proto() {
        let origin = proxy_origin(
            &headers(&[("host", "mirage.example"), ("x-forwarded-proto", "HTTPS, http")]),
            None,
        )
        .unwrap();
        assert_eq!(origin, "https://mirage.example");
    }

    #[test]
    fn unknown_forwarded_proto_ignored() {
        let origin = proxy_origin(
            &headers(&[("host", "mirage.example"), ("x-forwarded-proto", "ws")]),
            None,
        )
        .unwrap();
        assert_eq!(origin, "http://mirage.example");
    }

    #[test]
    fn configured_origin_wins() {
        let origin = proxy_origin(
            &headers(&[("host", "10.0.0.5:8080")]),
            Some("https://mirage.example/"),
        )
        .unwrap();
        assert_eq!(origin, "https://mirage.example");
    }

    #[test]
    fn missing_host_rejected() {
        assert!(matches!(
            proxy_origin(&HeaderMap::new(), None),
            Err(ApiError::MissingHost)
        ));
        assert!(matches!(
            proxy_origin(&headers(&[("host", " ")]), None),
            Err(ApiError::MissingHost)
        ));
    }

    #[tokio::test]
    async fn full_body_converted() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/css"));
        let response = into_http_response(ProxyResponse {
            status: StatusCode::NOT_FOUND,
            headers,
            body: ProxyBody::Full(Bytes::from_static(b"a{}")),
        });

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.headers()[CONTENT_TYPE], "text/css");
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"a{}");
    }

    #[test]
    fn landing_page_loads_targets_through_proxy() {
        assert!(LANDING_PAGE_HTML.contains("<iframe"));
        assert!(LANDING_PAGE_HTML.contains("'/?url=' + encodeURIComponent(target)"));
    }
}

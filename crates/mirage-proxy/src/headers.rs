//! Response header normalization.

use http::header::{
    ACCESS_CONTROL_ALLOW_ORIGIN, CACHE_CONTROL, CONNECTION, CONTENT_TYPE, LOCATION,
    X_FRAME_OPTIONS,
};
use http::{HeaderMap, HeaderName, HeaderValue};

use mirage_core::{resolve, ContentKind, RewriteContext};

/// Cache directive for pass-through responses.
pub const PASSTHROUGH_CACHE_CONTROL: &str = "public,max-age=3600";

/// Frame permission sent with rewritten documents.
pub const FRAME_ALLOW: &str = "ALLOWALL";

/// Connection-scoped headers that never cross a proxy.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Upstream headers that are invalid after rewriting or that would stop the
/// page from being framed or loading its rewritten resources.
const DROPPED: &[&str] = &[
    "content-length",
    "content-encoding",
    "set-cookie",
    "strict-transport-security",
    "content-security-policy",
    "content-security-policy-report-only",
    "x-frame-options",
    "x-content-type-options",
    "cross-origin-opener-policy",
    "cross-origin-embedder-policy",
    "cross-origin-resource-policy",
];

/// Returns true if the header is never forwarded to the client.
pub fn is_dropped(name: &HeaderName) -> bool {
    let name = name.as_str();
    HOP_BY_HOP.contains(&name) || DROPPED.contains(&name)
}

/// Copies the upstream headers the client may see.
///
/// Headers listed in the upstream `Connection` value are dropped along with
/// the fixed hop-by-hop set.
pub fn forwarded_headers(upstream: &HeaderMap) -> HeaderMap {
    let connection_scoped: Vec<String> = upstream
        .get_all(CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|name| name.trim().to_ascii_lowercase())
        .filter(|name| !name.is_empty())
        .collect();

    let mut headers = HeaderMap::with_capacity(upstream.len());
    for (name, value) in upstream {
        if is_dropped(name) || connection_scoped.iter().any(|n| n == name.as_str()) {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }
    headers
}

/// Sets the headers every proxied response carries for its pipeline.
///
/// Pass-through responses keep whatever `Content-Type` was copied from the
/// upstream.
pub fn apply_proxy_headers(headers: &mut HeaderMap, kind: ContentKind) {
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));

    if let Some(content_type) = kind.response_content_type() {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    }

    match kind {
        ContentKind::Html => {
            headers.insert(X_FRAME_OPTIONS, HeaderValue::from_static(FRAME_ALLOW));
        }
        ContentKind::Other => {
            headers.insert(
                CACHE_CONTROL,
                HeaderValue::from_static(PASSTHROUGH_CACHE_CONTROL),
            );
        }
        ContentKind::Css | ContentKind::JavaScript => {}
    }
}

/// Routes an upstream `Location` back through the proxy.
pub fn rewrite_location(headers: &mut HeaderMap, ctx: &RewriteContext) {
    let Some(location) = headers.get(LOCATION).and_then(|v| v.to_str().ok()) else {
        return;
    };

    let rewritten = resolve(location, ctx);
    if rewritten == location {
        return;
    }

    match HeaderValue::from_str(&rewritten) {
        Ok(value) => {
            headers.insert(LOCATION, value);
        }
        Err(e) => tracing::debug!("Keeping upstream Location {:?}: {}", location, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header::{ETAG, SET_COOKIE};
    use url::Url;

    fn upstream() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("image/png"));
        headers.insert(ETAG, HeaderValue::from_static("\"abc\""));
        headers.append(SET_COOKIE, HeaderValue::from_static("a=1"));
        headers.insert("content-length", HeaderValue::from_static("42"));
        headers.insert("content-encoding", HeaderValue::from_static("gzip"));
        headers.insert(
            "content-security-policy",
            HeaderValue::from_static("default-src 'self'"),
        );
        headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
        headers.insert(
            "cross-origin-opener-policy",
            HeaderValue::from_static("same-origin"),
        );
        headers.insert("transfer-encoding", HeaderValue::from_static("chunked"));
        headers
    }

    #[test]
    fn drops_restrictive_and_hop_by_hop_headers() {
        let headers = forwarded_headers(&upstream());
        assert_eq!(headers.len(), 2);
        assert_eq!(headers[CONTENT_TYPE], "image/png");
        assert_eq!(headers[ETAG], "\"abc\"");
    }

    #[test]
    fn drops_connection_listed_headers() {
        let mut upstream = HeaderMap::new();
        upstream.insert(CONNECTION, HeaderValue::from_static("close, X-Session"));
        upstream.insert("x-session", HeaderValue::from_static("1"));
        upstream.insert("x-other", HeaderValue::from_static("2"));

        let headers = forwarded_headers(&upstream);
        assert!(headers.get("x-session").is_none());
        assert_eq!(headers["x-other"], "2");
    }

    #[test]
    fn html_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/html; charset=latin1"));
        apply_proxy_headers(&mut headers, ContentKind::Html);

        assert_eq!(headers[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(headers[CONTENT_TYPE], "text/html;charset=utf-8");
        assert_eq!(headers[X_FRAME_OPTIONS], "ALLOWALL");
        assert!(headers.get(CACHE_CONTROL).is_none());
    }

    #[test]
    fn script_and_style_headers() {
        let mut css = HeaderMap::new();
        apply_proxy_headers(&mut css, ContentKind::Css);
        assert_eq!(css[CONTENT_TYPE], "text/css");
        assert!(css.get(X_FRAME_OPTIONS).is_none());

        let mut js = HeaderMap::new();
        js.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        apply_proxy_headers(&mut js, ContentKind::JavaScript);
        assert_eq!(js[CONTENT_TYPE], "application/javascript");
    }

    #[test]
    fn passthrough_keeps_content_type_and_caches() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("font/woff2"));
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
        apply_proxy_headers(&mut headers, ContentKind::Other);

        assert_eq!(headers[CONTENT_TYPE], "font/woff2");
        assert_eq!(headers[CACHE_CONTROL], PASSTHROUGH_CACHE_CONTROL);
        assert_eq!(headers[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    }

    #[test]
    fn location_routed_through_proxy() {
        let target = Url::parse("https://t.example/a/page").unwrap();
        let ctx = RewriteContext::new("https://p.example", &target);
        let mut headers = HeaderMap::new();
        headers.insert(LOCATION, HeaderValue::from_static("/login?next=%2F"));

        rewrite_location(&mut headers, &ctx);
        assert_eq!(
            headers[LOCATION],
            resolve("https://t.example/login?next=%2F", &ctx).as_str()
        );
    }

    #[test]
    fn missing_location_is_noop() {
        let target = Url::parse("https://t.example/").unwrap();
        let ctx = RewriteContext::new("https://p.example", &target);
        let mut headers = HeaderMap::new();
        rewrite_location(&mut headers, &ctx);
        assert!(headers.is_empty());
    }
}

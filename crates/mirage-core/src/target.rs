//! Target extraction and the per-request rewrite context.
//!
//! A proxied request names its target in the `url` query parameter. Everything
//! the transformers need to know about the request (where the proxy lives and
//! where the fetched document came from) is captured once in a
//! [`RewriteContext`] and passed by reference to every rewrite.

use percent_encoding::percent_decode_str;
use url::{form_urlencoded, Url};

use crate::error::{Result, TargetError};

/// Query prefix that marks a proxied request.
pub const TARGET_QUERY_PREFIX: &str = "url=";

/// Pulls the raw target out of an inbound query string.
///
/// When the query starts with `url=`, everything after it is the target,
/// including any unencoded `&name=value` pairs that belong to the target's own
/// query. Otherwise the first `url` parameter wins. Returns `None` when no
/// non-empty target is present.
pub fn extract_target(raw_query: Option<&str>) -> Option<String> {
    let query = raw_query?;

    if let Some(rest) = query.strip_prefix(TARGET_QUERY_PREFIX) {
        let decoded = percent_decode_str(rest).decode_utf8_lossy().into_owned();
        return non_empty(decoded);
    }

    form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == "url")
        .and_then(|(_, value)| non_empty(value.into_owned()))
}

fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Parses a caller-supplied target into an absolute `http(s)` URL.
pub fn parse_target(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim())?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(TargetError::UnsupportedScheme(url.scheme().to_string()));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(TargetError::MissingHost);
    }

    Ok(url)
}

/// Returns `scheme://host[:port]` for a URL, omitting default ports.
pub fn origin_of(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{}://{}:{}", url.scheme(), host, port),
        None => format!("{}://{}", url.scheme(), host),
    }
}

/// Everything a rewrite needs to route a reference back through the proxy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteContext {
    proxy_origin: String,
    target_origin: String,
    target_base: Url,
}

impl RewriteContext {
    /// Builds a context for a document fetched from `target`.
    ///
    /// `target` should be the final URL after redirects, since relative
    /// references in the body are relative to where it was actually served.
    pub fn new(proxy_origin: impl Into<String>, target: &Url) -> Self {
        let proxy_origin = proxy_origin.into().trim_end_matches('/').to_string();

        let mut target_base = target.clone();
        target_base.set_query(None);
        target_base.set_fragment(None);
        let dir_len = target_base
            .path()
            .rfind('/')
            .map(|idx| idx + 1)
            .unwrap_or(0);
        let dir = target_base.path()[..dir_len].to_string();
        target_base.set_path(if dir.is_empty() { "/" } else { &dir });

        Self {
            proxy_origin,
            target_origin: origin_of(target),
            target_base,
        }
    }

    /// Origin of the proxy itself, without a trailing slash.
    pub fn proxy_origin(&self) -> &str {
        &self.proxy_origin
    }

    /// Origin of the fetched document.
    pub fn target_origin(&self) -> &str {
        &self.target_origin
    }

    /// Directory of the fetched document, used for document-relative references.
    pub fn target_base(&self) -> &Url {
        &self.target_base
    }

    /// Host of the fetched document.
    pub fn target_host(&self) -> &str {
        self.target_base.host_str().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_target_takes_everything_after_prefix() {
        let target = extract_target(Some("url=https://t.example/a?b=1&c=2"));
        assert_eq!(target.as_deref(), Some("https://t.example/a?b=1&c=2"));
    }

    #[test]
    fn extract_target_decodes_encoded_value() {
        let target = extract_target(Some("url=https%3A%2F%2Ft.example%2Fa%3Fb%3D1%26c%3D2"));
        assert_eq!(target.as_deref(), Some("https://t.example/a?b=1&c=2"));
    }

    #[test]
    fn extract_target_finds_later_parameter() {
        let target = extract_target(Some("lang=en&url=https%3A%2F%2Ft.example%2F"));
        assert_eq!(target.as_deref(), Some("https://t.example/"));
    }

    #[test]
    fn extract_target_missing_or_empty() {
        assert_eq!(extract_target(None), None);
        assert_eq!(extract_target(Some("")), None);
        assert_eq!(extract_target(Some("url=")), None);
        assert_eq!(extract_target(Some("q=1")), None);
    }

    #[test]
    fn parse_target_accepts_http_and_https() {
        assert!(parse_target("https://t.example/a").is_ok());
        assert!(parse_target("  http://t.example:8080/  ").is_ok());
    }

    #[test]
    fn parse_target_rejects_garbage() {
        assert!(matches!(
            parse_target("not a url"),
            Err(TargetError::Parse(_))
        ));
    }

    #[test]
    fn parse_target_rejects_other_schemes() {
        assert_eq!(
            parse_target("ftp://t.example/file"),
            Err(TargetError::UnsupportedScheme("ftp".to_string()))
        );
        assert!(parse_target("javascript:alert(1)").is_err());
    }

    #[test]
    fn origin_keeps_non_default_port() {
        let url = Url::parse("http://t.example:8080/a/b").unwrap();
        assert_eq!(origin_of(&url), "http://t.example:8080");

        let url = Url::parse("https://t.example:443/a/b").unwrap();
        assert_eq!(origin_of(&url), "https://t.example");
    }

    #[test]
    fn context_base_is_document_directory() {
        let target = Url::parse("https://t.example/dir/page.html?x=1/2#frag").unwrap();
        let ctx = RewriteContext::new("https://p.example/", &target);

        assert_eq!(ctx.proxy_origin(), "https://p.example");
        assert_eq!(ctx.target_origin(), "https://t.example");
        assert_eq!(ctx.target_base().as_str(), "https://t.example/dir/");
        assert_eq!(ctx.target_host(), "t.example");
    }

    #[test]
    fn context_base_for_directory_target() {
        let target = Url::parse("https://t.example/dir/").unwrap();
        let ctx = RewriteContext::new("https://p.example", &target);
        assert_eq!(ctx.target_base().as_str(), "https://t.example/dir/");

        let target = Url::parse("https://t.example").unwrap();
        let ctx = RewriteContext::new("https://p.example", &target);
        assert_eq!(ctx.target_base().as_str(), "https://t.example/");
    }
}

//! URL resolution: turns any URL-like string found in fetched content into
//! its proxy-routed equivalent.
//!
//! Resolution is total. Anything that cannot be meaningfully proxied is
//! returned unchanged, because a single odd reference must never break the
//! rest of the page.
//!
//! ```text
//! raw reference ──► classify_reference ──► RewriteRule
//!                                             │
//!        Ignore / AlreadyProxied ◄────────────┤ (unchanged)
//!                                             │
//!   Absolute / ProtocolRelative / RootRelative / DocumentRelative
//!                                             │
//!                                             ▼
//!                     proxy_origin + "/?url=" + encode(absolute)
//! ```

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::target::RewriteContext;

/// Bytes escaped when embedding a URL as the `url` query value.
///
/// Matches `encodeURIComponent`, which is what the runtime shim uses, so that
/// statically and dynamically rewritten URLs are byte-identical.
pub const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Path and query the proxy serves proxied requests under.
pub const PROXY_QUERY_PATH: &str = "/?url=";

/// Prefixes that must never be proxy-wrapped.
const IGNORED_PREFIXES: &[&str] = &["#", "data:", "blob:", "mailto:", "javascript:"];

/// How an encountered URL-like string is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RewriteRule {
    /// Fragment or a scheme that has no meaning through the proxy.
    Ignore,
    /// Already points at the proxy.
    AlreadyProxied,
    /// Carries its own `http(s)` scheme and host.
    Absolute,
    /// `//host/path`, assumed to be `https:`.
    ProtocolRelative,
    /// `/path`, resolved against the target origin.
    RootRelative,
    /// `path`, resolved against the target document's directory.
    DocumentRelative,
}

/// Classifies a trimmed, non-empty reference. First match wins.
pub fn classify_reference(value: &str, ctx: &RewriteContext) -> RewriteRule {
    if IGNORED_PREFIXES
        .iter()
        .any(|prefix| starts_with_ignore_case(value, prefix))
    {
        return RewriteRule::Ignore;
    }
    if value.starts_with(ctx.proxy_origin()) {
        return RewriteRule::AlreadyProxied;
    }
    if is_http_url(value) {
        return RewriteRule::Absolute;
    }
    if value.starts_with("//") {
        return RewriteRule::ProtocolRelative;
    }
    if value.starts_with(PROXY_QUERY_PATH) {
        return RewriteRule::AlreadyProxied;
    }
    if value.starts_with('/') {
        return RewriteRule::RootRelative;
    }
    RewriteRule::DocumentRelative
}

/// Rewrites a reference so that fetching it goes through the proxy.
///
/// # Examples
///
/// ```
/// use mirage_core::{resolve, RewriteContext};
/// use url::Url;
///
/// let target = Url::parse("https://t.example/dir/page.html").unwrap();
/// let ctx = RewriteContext::new("https://p.example", &target);
///
/// assert_eq!(
///     resolve("/logo.png", &ctx),
///     "https://p.example/?url=https%3A%2F%2Ft.example%2Flogo.png"
/// );
/// assert_eq!(resolve("#top", &ctx), "#top");
/// ```
pub fn resolve(raw: &str, ctx: &RewriteContext) -> String {
    let value = raw.trim();
    if value.is_empty() {
        return raw.to_string();
    }

    match classify_reference(value, ctx) {
        RewriteRule::Ignore | RewriteRule::AlreadyProxied => raw.to_string(),
        RewriteRule::Absolute => wrap_absolute(value, ctx),
        RewriteRule::ProtocolRelative => wrap_absolute(&format!("https:{value}"), ctx),
        RewriteRule::RootRelative => {
            wrap_absolute(&format!("{}{}", ctx.target_origin(), value), ctx)
        }
        RewriteRule::DocumentRelative => match ctx.target_base().join(value) {
            // `tel:`, `about:` and friends parse as absolute but are not fetchable.
            Ok(absolute) if !matches!(absolute.scheme(), "http" | "https") => raw.to_string(),
            Ok(absolute) => wrap_absolute(absolute.as_str(), ctx),
            Err(e) => {
                tracing::trace!("Leaving unresolvable reference {:?}: {}", value, e);
                raw.to_string()
            }
        },
    }
}

/// Wraps an absolute URL in the proxy's query form.
///
/// The whole URL becomes a single encoded value, so the target's own query
/// string survives intact.
pub fn wrap_absolute(absolute: &str, ctx: &RewriteContext) -> String {
    format!(
        "{}{}{}",
        ctx.proxy_origin(),
        PROXY_QUERY_PATH,
        utf8_percent_encode(absolute, COMPONENT)
    )
}

/// Returns true if `value` starts with `http://` or `https://` in any case.
pub fn is_http_url(value: &str) -> bool {
    starts_with_ignore_case(value, "http://") || starts_with_ignore_case(value, "https://")
}

fn starts_with_ignore_case(value: &str, prefix: &str) -> bool {
    value
        .get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}
